//! Analysis of `COUNTER` messages, sent by attendees that propose changes to an event

use async_trait::async_trait;

use crate::analysis::{Action, AnalyzedChange, AnalyzedChangeBuilder, Change, ChangeType};
use crate::analysis::annotation::{Annotation, AnnotationHelper};
use crate::calendar_user::{Attendee, CalendarUser, EntityId, find_attendee};
use crate::error::AnalysisError;
use crate::event::{Event, EventFields};
use crate::message::SchedulingMethod;
use crate::provider::ObjectResourceProvider;
use crate::session::CalendarSession;
use crate::utils;
use super::{SchedulingAnalyzer, comment_annotation};

pub struct CounterAnalyzer;

#[async_trait]
impl SchedulingAnalyzer for CounterAnalyzer {
    fn method(&self) -> SchedulingMethod {
        SchedulingMethod::Counter
    }

    /// Every field is needed to know what the proposal changes
    fn fields(&self) -> Option<EventFields> {
        None
    }

    async fn analyze(&self, session: &CalendarSession, provider: &ObjectResourceProvider<'_>, originator: &CalendarUser, target_user: EntityId)
        -> Result<Vec<AnalyzedChange>, AnalysisError>
    {
        let helper = AnnotationHelper::new(session).await;
        let prod_id = provider.message().prod_id();

        let mut changes = Vec::new();
        for event in provider.incoming_events().await {
            let stored = provider.opt_matching_event(&event).await?;
            // The attendee may have removed itself from the proposal
            let countering = utils::select_attendee(&event, Some(originator), true)
                .cloned()
                .unwrap_or_else(|| originator.as_attendee());

            let analyzed = match stored {
                Some(stored) => analyze_known_event(&helper, event, stored, countering, target_user, prod_id).await,
                None => {
                    let tombstone = provider.opt_matching_tombstone(&event).await?;
                    analyze_unknown_event(&helper, event, tombstone, countering, target_user, prod_id).await
                },
            };
            changes.push(analyzed);
        }
        Ok(changes)
    }
}

async fn analyze_known_event(helper: &AnnotationHelper<'_>, event: Event, stored: Event, countering: Attendee,
    target_user: EntityId, prod_id: Option<&str>) -> AnalyzedChange
{
    let mut builder = AnalyzedChangeBuilder::new();
    builder.annotate_all(introductions(helper, &event, Some(&stored), &countering, prod_id));
    builder.target(Some(countering.clone()));

    if stored.sequence() > event.sequence() {
        builder.annotate(helper.counter_outdated());
        builder.offer(&[Action::DeclineCounter]);
    } else if find_attendee(stored.attendees(), countering.calendar_user()).is_none() {
        builder.annotate(helper.counter_uninvited());
        builder.offer(&[Action::DeclineCounter]);
    } else if stored.sequence() == event.sequence() && time_change_only(&event, Some(&stored), prod_id) {
        builder.annotate(helper.apply_counter_manually(target_user).await);
        builder.offer(&[Action::ApplyProposal, Action::DeclineCounter]);
    } else {
        builder.annotate(helper.counter_unsupported(target_user).await);
        builder.offer(&[Action::DeclineCounter]);
    }
    builder.build(Change::new(ChangeType::Update, event, Some(stored)))
}

async fn analyze_unknown_event(helper: &AnnotationHelper<'_>, event: Event, tombstone: Option<Event>, countering: Attendee,
    target_user: EntityId, prod_id: Option<&str>) -> AnalyzedChange
{
    let mut builder = AnalyzedChangeBuilder::new();
    builder.annotate_all(introductions(helper, &event, tombstone.as_ref(), &countering, prod_id));
    builder.target(Some(countering));

    let deleted = tombstone.as_ref()
        .map(|tombstone| tombstone.sequence() >= event.sequence() && tombstone.dtstamp() > event.dtstamp())
        .unwrap_or(false);
    if deleted {
        builder.annotate(helper.deleted_meantime());
    } else {
        builder.annotate(helper.not_found(target_user).await);
    }
    builder.offer(&[Action::Ignore]);
    builder.build(Change::new(ChangeType::Update, event, None))
}

/// Whether the proposal only changes the times of the event.
/// Without any stored event, only the vendor-specific markers are considered
fn time_change_only(event: &Event, stored: Option<&Event>, prod_id: Option<&str>) -> bool {
    utils::consider_as_time_change_only(event, stored.unwrap_or(event), prod_id)
}

fn introductions(helper: &AnnotationHelper<'_>, event: &Event, stored: Option<&Event>, countering: &Attendee, prod_id: Option<&str>) -> Vec<Annotation> {
    let mut annotations = Vec::new();
    if time_change_only(event, stored, prod_id) {
        annotations.push(helper.time_proposed_introduction(event, stored, countering.calendar_user()));
        if let Some(stored) = stored {
            if event.end_date().is_some() {
                annotations.push(helper.proposed_times(event, stored));
            }
        }
    } else {
        annotations.push(helper.changes_proposed_introduction(event, stored, countering.calendar_user()));
    }

    // The proposal may come along with a new participation status
    let part_stat_changed = stored
        .and_then(|stored| find_attendee(stored.attendees(), countering.calendar_user()))
        .map(|original| original.part_stat() != countering.part_stat())
        .unwrap_or(false);
    if part_stat_changed {
        annotations.push(helper.replied_introduction(event, stored, countering));
    }
    annotations.extend(comment_annotation(helper, event));
    annotations
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use crate::event::ExtendedProperty;

    #[test]
    fn test_time_change_without_stored_event() {
        let start = Utc.ymd(2022, 1, 10).and_hms(16, 0, 0);
        let event = Event::new("uid", start, start).with_end_date(start + Duration::hours(1));
        assert!(!time_change_only(&event, None, None));
        assert!(time_change_only(&event, None, Some("-//Google Inc//Google Calendar 70.9054//EN")));

        let outlook = event.clone()
            .with_extended_property(ExtendedProperty::new("X-MS-OLK-ORIGINALSTART", "20220110T160000Z"))
            .with_extended_property(ExtendedProperty::new("X-MS-OLK-ORIGINALEND", "20220110T170000Z"));
        assert!(time_change_only(&outlook, None, None));

        let stored = event.clone().with_start_date(start - Duration::hours(1)).with_end_date(start);
        assert!(time_change_only(&event, Some(&stored), None));
    }
}
