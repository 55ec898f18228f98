//! Analysis of `CANCEL` messages, sent by the organizer to remove an event (or some of its occurrences)

use async_trait::async_trait;

use crate::analysis::{Action, AnalyzedChange, AnalyzedChangeBuilder, Change, ChangeType};
use crate::analysis::annotation::AnnotationHelper;
use crate::calendar_user::{Attendee, CalendarUser, EntityId, find_attendee_by_entity};
use crate::error::AnalysisError;
use crate::event::Event;
use crate::message::SchedulingMethod;
use crate::provider::ObjectResourceProvider;
use crate::sequence::ITipSequence;
use crate::session::CalendarSession;
use crate::utils;
use super::{SchedulingAnalyzer, comment_annotation, is_delegate_of};

pub struct CancelAnalyzer;

#[async_trait]
impl SchedulingAnalyzer for CancelAnalyzer {
    fn method(&self) -> SchedulingMethod {
        SchedulingMethod::Cancel
    }

    async fn analyze(&self, session: &CalendarSession, provider: &ObjectResourceProvider<'_>, originator: &CalendarUser, target_user: EntityId)
        -> Result<Vec<AnalyzedChange>, AnalysisError>
    {
        let helper = AnnotationHelper::new(session).await;
        let uses_organizer_copy = provider.uses_organizer_copy().await;

        let mut changes = Vec::new();
        for event in provider.incoming_events().await {
            let stored = provider.opt_matching_event(&event).await?;
            let resource = utils::opt_resource_sent_by(&event, originator).cloned();

            let mut builder = AnalyzedChangeBuilder::new();
            builder.annotate(match &resource {
                Some(resource) => helper.resource_canceled_introduction(&event, stored.as_ref(), originator, resource.calendar_user()).await,
                None => helper.canceled_introduction(&event, stored.as_ref(), originator),
            });
            if let Some(comment) = comment_annotation(&helper, &event) {
                builder.annotate(comment);
            }

            let analyzed = match stored {
                Some(stored) => analyze_known_event(&helper, builder, event, stored, target_user).await,
                None => {
                    if let Some(resource) = &resource {
                        if !is_delegate_of(session, resource).await {
                            builder.annotate(helper.resource_not_delegate(resource.calendar_user()).await);
                            builder.target(Some(resource.clone()));
                            builder.offer(&[Action::Ignore]);
                            changes.push(builder.build(Change::new(ChangeType::Delete, event, None)));
                            continue;
                        }
                    }
                    let tombstone = provider.opt_matching_tombstone(&event).await?;
                    analyze_unknown_event(session, &helper, builder, event, tombstone, resource.as_ref(), target_user, uses_organizer_copy).await
                },
            };
            changes.push(analyzed);
        }
        Ok(changes)
    }
}

/// `resource` is the resource attendee the session user manages the bookings of, if the cancel has been relayed by its delegate
#[allow(clippy::too_many_arguments)]
async fn analyze_unknown_event(session: &CalendarSession, helper: &AnnotationHelper<'_>, mut builder: AnalyzedChangeBuilder,
    event: Event, tombstone: Option<Event>, resource: Option<&Attendee>, target_user: EntityId, uses_organizer_copy: bool) -> AnalyzedChange
{
    let tombstone = match tombstone {
        None => {
            log::debug!("{} is unknown, nothing to cancel", event);
            builder.annotate(match resource {
                Some(resource) => helper.resource_not_found(resource.calendar_user()).await,
                None => helper.not_found(target_user).await,
            });
            builder.offer(&[Action::Ignore]);
            return builder.build(Change::new(ChangeType::Delete, event, None));
        },
        Some(tombstone) => tombstone,
    };

    let incoming_revision = ITipSequence::of(&event);
    let tombstone_revision = ITipSequence::of(&tombstone);
    if tombstone_revision.after(&incoming_revision) {
        // The event has been deleted with a revision this cancel does not know about
        session.add_warning(&format!("Unexpected sequence for canceled event {}: deleted as {}, canceled as {}",
            event.uid(), tombstone_revision, incoming_revision));
    }
    match resource {
        Some(resource) => {
            builder.annotate(helper.resource_cancel_applied(resource.calendar_user()).await);
            builder.target(Some(resource.clone()));
        },
        None => {
            if !uses_organizer_copy {
                builder.annotate(helper.cancel_applied(target_user).await);
            }
            builder.target(own_attendee(&tombstone, target_user));
        },
    }
    builder.build(Change::new(ChangeType::Delete, event, Some(tombstone)))
}

async fn analyze_known_event(helper: &AnnotationHelper<'_>, mut builder: AnalyzedChangeBuilder,
    event: Event, stored: Event, target_user: EntityId) -> AnalyzedChange
{
    let incoming_revision = ITipSequence::of(&event);
    let stored_revision = ITipSequence::of(&stored);

    if stored_revision.after(&incoming_revision) {
        log::debug!("{} has been updated in the meantime ({} vs {})", event, stored_revision, incoming_revision);
        builder.annotate(helper.updated_meantime());
        builder.offer(&[Action::Ignore]);
    } else if utils::organizer_changed(stored.organizer(), event.organizer()) {
        builder.annotate(helper.organizer_changed());
        builder.offer(&[Action::Ignore]);
    } else {
        builder.annotate(helper.apply_cancel_manually(target_user).await);
        builder.target(own_attendee(&stored, target_user));
        builder.offer(&[Action::ApplyRemove]);
    }
    builder.build(Change::new(ChangeType::Delete, event, Some(stored)))
}

fn own_attendee(event: &Event, target_user: EntityId) -> Option<Attendee> {
    find_attendee_by_entity(event.attendees(), target_user).cloned()
}
