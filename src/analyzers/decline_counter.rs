//! Analysis of `DECLINECOUNTER` messages, sent by the organizer to reject a proposal

use async_trait::async_trait;

use crate::analysis::{Action, AnalyzedChange, AnalyzedChangeBuilder, Change, ChangeType};
use crate::analysis::annotation::AnnotationHelper;
use crate::calendar_user::{CalendarUser, EntityId, find_attendee_by_entity};
use crate::error::AnalysisError;
use crate::message::SchedulingMethod;
use crate::provider::ObjectResourceProvider;
use crate::sequence::ITipSequence;
use crate::session::CalendarSession;
use crate::utils;
use super::{SchedulingAnalyzer, add_part_stat_hints_and_actions, check_conflicts, comment_annotation, user_attendee};

pub struct DeclineCounterAnalyzer;

#[async_trait]
impl SchedulingAnalyzer for DeclineCounterAnalyzer {
    fn method(&self) -> SchedulingMethod {
        SchedulingMethod::DeclineCounter
    }

    async fn analyze(&self, session: &CalendarSession, provider: &ObjectResourceProvider<'_>, originator: &CalendarUser, target_user: EntityId)
        -> Result<Vec<AnalyzedChange>, AnalysisError>
    {
        let helper = AnnotationHelper::new(session).await;

        let mut changes = Vec::new();
        for event in provider.incoming_events().await {
            let stored = provider.opt_matching_event(&event).await?;

            let mut builder = AnalyzedChangeBuilder::new();
            builder.annotate(helper.counter_declined_introduction(&event, stored.as_ref(), originator));
            if let Some(comment) = comment_annotation(&helper, &event) {
                builder.annotate(comment);
            }

            let stored = match stored {
                Some(stored) => stored,
                None => {
                    builder.annotate(helper.not_found(target_user).await);
                    builder.offer(&[Action::RequestRefresh, Action::Ignore]);
                    changes.push(builder.build(Change::new(ChangeType::Update, event, None)));
                    continue;
                },
            };

            let incoming_revision = ITipSequence::of(&event);
            let stored_revision = ITipSequence::of(&stored);
            if stored_revision.after(&incoming_revision) {
                builder.annotate(helper.updated_meantime());
                builder.offer(&[Action::Ignore]);
                changes.push(builder.build(Change::new(ChangeType::Update, event, Some(stored))));
            } else if incoming_revision.after(&stored_revision) {
                // The organizer updated the event since, which we do not know about yet
                builder.annotate(helper.counter_declined_for_updated());
                builder.offer(&[Action::RequestRefresh]);
                changes.push(builder.build(Change::new(ChangeType::Update, event, Some(stored))));
            } else {
                if utils::organizer_changed(stored.organizer(), event.organizer()) {
                    builder.annotate(helper.organizer_changed());
                }
                let attendee = user_attendee(session, target_user).await;
                let conflicts = check_conflicts(session, &stored, attendee.as_ref()).await;
                builder.target(find_attendee_by_entity(stored.attendees(), target_user).cloned());
                add_part_stat_hints_and_actions(&helper, &mut builder, &stored, !conflicts.is_empty(), target_user).await;
                changes.push(builder.build(Change::new(ChangeType::Update, event, Some(stored)).with_conflicts(conflicts)));
            }
        }
        Ok(changes)
    }
}
