//! Analysis of `REFRESH` messages, sent by attendees that ask for the latest version of an event

use async_trait::async_trait;

use crate::analysis::{Action, AnalyzedChange, AnalyzedChangeBuilder, Change, ChangeType};
use crate::analysis::annotation::AnnotationHelper;
use crate::calendar_user::{CalendarUser, EntityId, find_attendee};
use crate::error::AnalysisError;
use crate::message::SchedulingMethod;
use crate::provider::ObjectResourceProvider;
use crate::session::CalendarSession;
use crate::utils;
use super::{SchedulingAnalyzer, comment_annotation};

pub struct RefreshAnalyzer;

#[async_trait]
impl SchedulingAnalyzer for RefreshAnalyzer {
    fn method(&self) -> SchedulingMethod {
        SchedulingMethod::Refresh
    }

    async fn analyze(&self, session: &CalendarSession, provider: &ObjectResourceProvider<'_>, originator: &CalendarUser, target_user: EntityId)
        -> Result<Vec<AnalyzedChange>, AnalysisError>
    {
        let helper = AnnotationHelper::new(session).await;

        let mut changes = Vec::new();
        for event in provider.incoming_events().await {
            let requesting = match utils::select_attendee(&event, Some(originator), false) {
                Some(attendee) => attendee.clone(),
                None => {
                    session.add_warning(&format!("No requesting attendee found in {} for originator {}, skipping", event, originator));
                    continue;
                },
            };
            let stored = provider.opt_matching_event(&event).await?;

            let mut builder = AnalyzedChangeBuilder::new();
            builder.target(Some(requesting.clone()));
            builder.annotate(helper.refresh_introduction(&event, stored.as_ref(), requesting.calendar_user()));
            if let Some(comment) = comment_annotation(&helper, &event) {
                builder.annotate(comment);
            }

            match &stored {
                None => {
                    builder.annotate(helper.not_found(target_user).await);
                    builder.offer(&[Action::Ignore]);
                },
                Some(stored) => {
                    if find_attendee(stored.attendees(), requesting.calendar_user()).is_none() {
                        log::debug!("{} asks for a refresh of {}, but is not invited", requesting.calendar_user(), stored);
                        builder.annotate(helper.refresh_uninvited());
                        builder.offer(&[Action::Ignore]);
                    } else {
                        builder.annotate(helper.send_manually(stored));
                        builder.offer(&[Action::SendRefresh, Action::Ignore]);
                    }
                },
            }
            changes.push(builder.build(Change::new(ChangeType::Update, event, stored)));
        }
        Ok(changes)
    }
}
