//! Analysis of `ADD` messages, that add occurrences to a recurring series.
//!
//! Adding occurrences is not supported: the recipient may only ask the organizer for the latest version of the series.

use async_trait::async_trait;

use crate::analysis::{Action, AnalyzedChange, AnalyzedChangeBuilder, Change, ChangeType};
use crate::analysis::annotation::AnnotationHelper;
use crate::calendar_user::{CalendarUser, EntityId};
use crate::error::AnalysisError;
use crate::message::SchedulingMethod;
use crate::provider::ObjectResourceProvider;
use crate::session::CalendarSession;
use super::{SchedulingAnalyzer, comment_annotation};

pub struct AddAnalyzer;

#[async_trait]
impl SchedulingAnalyzer for AddAnalyzer {
    fn method(&self) -> SchedulingMethod {
        SchedulingMethod::Add
    }

    async fn analyze(&self, session: &CalendarSession, provider: &ObjectResourceProvider<'_>, originator: &CalendarUser, target_user: EntityId)
        -> Result<Vec<AnalyzedChange>, AnalysisError>
    {
        let helper = AnnotationHelper::new(session).await;
        let series_master = provider.stored_resource().await?
            .and_then(|resource| resource.series_master())
            .cloned();

        let mut changes = Vec::new();
        for event in provider.incoming_events().await {
            let mut builder = AnalyzedChangeBuilder::new();
            builder.annotate(helper.added_occurrence_introduction(&event, originator));
            if let Some(comment) = comment_annotation(&helper, &event) {
                builder.annotate(comment);
            }
            builder.annotate(helper.add_unsupported(target_user).await);
            builder.offer(&[Action::Ignore, Action::RequestRefresh]);
            changes.push(builder.build(Change::new(ChangeType::Create, event, series_master.clone())));
        }
        Ok(changes)
    }
}
