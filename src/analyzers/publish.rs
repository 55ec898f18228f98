//! Analysis of `PUBLISH` messages, i.e. events that are shared without any scheduling.
//!
//! Published events are not supported, whatever their content.

use async_trait::async_trait;

use crate::analysis::{Action, AnalyzedChange, AnalyzedChangeBuilder, Change, ChangeType};
use crate::analysis::annotation::AnnotationHelper;
use crate::calendar_user::{CalendarUser, EntityId};
use crate::error::AnalysisError;
use crate::message::SchedulingMethod;
use crate::provider::ObjectResourceProvider;
use crate::session::CalendarSession;
use super::SchedulingAnalyzer;

pub struct PublishAnalyzer;

#[async_trait]
impl SchedulingAnalyzer for PublishAnalyzer {
    fn method(&self) -> SchedulingMethod {
        SchedulingMethod::Publish
    }

    async fn analyze(&self, session: &CalendarSession, provider: &ObjectResourceProvider<'_>, originator: &CalendarUser, _target_user: EntityId)
        -> Result<Vec<AnalyzedChange>, AnalysisError>
    {
        let helper = AnnotationHelper::new(session).await;
        let event = match provider.incoming_events().await.into_iter().next() {
            None => return Ok(Vec::new()),
            Some(event) => event,
        };

        let mut builder = AnalyzedChangeBuilder::new();
        builder.annotate(helper.published_introduction(&event, originator));
        builder.annotate(helper.publish_unsupported());
        builder.offer(&[Action::Ignore]);
        Ok(vec![builder.build(Change::new(ChangeType::Create, event, None))])
    }
}
