//! Analyzers of incoming scheduling messages, one per iTIP method
//!
//! The entry point is [`ITipAnalyzer::analyze`], which checks permissions, then delegates the analysis of the incoming events to the [`SchedulingAnalyzer`] of the message's method.

use async_trait::async_trait;

use crate::analysis::{Action, AnalyzedChangeBuilder, AnalyzedChange, ITipAnalysis};
use crate::analysis::annotation::{Annotation, AnnotationHelper};
use crate::calendar_user::{Attendee, CalendarUser, EntityId, SchedulingPrivilege};
use crate::config;
use crate::error::AnalysisError;
use crate::event::{Event, EventConflict, EventFields};
use crate::message::{IncomingSchedulingMessage, SchedulingMethod};
use crate::permission;
use crate::provider::ObjectResourceProvider;
use crate::session::CalendarSession;
use crate::utils;

mod add;
mod cancel;
mod counter;
mod decline_counter;
mod publish;
mod refresh;
mod reply;
mod request;

pub use add::AddAnalyzer;
pub use cancel::CancelAnalyzer;
pub use counter::CounterAnalyzer;
pub use decline_counter::DeclineCounterAnalyzer;
pub use publish::PublishAnalyzer;
pub use refresh::RefreshAnalyzer;
pub use reply::ReplyAnalyzer;
pub use request::RequestAnalyzer;

/// The analysis of the events of a scheduling message, for a given iTIP method
#[async_trait]
pub trait SchedulingAnalyzer: Send + Sync {
    /// The method this analyzer handles
    fn method(&self) -> SchedulingMethod;

    /// The fields to load from the stored events (`None` for all of them)
    fn fields(&self) -> Option<EventFields> {
        Some(*config::DEFAULT_FIELDS)
    }

    /// Analyzes every incoming event of the message.
    ///
    /// Permissions have already been checked when this is called.
    async fn analyze(&self, session: &CalendarSession, provider: &ObjectResourceProvider<'_>, originator: &CalendarUser, target_user: EntityId)
        -> Result<Vec<AnalyzedChange>, AnalysisError>;
}

/// Returns the analyzer for a method
pub fn analyzer_for(method: SchedulingMethod) -> Box<dyn SchedulingAnalyzer> {
    match method {
        SchedulingMethod::Publish => Box::new(PublishAnalyzer),
        SchedulingMethod::Request => Box::new(RequestAnalyzer),
        SchedulingMethod::Reply => Box::new(ReplyAnalyzer),
        SchedulingMethod::Add => Box::new(AddAnalyzer),
        SchedulingMethod::Cancel => Box::new(CancelAnalyzer),
        SchedulingMethod::Refresh => Box::new(RefreshAnalyzer),
        SchedulingMethod::Counter => Box::new(CounterAnalyzer),
        SchedulingMethod::DeclineCounter => Box::new(DeclineCounterAnalyzer),
    }
}


/// Analyzes incoming scheduling messages
#[derive(Default)]
pub struct ITipAnalyzer {}

impl ITipAnalyzer {
    pub fn new() -> Self {
        Self {}
    }

    /// Analyzes a message, on behalf of the user of `session`.
    ///
    /// In case the session user may not act on behalf of the targeted calendar user, this returns an analysis without any change.
    /// Errors are only returned when the stored data cannot be retrieved, or in case of an inconsistent revision ordering.
    pub async fn analyze(&self, session: &CalendarSession, message: &IncomingSchedulingMessage) -> Result<ITipAnalysis, AnalysisError> {
        let analyzer = analyzer_for(message.method());
        let provider = ObjectResourceProvider::new_with_fields(session, message, analyzer.fields());
        log::debug!("Analyzing {} message for {} (calendar user {})", message.method(), provider.uid(), provider.calendar_user());

        let stored_resource = provider.stored_resource().await?;
        if !permission::has_access(session, provider.calendar_user(), stored_resource).await {
            log::info!("Insufficient permissions to analyze {} for user {}", provider.uid(), provider.calendar_user());
            return Ok(ITipAnalysis::insufficient_permissions(message.method(), provider.uid()));
        }

        let changes = analyzer.analyze(session, &provider, message.originator(), provider.calendar_user()).await?;
        let related_resource = provider.stored_related_resource().await?;
        let analysis = ITipAnalysis::new(message.method(), provider.uid(), stored_resource.cloned(), related_resource.cloned(), changes);
        log::debug!("{} message for {} yields {} change(s)", message.method(), provider.uid(), analysis.changes().len());
        Ok(analysis)
    }
}


/// The annotation for the comment of an incoming event, if any
fn comment_annotation(helper: &AnnotationHelper<'_>, event: &Event) -> Option<Annotation> {
    utils::opt_comment(event).map(|comment| helper.comment(&comment))
}

/// Returns an attendee record of the target user, in order to check for conflicts.
/// Failures are recorded as session warnings.
async fn user_attendee(session: &CalendarSession, target_user: EntityId) -> Option<Attendee> {
    match session.entities().prepare_user_attendee(target_user).await {
        Ok(attendee) => Some(attendee),
        Err(err) => {
            session.add_warning(&format!("Unable to get an attendee for user {}: {}", target_user, err));
            None
        },
    }
}

/// The conflicts `event` would cause in the calendar of `attendee`.
/// Failures are recorded as session warnings, and yield no conflict.
async fn check_conflicts(session: &CalendarSession, event: &Event, attendee: Option<&Attendee>) -> Vec<EventConflict> {
    let attendee = match attendee {
        None => return Vec::new(),
        Some(attendee) => attendee,
    };
    match session.free_busy().check_conflicts(event, std::slice::from_ref(attendee)).await {
        Ok(conflicts) => {
            log::trace!("{} conflict(s) for {} in the calendar of {}", conflicts.len(), event, attendee.calendar_user());
            conflicts
        },
        Err(err) => {
            session.add_warning(&format!("Unable to check for conflicts of {}: {}", event, err));
            Vec::new()
        },
    }
}

/// Whether the session user manages the bookings of a resource attendee.
/// Failures are recorded as session warnings, and mean "no".
async fn is_delegate_of(session: &CalendarSession, resource: &Attendee) -> bool {
    let entity = match resource.entity() {
        None => return false,
        Some(entity) => entity,
    };
    match session.entities().scheduling_privilege(entity, session.user()).await {
        Ok(privilege) => privilege.implies(SchedulingPrivilege::Delegate),
        Err(err) => {
            session.add_warning(&format!("Unable to get the scheduling privilege of user {} for resource {}: {}", session.user(), entity, err));
            false
        },
    }
}

/// The participation actions, depending on whether the event conflicts with others
fn participation_actions(has_conflicts: bool) -> [Action; 3] {
    if has_conflicts {
        [Action::Decline, Action::Tentative, Action::AcceptAndIgnoreConflicts]
    } else {
        [Action::Decline, Action::Tentative, Action::Accept]
    }
}

/// Describes the participation of the target user, and offers to change it
async fn add_part_stat_hints_and_actions(helper: &AnnotationHelper<'_>, builder: &mut AnalyzedChangeBuilder, event: &Event, has_conflicts: bool, target_user: EntityId) {
    builder.annotate_all(helper.part_stat_descriptions(event, target_user).await);
    if has_conflicts {
        builder.annotate(helper.conflicts(target_user).await);
    }
    builder.offer(&participation_actions(has_conflicts));
}

/// Same as [`add_part_stat_hints_and_actions`], for a resource the session user is a booking delegate of
async fn add_resource_part_stat_hints_and_actions(helper: &AnnotationHelper<'_>, builder: &mut AnalyzedChangeBuilder, event: &Event, has_conflicts: bool, resource: EntityId) {
    builder.annotate_all(helper.resource_part_stat_descriptions(event, resource).await);
    if has_conflicts {
        builder.annotate(helper.resource_conflicts(resource).await);
    }
    builder.offer(&participation_actions(has_conflicts));
}
