//! The context an analysis runs in

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::calendar_user::EntityId;
use crate::message::ITipData;
use crate::traits::{CalendarUtilities, EntityResolver, FolderService, FreeBusyService, RecurrenceService};

/// A non-fatal problem that happened during an analysis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionWarning {
    message: String,
}

impl SessionWarning {
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for SessionWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}


/// The session of the user that asks for an analysis, along with the services it can use
pub struct CalendarSession {
    user: EntityId,
    /// The unique identifier of this server installation
    server_uid: String,
    context_id: u32,

    utilities: Arc<dyn CalendarUtilities>,
    recurrence: Arc<dyn RecurrenceService>,
    free_busy: Arc<dyn FreeBusyService>,
    entities: Arc<dyn EntityResolver>,
    folders: Arc<dyn FolderService>,

    warnings: Mutex<Vec<SessionWarning>>,
}

impl CalendarSession {
    pub fn new_with_parameters(user: EntityId, server_uid: &str, context_id: u32,
        utilities: Arc<dyn CalendarUtilities>,
        recurrence: Arc<dyn RecurrenceService>,
        free_busy: Arc<dyn FreeBusyService>,
        entities: Arc<dyn EntityResolver>,
        folders: Arc<dyn FolderService>) -> Self
    {
        Self {
            user, server_uid: server_uid.to_string(), context_id,
            utilities, recurrence, free_busy, entities, folders,
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Create a session where every service is provided by the same instance
    pub fn with_services<S>(user: EntityId, server_uid: &str, context_id: u32, services: Arc<S>) -> Self
    where
        S: CalendarUtilities + RecurrenceService + FreeBusyService + EntityResolver + FolderService + 'static,
    {
        Self::new_with_parameters(user, server_uid, context_id,
            services.clone(), services.clone(), services.clone(), services.clone(), services)
    }

    /// The user this session belongs to
    pub fn user(&self) -> EntityId { self.user }
    pub fn server_uid(&self) -> &str { &self.server_uid }
    pub fn context_id(&self) -> u32 { self.context_id }

    pub fn utilities(&self) -> &dyn CalendarUtilities { self.utilities.as_ref() }
    pub fn recurrence(&self) -> &dyn RecurrenceService { self.recurrence.as_ref() }
    pub fn free_busy(&self) -> &dyn FreeBusyService { self.free_busy.as_ref() }
    pub fn entities(&self) -> &dyn EntityResolver { self.entities.as_ref() }
    pub fn folders(&self) -> &dyn FolderService { self.folders.as_ref() }

    /// Whether this correlation token has been issued by this very server and context
    pub fn issued(&self, data: &ITipData) -> bool {
        data.server_uid() == self.server_uid && data.context_id() == self.context_id
    }

    /// Log a warning, and keep it so that it can be reported to the caller
    pub fn add_warning(&self, text: &str) {
        log::warn!("{}", text);
        let mut warnings = self.warnings.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        warnings.push(SessionWarning { message: text.to_string() });
    }

    /// The warnings that have been recorded so far
    pub fn warnings(&self) -> Vec<SessionWarning> {
        self.warnings.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}
