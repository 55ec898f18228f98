//! Contracts of the services the analysis relies on.
//!
//! The analysis never stores anything by itself. Every piece of calendar data (stored events, tombstones, permissions, free/busy data...) comes from these collaborators.

use async_trait::async_trait;

use crate::calendar_user::{Attendee, CalendarUser, EntityId, SchedulingPrivilege};
use crate::error::ServiceError;
use crate::event::{Event, EventConflict, EventFields, RecurrenceId, RelatedTo};
use crate::permission::Permissions;

/// The key used to retrieve stored events
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lookup<'a> {
    /// Events with this UID
    Uid(&'a str),
    /// Events related to another one (e.g. after a calendar split)
    RelatedTo(&'a RelatedTo),
}

/// Access to the stored events
#[async_trait]
pub trait CalendarUtilities: Send + Sync {
    /// Returns the events matching `lookup`, from the personal and public folders of `calendar_user` and as seen from this user.
    ///
    /// When `tombstones` is true, this looks up deleted records instead of live events. \
    /// `fields` restricts the loaded fields (`None` loads all of them)
    async fn lookup_by_field(&self, lookup: Lookup<'_>, calendar_user: EntityId, tombstones: bool, fields: Option<EventFields>) -> Result<Vec<Event>, ServiceError>;

    /// Moves the timezones of `event` to ones known to this server, possibly reusing those of the `original` event
    async fn adjust_time_zones(&self, calendar_user: EntityId, event: &mut Event, original: Option<&Event>) -> Result<(), ServiceError>;
}

/// Expansion of recurring series
#[async_trait]
pub trait RecurrenceService: Send + Sync {
    /// Returns the (virtual) occurrence of `series_master` at `recurrence_id`
    async fn occurrence(&self, series_master: &Event, recurrence_id: &RecurrenceId) -> Result<Event, ServiceError>;
}

#[async_trait]
pub trait FreeBusyService: Send + Sync {
    /// Returns the conflicts `event` would cause in the calendars of `attendees`
    async fn check_conflicts(&self, event: &Event, attendees: &[Attendee]) -> Result<Vec<EventConflict>, ServiceError>;
}

/// Resolution of calendar users to internal entities, and their settings
#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// The identifier of the default calendar folder of `user`
    async fn default_folder(&self, user: EntityId) -> Result<String, ServiceError>;
    /// The booking rights `user` holds on the resource `resource`
    async fn scheduling_privilege(&self, resource: EntityId, user: EntityId) -> Result<SchedulingPrivilege, ServiceError>;
    async fn locale(&self, user: EntityId) -> Result<String, ServiceError>;
    async fn timezone(&self, user: EntityId) -> Result<String, ServiceError>;
    async fn display_name(&self, entity: EntityId) -> Result<String, ServiceError>;

    /// Resolves the attendees to internal entities.
    ///
    /// When `resolvable` is set, only these entities may be assigned, other attendees are left external.
    async fn prepare_attendees(&self, attendees: &mut [Attendee], resolvable: Option<&[EntityId]>) -> Result<(), ServiceError>;
    /// Same as [`EntityResolver::prepare_attendees`], for an organizer
    async fn prepare_organizer(&self, organizer: &mut CalendarUser, resolvable: Option<&[EntityId]>) -> Result<(), ServiceError>;
    /// Returns an attendee record describing the internal `user`
    async fn prepare_user_attendee(&self, user: EntityId) -> Result<Attendee, ServiceError>;
}

/// Access to the folder permissions
#[async_trait]
pub trait FolderService: Send + Sync {
    /// The permissions `user` holds in `folder`
    async fn effective_permissions(&self, user: EntityId, folder: &str) -> Result<Permissions, ServiceError>;
}
