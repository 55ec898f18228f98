//! This module gives access to the stored data an incoming scheduling message refers to
//!
//! Every lookup is done at most once per analysis, and its result is kept for the lifetime of the [`ObjectResourceProvider`].

use once_cell::sync::OnceCell;

use crate::calendar_user::{EntityId, find_attendee_by_entity};
use crate::config;
use crate::error::AnalysisError;
use crate::event::{Event, EventFields, RecurrenceId};
use crate::message::{ITipData, IncomingSchedulingMessage};
use crate::resource::CalendarObjectResource;
use crate::session::CalendarSession;
use crate::traits::Lookup;

pub mod patch;

/// The extended property that tells which series an event has been split from
const SPLIT_FROM_PROPERTY: &str = "X-OX-SPLIT-FROM";
/// The `RELTYPE` that links the parts of a split series
const RECURRENCE_SET_RELTYPE: &str = "X-CALENDARSERVER-RECURRENCE-SET";

/// Provides the incoming events of a scheduling message, and the stored data they refer to.
///
/// One provider must be used for a single analysis only.
pub struct ObjectResourceProvider<'a> {
    session: &'a CalendarSession,
    message: &'a IncomingSchedulingMessage,
    /// The calendar user whose perspective the analysis takes
    calendar_user: EntityId,
    /// The fields loaded from the storage (`None` for all of them)
    fields: Option<EventFields>,

    stored_resource: OnceCell<Option<CalendarObjectResource>>,
    tombstone_resource: OnceCell<Option<CalendarObjectResource>>,
    stored_related_resource: OnceCell<Option<CalendarObjectResource>>,
    uses_organizer_copy: OnceCell<bool>,
}

impl<'a> ObjectResourceProvider<'a> {
    /// Create a provider that loads the [`DEFAULT_FIELDS`](crate::config::DEFAULT_FIELDS) of the stored events
    pub fn new(session: &'a CalendarSession, message: &'a IncomingSchedulingMessage) -> Self {
        Self::new_with_fields(session, message, Some(*config::DEFAULT_FIELDS))
    }

    pub fn new_with_fields(session: &'a CalendarSession, message: &'a IncomingSchedulingMessage, fields: Option<EventFields>) -> Self {
        let calendar_user = message.itip_data()
            .filter(|data| session.issued(data))
            .and_then(|data| data.sent_by_resource())
            .unwrap_or_else(|| message.target_user());
        Self {
            session, message, calendar_user, fields,
            stored_resource: OnceCell::new(),
            tombstone_resource: OnceCell::new(),
            stored_related_resource: OnceCell::new(),
            uses_organizer_copy: OnceCell::new(),
        }
    }

    pub fn session(&self) -> &CalendarSession { self.session }
    pub fn message(&self) -> &IncomingSchedulingMessage { self.message }

    pub fn uid(&self) -> &str {
        self.message.resource().uid()
    }

    /// The effective calendar user: the resource a message has been sent on behalf of, or the target user
    pub fn calendar_user(&self) -> EntityId {
        self.calendar_user
    }

    /// The correlation token of the message, in case it has been issued by this server
    pub fn itip_data(&self) -> Option<&ITipData> {
        self.message.itip_data().filter(|data| self.session.issued(data))
    }

    /// Whether the message comes from another user of this server and context
    pub fn is_internal_scheduling_resource(&self) -> bool {
        self.itip_data().is_some()
    }

    async fn lookup(&self, lookup: Lookup<'_>, calendar_user: EntityId, tombstones: bool, fields: Option<EventFields>) -> Result<Vec<Event>, AnalysisError> {
        log::trace!("Looking up {:?} for user {} (tombstones: {})", lookup, calendar_user, tombstones);
        self.session.utilities()
            .lookup_by_field(lookup, calendar_user, tombstones, fields)
            .await
            .map_err(AnalysisError::Storage)
    }

    /// The live events stored for the UID of the message, in the personal and public folders of the calendar user
    pub async fn stored_resource(&self) -> Result<Option<&CalendarObjectResource>, AnalysisError> {
        if self.stored_resource.get().is_none() {
            let events = self.lookup(Lookup::Uid(self.uid()), self.calendar_user, false, self.fields).await?;
            let _ = self.stored_resource.set(CalendarObjectResource::new(events));
        }
        Ok(self.stored_resource.get().and_then(|resource| resource.as_ref()))
    }

    /// Same as [`Self::stored_resource`], for the deleted events
    pub async fn tombstone_resource(&self) -> Result<Option<&CalendarObjectResource>, AnalysisError> {
        if self.tombstone_resource.get().is_none() {
            let events = self.lookup(Lookup::Uid(self.uid()), self.calendar_user, true, self.fields).await?;
            let _ = self.tombstone_resource.set(CalendarObjectResource::new(events));
        }
        Ok(self.tombstone_resource.get().and_then(|resource| resource.as_ref()))
    }

    /// The stored resource the incoming series has been split from (or split into), if any
    pub async fn stored_related_resource(&self) -> Result<Option<&CalendarObjectResource>, AnalysisError> {
        if self.stored_related_resource.get().is_none() {
            let related = self.load_related_resource().await?;
            let _ = self.stored_related_resource.set(related);
        }
        Ok(self.stored_related_resource.get().and_then(|resource| resource.as_ref()))
    }

    async fn load_related_resource(&self) -> Result<Option<CalendarObjectResource>, AnalysisError> {
        let master = match self.message.resource().series_master() {
            None => return Ok(None),
            Some(master) => master,
        };

        if let Some(split_from) = master.extended_property(SPLIT_FROM_PROPERTY).map(|prop| prop.value()).filter(|v| !v.is_empty()) {
            let events = self.lookup(Lookup::Uid(split_from), self.calendar_user, false, self.fields).await?;
            if let Some(resource) = first_resource(events) {
                return Ok(Some(resource));
            }
        }

        if let Some(related_to) = master.related_to().filter(|rel| rel.rel_type() == Some(RECURRENCE_SET_RELTYPE)) {
            let events = self.lookup(Lookup::RelatedTo(related_to), self.calendar_user, false, self.fields).await?;
            return Ok(first_resource(events));
        }
        Ok(None)
    }

    /// Whether the message refers to the organizer's own stored copy of the event.
    ///
    /// This is the case for messages exchanged between users of this server, unless the calendar user keeps a detached copy
    /// (e.g. because they had no calendar access when they were invited, or because they added a forwarded invitation).
    pub async fn uses_organizer_copy(&self) -> bool {
        if let Some(value) = self.uses_organizer_copy.get() {
            return *value;
        }
        let value = self.detect_organizer_copy().await;
        log::debug!("Message for {} refers to the organizer copy: {}", self.uid(), value);
        let _ = self.uses_organizer_copy.set(value);
        value
    }

    async fn detect_organizer_copy(&self) -> bool {
        if !self.is_internal_scheduling_resource() {
            return false;
        }
        let mut organizer = match self.message.resource().organizer() {
            None => return false,
            Some(organizer) => organizer.clone(),
        };
        if let Err(err) = self.session.entities().prepare_organizer(&mut organizer, None).await {
            self.session.add_warning(&format!("Unable to resolve organizer {}, assuming an external one: {}", organizer, err));
            return false;
        }
        let organizer_entity = match organizer.entity() {
            None => return false,
            Some(entity) => entity,
        };
        if organizer_entity == self.calendar_user {
            return true;
        }

        // Does the organizer copy list the calendar user as attendee?
        let lookup = Lookup::Uid(self.uid());
        match self.lookup(lookup, organizer_entity, false, Some(EventFields::ATTENDEES | EventFields::ORGANIZER)).await {
            Ok(events) => events.iter().any(|event| find_attendee_by_entity(event.attendees(), self.calendar_user).is_some()),
            Err(err) => {
                self.session.add_warning(&format!("Unable to look up the organizer copy of {}, assuming an external one: {}", self.uid(), err));
                false
            },
        }
    }

    /// The events of the incoming message, patched for the analysis (see [`patch::patch_event`])
    pub async fn incoming_events(&self) -> Vec<Event> {
        let resource = self.resource_for_patching().await;
        let uses_organizer_copy = self.uses_organizer_copy().await;
        let mut events = Vec::new();
        for event in self.message.resource().events() {
            events.push(patch::patch_event(self.session, event, resource, self.calendar_user, uses_organizer_copy).await);
        }
        events
    }

    async fn resource_for_patching(&self) -> Option<&CalendarObjectResource> {
        match self.stored_resource().await {
            Ok(Some(resource)) => return Some(resource),
            Ok(None) => {},
            Err(err) => log::debug!("Unable to get the stored resource for patching: {}", err),
        }
        match self.tombstone_resource().await {
            Ok(resource) => resource,
            Err(err) => {
                log::debug!("Unable to get the tombstone resource for patching: {}", err);
                None
            },
        }
    }

    /// The stored event (or occurrence) that corresponds to an incoming event
    pub async fn opt_matching_event(&self, incoming: &Event) -> Result<Option<Event>, AnalysisError> {
        let stored = self.stored_resource().await?;
        Ok(self.matching_event(incoming, stored).await)
    }

    /// The deleted event (or occurrence) that corresponds to an incoming event.
    ///
    /// Occurrences deleted from a series that still exists have no tombstone of their own: a virtual one is made from the series master.
    pub async fn opt_matching_tombstone(&self, incoming: &Event) -> Result<Option<Event>, AnalysisError> {
        let tombstones = self.tombstone_resource().await?;
        if let Some(tombstone) = self.matching_event(incoming, tombstones).await {
            return Ok(Some(tombstone));
        }

        let recurrence_id = match incoming.recurrence_id() {
            None => return Ok(None),
            Some(rid) => rid,
        };
        let master = match self.stored_resource().await?.and_then(|resource| resource.series_master()) {
            None => return Ok(None),
            Some(master) => master,
        };
        if !master.delete_exception_dates().contains(recurrence_id) {
            return Ok(None);
        }
        log::debug!("Occurrence {} of {} is a delete exception, using a virtual tombstone", recurrence_id, master);
        let plain_master = master.clone().with_delete_exception_dates(Default::default());
        Ok(self.occurrence(&plain_master, recurrence_id).await)
    }

    async fn matching_event(&self, incoming: &Event, resource: Option<&CalendarObjectResource>) -> Option<Event> {
        let resource = resource?;
        if let Some(recurrence_id) = incoming.recurrence_id() {
            if let Some(exception) = resource.change_exception(recurrence_id) {
                return Some(exception.clone());
            }
            return match resource.series_master() {
                Some(master) if master.delete_exception_dates().contains(recurrence_id) => None,
                Some(master) => self.occurrence(master, recurrence_id).await,
                None => None,
            };
        }
        let first = resource.first_event();
        if first.recurrence_id().is_none() {
            Some(first.clone())
        } else {
            None
        }
    }

    async fn occurrence(&self, master: &Event, recurrence_id: &RecurrenceId) -> Option<Event> {
        match self.session.recurrence().occurrence(master, recurrence_id).await {
            Ok(occurrence) => Some(occurrence),
            Err(err) => {
                self.session.add_warning(&format!("Unable to prepare occurrence {} of {}: {}", recurrence_id, master, err));
                None
            },
        }
    }
}

/// Groups events by UID, and returns the resource of the first UID
fn first_resource(events: Vec<Event>) -> Option<CalendarObjectResource> {
    let uid = events.first()?.uid().to_string();
    CalendarObjectResource::new(events.into_iter().filter(|event| event.uid() == uid).collect())
}
