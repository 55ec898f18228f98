//! Calendar object resources, i.e. the set of events sharing a UID

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::calendar_user::CalendarUser;
use crate::error::AnalysisError;
use crate::event::{Event, RecurrenceId};

/// A non-recurring event, or a recurring series master along with its change exceptions.
///
/// Two resources are equal when they have the same UID.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "StoredEvents")]
pub struct CalendarObjectResource {
    events: Vec<Event>,
}

/// The serialized form of a [`CalendarObjectResource`], before checking it holds at least one event
#[derive(Deserialize)]
struct StoredEvents {
    events: Vec<Event>,
}

impl TryFrom<StoredEvents> for CalendarObjectResource {
    type Error = AnalysisError;

    fn try_from(stored: StoredEvents) -> Result<Self, Self::Error> {
        Self::try_from(stored.events)
    }
}

impl TryFrom<Vec<Event>> for CalendarObjectResource {
    type Error = AnalysisError;

    fn try_from(events: Vec<Event>) -> Result<Self, Self::Error> {
        Self::new(events).ok_or(AnalysisError::EmptyResource)
    }
}

impl CalendarObjectResource {
    /// Create a resource. Returns `None` in case `events` is empty
    pub fn new(events: Vec<Event>) -> Option<Self> {
        if events.is_empty() {
            return None;
        }
        Some(Self { events })
    }

    pub fn uid(&self) -> &str {
        self.first_event().uid()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn first_event(&self) -> &Event {
        // Resources are never built empty
        &self.events[0]
    }

    /// The series master of this resource, if any
    pub fn series_master(&self) -> Option<&Event> {
        self.events.iter().find(|event| event.recurrence_id().is_none() && event.recurrence_rule().is_some())
    }

    /// The stored change exception for this recurrence id, if any
    pub fn change_exception(&self, recurrence_id: &RecurrenceId) -> Option<&Event> {
        self.events.iter().find(|event| event.recurrence_id() == Some(recurrence_id))
    }

    /// The organizer of the resource, as found in its first event
    pub fn organizer(&self) -> Option<&CalendarUser> {
        self.first_event().organizer()
    }
}

impl PartialEq for CalendarObjectResource {
    fn eq(&self, other: &Self) -> bool {
        self.uid() == other.uid()
    }
}
