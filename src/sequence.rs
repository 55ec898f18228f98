//! Ordering of the revisions of an event, as defined by [RFC 5546](https://tools.ietf.org/html/rfc5546#section-2.1.5)

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::event::Event;

/// The iTIP revision of an event: its `SEQUENCE`, then its `DTSTAMP` as a tie-breaker.
///
/// This is a total order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ITipSequence {
    sequence: u32,
    dtstamp: DateTime<Utc>,
}

impl ITipSequence {
    pub fn new(sequence: u32, dtstamp: DateTime<Utc>) -> Self {
        Self { sequence, dtstamp }
    }

    pub fn of(event: &Event) -> Self {
        Self::new(event.sequence(), event.dtstamp())
    }

    pub fn sequence(&self) -> u32 { self.sequence }
    pub fn dtstamp(&self) -> DateTime<Utc> { self.dtstamp }

    pub fn before(&self, other: &ITipSequence) -> bool {
        self < other
    }
    pub fn before_or_equals(&self, other: &ITipSequence) -> bool {
        self <= other
    }
    pub fn after(&self, other: &ITipSequence) -> bool {
        self > other
    }
    pub fn after_or_equals(&self, other: &ITipSequence) -> bool {
        self >= other
    }
}

impl Display for ITipSequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.sequence, self.dtstamp.to_rfc3339())
    }
}

/// Whether an incoming event has the same iTIP revision as its stored counterpart.
///
/// Internal organizers bump the `DTSTAMP` on non-consequential changes too, so only the `SEQUENCE` is compared for them.
/// Events of external organizers must match both.
pub fn matches_itip_revision(incoming: &Event, stored: &Event) -> bool {
    let internal_organizer = incoming.organizer().map(|organizer| organizer.is_internal()).unwrap_or(false);
    if internal_organizer && incoming.sequence() == stored.sequence() {
        return true;
    }
    ITipSequence::of(incoming) == ITipSequence::of(stored)
}
