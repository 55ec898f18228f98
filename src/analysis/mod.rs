//! The result of the analysis of an incoming scheduling message

pub mod annotation;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::calendar_user::Attendee;
use crate::event::{Event, EventConflict};
use crate::message::SchedulingMethod;
use crate::resource::CalendarObjectResource;
use annotation::Annotation;

/// What the recipient of a scheduling message may do about it
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Ignore,
    /// Ask the organizer to send the current state of the event again
    RequestRefresh,
    /// Send the current state of the event to the attendee who asked for it
    SendRefresh,
    ApplyCreate,
    ApplyChange,
    /// Apply the participation status of a replying attendee
    ApplyResponse,
    ApplyRemove,
    /// Apply the changes proposed by a countering attendee
    ApplyProposal,
    Accept,
    Decline,
    Tentative,
    AcceptAndIgnoreConflicts,
    /// Add an uninvited replying attendee to the event
    AcceptPartyCrasher,
    DeclineCounter,
}

/// The kind of change an incoming event brings to the stored data
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

/// An incoming event, along with its stored counterpart
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change {
    change_type: ChangeType,
    new_event: Event,
    current_event: Option<Event>,
    conflicts: Vec<EventConflict>,
}

impl Change {
    pub fn new(change_type: ChangeType, new_event: Event, current_event: Option<Event>) -> Self {
        Self { change_type, new_event, current_event, conflicts: Vec::new() }
    }

    pub fn with_conflicts(mut self, conflicts: Vec<EventConflict>) -> Self {
        self.conflicts = conflicts;
        self
    }

    pub fn change_type(&self) -> ChangeType { self.change_type }
    pub fn new_event(&self) -> &Event { &self.new_event }
    pub fn current_event(&self) -> Option<&Event> { self.current_event.as_ref() }
    pub fn conflicts(&self) -> &[EventConflict] { &self.conflicts }
}


/// The analysis of a single incoming event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedChange {
    change: Change,
    annotations: Vec<Annotation>,
    actions: BTreeSet<Action>,
    /// The attendee whose participation status the recipient is asked about
    targeted_attendee: Option<Attendee>,
}

impl AnalyzedChange {
    pub fn change(&self) -> &Change { &self.change }
    pub fn annotations(&self) -> &[Annotation] { &self.annotations }
    pub fn actions(&self) -> &BTreeSet<Action> { &self.actions }
    pub fn targeted_attendee(&self) -> Option<&Attendee> { self.targeted_attendee.as_ref() }

    pub fn has_action(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

/// Collects the annotations and actions of an event while it is being analyzed
#[derive(Default)]
pub(crate) struct AnalyzedChangeBuilder {
    annotations: Vec<Annotation>,
    actions: BTreeSet<Action>,
    targeted_attendee: Option<Attendee>,
}

impl AnalyzedChangeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotate(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    pub fn annotate_all(&mut self, annotations: Vec<Annotation>) {
        self.annotations.extend(annotations);
    }

    pub fn offer(&mut self, actions: &[Action]) {
        self.actions.extend(actions.iter().copied());
    }

    pub fn target(&mut self, attendee: Option<Attendee>) {
        self.targeted_attendee = attendee;
    }

    pub fn build(self, change: Change) -> AnalyzedChange {
        AnalyzedChange {
            change,
            annotations: self.annotations,
            actions: self.actions,
            targeted_attendee: self.targeted_attendee,
        }
    }
}


/// The analysis of an incoming scheduling message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ITipAnalysis {
    method: SchedulingMethod,
    uid: String,
    /// The stored calendar object resource the message refers to
    original_resource: Option<CalendarObjectResource>,
    /// The stored resource related to the incoming one by a calendar split
    stored_related_resource: Option<CalendarObjectResource>,
    changes: Vec<AnalyzedChange>,
    main_change: Option<usize>,
}

impl ITipAnalysis {
    pub fn new(method: SchedulingMethod, uid: &str, original_resource: Option<CalendarObjectResource>,
        stored_related_resource: Option<CalendarObjectResource>, changes: Vec<AnalyzedChange>) -> Self
    {
        let main_change = crate::utils::find_main_change(&changes);
        Self { method, uid: uid.to_string(), original_resource, stored_related_resource, changes, main_change }
    }

    /// The analysis returned when the session may not act on behalf of the targeted calendar user
    pub fn insufficient_permissions(method: SchedulingMethod, uid: &str) -> Self {
        Self::new(method, uid, None, None, Vec::new())
    }

    pub fn method(&self) -> SchedulingMethod { self.method }
    pub fn uid(&self) -> &str { &self.uid }
    pub fn original_resource(&self) -> Option<&CalendarObjectResource> { self.original_resource.as_ref() }
    pub fn stored_related_resource(&self) -> Option<&CalendarObjectResource> { self.stored_related_resource.as_ref() }
    pub fn changes(&self) -> &[AnalyzedChange] { &self.changes }

    /// The change that best describes the whole message
    pub fn main_change(&self) -> Option<&AnalyzedChange> {
        self.main_change.and_then(|index| self.changes.get(index))
    }
}
