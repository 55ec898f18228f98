//! Calendar events (iCal `VEVENT` item)

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bitflags::bitflags;

use crate::calendar_user::{Attendee, CalendarUser, EntityId};

bitflags! {
    /// The fields of an [`Event`], used to restrict what is loaded from the storage, or to describe differences between two events
    #[derive(Serialize, Deserialize)]
    pub struct EventFields: u32 {
        const ID = 1 << 0;
        const SERIES_ID = 1 << 1;
        const FOLDER_ID = 1 << 2;
        const UID = 1 << 3;
        const RECURRENCE_ID = 1 << 4;
        const RECURRENCE_RULE = 1 << 5;
        const DELETE_EXCEPTION_DATES = 1 << 6;
        const CHANGE_EXCEPTION_DATES = 1 << 7;
        const START_DATE = 1 << 8;
        const END_DATE = 1 << 9;
        const TIMEZONE = 1 << 10;
        const SEQUENCE = 1 << 11;
        const DTSTAMP = 1 << 12;
        const SUMMARY = 1 << 13;
        const LOCATION = 1 << 14;
        const DESCRIPTION = 1 << 15;
        const ORGANIZER = 1 << 16;
        const ATTENDEES = 1 << 17;
        const EXTENDED_PROPERTIES = 1 << 18;
        const RELATED_TO = 1 << 19;
        const CREATED = 1 << 20;
        const CREATED_BY = 1 << 21;
        const LAST_MODIFIED = 1 << 22;
        const MODIFIED_BY = 1 << 23;
        const ATTENDEE_PRIVILEGES = 1 << 24;
        const FLAGS = 1 << 25;
        const CALENDAR_USER = 1 << 26;
    }
}

bitflags! {
    /// Hints for clients about the role the calendar user plays in an event
    #[derive(Serialize, Deserialize)]
    pub struct EventFlags: u16 {
        /// The event has an organizer and attendees
        const SCHEDULED = 1 << 0;
        /// The calendar user organizes the event
        const ORGANIZER = 1 << 1;
        /// The calendar user organizes the event on behalf of someone else
        const ORGANIZER_ON_BEHALF = 1 << 2;
        /// The calendar user attends the event
        const ATTENDEE = 1 << 3;
        /// The calendar user attends the event on behalf of someone else
        const ATTENDEE_ON_BEHALF = 1 << 4;
        /// The event is (part of) a recurring series
        const SERIES = 1 << 5;
        /// The event is a change exception of a series
        const OVERRIDDEN = 1 << 6;
    }
}


/// The `RECURRENCE-ID` of an occurrence of a recurring series
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecurrenceId(DateTime<Utc>);

impl RecurrenceId {
    pub fn new(value: DateTime<Utc>) -> Self {
        Self(value)
    }
    pub fn value(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Display for RecurrenceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%dT%H%M%SZ"))
    }
}


/// A property that has no dedicated field (e.g. `COMMENT`, or `X-` vendor properties)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtendedProperty {
    name: String,
    value: String,
}

impl ExtendedProperty {
    pub fn new(name: &str, value: &str) -> Self {
        Self { name: name.to_string(), value: value.to_string() }
    }
    pub fn name(&self) -> &str { &self.name }
    pub fn value(&self) -> &str { &self.value }
}


/// A `RELATED-TO` property
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelatedTo {
    rel_type: Option<String>,
    value: String,
}

impl RelatedTo {
    pub fn new(rel_type: Option<&str>, value: &str) -> Self {
        Self { rel_type: rel_type.map(|t| t.to_string()), value: value.to_string() }
    }
    pub fn rel_type(&self) -> Option<&str> { self.rel_type.as_deref() }
    pub fn value(&self) -> &str { &self.value }
}


/// An event of the calendar of an attendee that overlaps with another event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventConflict {
    uid: String,
    summary: Option<String>,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    /// Whether this conflict cannot be ignored (e.g. a resource already booked)
    hard_conflict: bool,
    conflicting_attendees: Vec<Attendee>,
}

impl EventConflict {
    pub fn new_with_parameters(uid: String, summary: Option<String>, start_date: DateTime<Utc>, end_date: Option<DateTime<Utc>>,
        hard_conflict: bool, conflicting_attendees: Vec<Attendee>) -> Self
    {
        Self { uid, summary, start_date, end_date, hard_conflict, conflicting_attendees }
    }

    pub fn uid(&self) -> &str { &self.uid }
    pub fn summary(&self) -> Option<&str> { self.summary.as_deref() }
    pub fn start_date(&self) -> DateTime<Utc> { self.start_date }
    pub fn end_date(&self) -> Option<DateTime<Utc>> { self.end_date }
    pub fn hard_conflict(&self) -> bool { self.hard_conflict }
    pub fn conflicting_attendees(&self) -> &[Attendee] { &self.conflicting_attendees }
}


/// A calendar event, either stored on this server, or coming from an incoming scheduling message
///
/// Events are values: methods named `with_*` return a modified copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The identifier of the stored event (`None` for incoming events)
    id: Option<String>,
    /// The identifier of the series master this event belongs to
    series_id: Option<String>,
    folder_id: Option<String>,
    /// Persistent, globally unique identifier for the calendar component
    uid: String,
    recurrence_id: Option<RecurrenceId>,
    /// The `RRULE`, for series masters
    recurrence_rule: Option<String>,
    delete_exception_dates: BTreeSet<RecurrenceId>,
    change_exception_dates: BTreeSet<RecurrenceId>,

    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    timezone: Option<String>,

    sequence: u32,
    dtstamp: DateTime<Utc>,

    summary: Option<String>,
    location: Option<String>,
    description: Option<String>,

    organizer: Option<CalendarUser>,
    attendees: Vec<Attendee>,

    extended_properties: Vec<ExtendedProperty>,
    related_to: Option<RelatedTo>,

    created: Option<DateTime<Utc>>,
    created_by: Option<EntityId>,
    last_modified: Option<DateTime<Utc>>,
    modified_by: Option<EntityId>,
    attendee_privileges: Option<String>,
    flags: EventFlags,
    /// The calendar user this event is stored for
    calendar_user: Option<EntityId>,
}

impl Event {
    /// Create an unscheduled event, with no identifier yet
    pub fn new(uid: &str, start_date: DateTime<Utc>, dtstamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            series_id: None,
            folder_id: None,
            uid: uid.to_string(),
            recurrence_id: None,
            recurrence_rule: None,
            delete_exception_dates: BTreeSet::new(),
            change_exception_dates: BTreeSet::new(),
            start_date,
            end_date: None,
            timezone: None,
            sequence: 0,
            dtstamp,
            summary: None,
            location: None,
            description: None,
            organizer: None,
            attendees: Vec::new(),
            extended_properties: Vec::new(),
            related_to: None,
            created: None,
            created_by: None,
            last_modified: None,
            modified_by: None,
            attendee_privileges: None,
            flags: EventFlags::empty(),
            calendar_user: None,
        }
    }

    pub fn id(&self) -> Option<&str> { self.id.as_deref() }
    pub fn series_id(&self) -> Option<&str> { self.series_id.as_deref() }
    pub fn folder_id(&self) -> Option<&str> { self.folder_id.as_deref() }
    pub fn uid(&self) -> &str { &self.uid }
    pub fn recurrence_id(&self) -> Option<&RecurrenceId> { self.recurrence_id.as_ref() }
    pub fn recurrence_rule(&self) -> Option<&str> { self.recurrence_rule.as_deref() }
    pub fn delete_exception_dates(&self) -> &BTreeSet<RecurrenceId> { &self.delete_exception_dates }
    pub fn change_exception_dates(&self) -> &BTreeSet<RecurrenceId> { &self.change_exception_dates }
    pub fn start_date(&self) -> DateTime<Utc> { self.start_date }
    pub fn end_date(&self) -> Option<DateTime<Utc>> { self.end_date }
    pub fn timezone(&self) -> Option<&str> { self.timezone.as_deref() }
    pub fn sequence(&self) -> u32 { self.sequence }
    pub fn dtstamp(&self) -> DateTime<Utc> { self.dtstamp }
    pub fn summary(&self) -> Option<&str> { self.summary.as_deref() }
    pub fn location(&self) -> Option<&str> { self.location.as_deref() }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn organizer(&self) -> Option<&CalendarUser> { self.organizer.as_ref() }
    pub fn attendees(&self) -> &[Attendee] { &self.attendees }
    pub fn extended_properties(&self) -> &[ExtendedProperty] { &self.extended_properties }
    pub fn related_to(&self) -> Option<&RelatedTo> { self.related_to.as_ref() }
    pub fn created(&self) -> Option<DateTime<Utc>> { self.created }
    pub fn created_by(&self) -> Option<EntityId> { self.created_by }
    pub fn last_modified(&self) -> Option<DateTime<Utc>> { self.last_modified }
    pub fn modified_by(&self) -> Option<EntityId> { self.modified_by }
    pub fn attendee_privileges(&self) -> Option<&str> { self.attendee_privileges.as_deref() }
    pub fn flags(&self) -> EventFlags { self.flags }
    pub fn calendar_user(&self) -> Option<EntityId> { self.calendar_user }

    /// Returns the first extended property with this name (case-insensitive)
    pub fn extended_property(&self, name: &str) -> Option<&ExtendedProperty> {
        self.extended_properties.iter().find(|prop| prop.name.eq_ignore_ascii_case(name))
    }

    /// Whether this event is the master of a recurring series
    pub fn is_series_master(&self) -> bool {
        self.recurrence_id.is_none() && self.recurrence_rule.is_some()
    }

    /// Whether this event is an occurrence of a recurring series
    pub fn is_series_exception(&self) -> bool {
        self.recurrence_id.is_some()
    }

    /// Whether this event has both an organizer and attendees
    pub fn is_group_scheduled(&self) -> bool {
        self.organizer.is_some() && !self.attendees.is_empty()
    }


    pub fn with_id(mut self, id: &str) -> Self { self.id = Some(id.to_string()); self }
    pub fn with_series_id(mut self, series_id: &str) -> Self { self.series_id = Some(series_id.to_string()); self }
    pub fn with_folder_id(mut self, folder_id: &str) -> Self { self.folder_id = Some(folder_id.to_string()); self }
    pub fn with_recurrence_id(mut self, recurrence_id: RecurrenceId) -> Self { self.recurrence_id = Some(recurrence_id); self }
    pub fn with_recurrence_rule(mut self, rule: &str) -> Self { self.recurrence_rule = Some(rule.to_string()); self }
    pub fn with_delete_exception_dates(mut self, dates: BTreeSet<RecurrenceId>) -> Self { self.delete_exception_dates = dates; self }
    pub fn with_change_exception_dates(mut self, dates: BTreeSet<RecurrenceId>) -> Self { self.change_exception_dates = dates; self }
    pub fn with_start_date(mut self, start_date: DateTime<Utc>) -> Self { self.start_date = start_date; self }
    pub fn with_end_date(mut self, end_date: DateTime<Utc>) -> Self { self.end_date = Some(end_date); self }
    pub fn with_timezone(mut self, timezone: &str) -> Self { self.timezone = Some(timezone.to_string()); self }
    pub fn with_sequence(mut self, sequence: u32) -> Self { self.sequence = sequence; self }
    pub fn with_dtstamp(mut self, dtstamp: DateTime<Utc>) -> Self { self.dtstamp = dtstamp; self }
    pub fn with_summary(mut self, summary: &str) -> Self { self.summary = Some(summary.to_string()); self }
    pub fn with_location(mut self, location: &str) -> Self { self.location = Some(location.to_string()); self }
    pub fn with_description(mut self, description: &str) -> Self { self.description = Some(description.to_string()); self }
    pub fn with_organizer(mut self, organizer: CalendarUser) -> Self { self.organizer = Some(organizer); self }
    pub fn with_attendees(mut self, attendees: Vec<Attendee>) -> Self { self.attendees = attendees; self }
    pub fn with_extended_property(mut self, property: ExtendedProperty) -> Self { self.extended_properties.push(property); self }
    pub fn with_related_to(mut self, related_to: RelatedTo) -> Self { self.related_to = Some(related_to); self }
    pub fn with_created(mut self, created: DateTime<Utc>, created_by: EntityId) -> Self {
        self.created = Some(created);
        self.created_by = Some(created_by);
        self
    }
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>, modified_by: EntityId) -> Self {
        self.last_modified = Some(last_modified);
        self.modified_by = Some(modified_by);
        self
    }
    pub fn with_attendee_privileges(mut self, privileges: &str) -> Self { self.attendee_privileges = Some(privileges.to_string()); self }
    pub fn with_calendar_user(mut self, calendar_user: EntityId) -> Self { self.calendar_user = Some(calendar_user); self }

    pub fn organizer_mut(&mut self) -> Option<&mut CalendarUser> { self.organizer.as_mut() }
    pub fn attendees_mut(&mut self) -> &mut Vec<Attendee> { &mut self.attendees }
    pub fn set_timezone(&mut self, timezone: Option<String>) { self.timezone = timezone; }
    pub fn set_flags(&mut self, flags: EventFlags) { self.flags = flags; }

    /// The fields whose values differ between both events
    pub fn differing_fields(&self, other: &Event) -> EventFields {
        crate::utils::comparison::differing_fields(self, other)
    }

    /// Returns a copy of this event, where only `fields` are set (`None` keeping them all).
    ///
    /// The UID, start date, sequence and dtstamp are always kept
    pub fn filtered(&self, fields: Option<EventFields>) -> Event {
        let fields = match fields {
            None => return self.clone(),
            Some(fields) => fields,
        };
        let mut copy = Event::new(&self.uid, self.start_date, self.dtstamp).with_sequence(self.sequence);
        macro_rules! keep {
            ($flag:ident, $field:ident) => {
                if fields.contains(EventFields::$flag) {
                    copy.$field = self.$field.clone();
                }
            };
        }
        keep!(ID, id);
        keep!(SERIES_ID, series_id);
        keep!(FOLDER_ID, folder_id);
        keep!(RECURRENCE_ID, recurrence_id);
        keep!(RECURRENCE_RULE, recurrence_rule);
        keep!(DELETE_EXCEPTION_DATES, delete_exception_dates);
        keep!(CHANGE_EXCEPTION_DATES, change_exception_dates);
        keep!(END_DATE, end_date);
        keep!(TIMEZONE, timezone);
        keep!(SUMMARY, summary);
        keep!(LOCATION, location);
        keep!(DESCRIPTION, description);
        keep!(ORGANIZER, organizer);
        keep!(ATTENDEES, attendees);
        keep!(EXTENDED_PROPERTIES, extended_properties);
        keep!(RELATED_TO, related_to);
        keep!(CREATED, created);
        keep!(CREATED_BY, created_by);
        keep!(LAST_MODIFIED, last_modified);
        keep!(MODIFIED_BY, modified_by);
        keep!(ATTENDEE_PRIVILEGES, attendee_privileges);
        keep!(FLAGS, flags);
        keep!(CALENDAR_USER, calendar_user);
        copy
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.recurrence_id {
            Some(rid) => write!(f, "{} [{}] (seq {})", self.uid, rid, self.sequence),
            None => write!(f, "{} (seq {})", self.uid, self.sequence),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_filtered() {
        let start = Utc.ymd(2021, 5, 3).and_hms(10, 0, 0);
        let event = Event::new("uid-1", start, start)
            .with_id("42")
            .with_sequence(3)
            .with_summary("Weekly")
            .with_description("Boring")
            .with_extended_property(ExtendedProperty::new("COMMENT", "hi"));

        let filtered = event.filtered(Some(EventFields::ID | EventFields::SUMMARY));
        assert_eq!(filtered.id(), Some("42"));
        assert_eq!(filtered.summary(), Some("Weekly"));
        assert_eq!(filtered.description(), None);
        assert_eq!(filtered.sequence(), 3);
        assert!(filtered.extended_property("comment").is_none());

        assert_eq!(event.filtered(None), event);
        assert_eq!(event.extended_property("Comment").map(|p| p.value()), Some("hi"));
    }

    #[test]
    fn test_series_detection() {
        let start = Utc.ymd(2021, 5, 3).and_hms(10, 0, 0);
        let master = Event::new("uid-1", start, start).with_recurrence_rule("FREQ=WEEKLY");
        let occurrence = Event::new("uid-1", start, start).with_recurrence_id(RecurrenceId::new(start));
        assert!(master.is_series_master());
        assert!(!master.is_series_exception());
        assert!(!occurrence.is_series_master());
        assert!(occurrence.is_series_exception());
    }
}
