//! Utilities to compare events

use crate::event::{Event, EventFields};

/// Returns the set of fields whose values differ between two events
pub fn differing_fields(left: &Event, right: &Event) -> EventFields {
    let mut fields = EventFields::empty();
    macro_rules! compare {
        ($flag:ident, $getter:ident) => {
            if left.$getter() != right.$getter() {
                fields.insert(EventFields::$flag);
            }
        };
    }
    compare!(ID, id);
    compare!(SERIES_ID, series_id);
    compare!(FOLDER_ID, folder_id);
    compare!(UID, uid);
    compare!(RECURRENCE_ID, recurrence_id);
    compare!(RECURRENCE_RULE, recurrence_rule);
    compare!(DELETE_EXCEPTION_DATES, delete_exception_dates);
    compare!(CHANGE_EXCEPTION_DATES, change_exception_dates);
    compare!(START_DATE, start_date);
    compare!(END_DATE, end_date);
    compare!(TIMEZONE, timezone);
    compare!(SEQUENCE, sequence);
    compare!(DTSTAMP, dtstamp);
    compare!(SUMMARY, summary);
    compare!(LOCATION, location);
    compare!(DESCRIPTION, description);
    compare!(ORGANIZER, organizer);
    compare!(ATTENDEES, attendees);
    compare!(EXTENDED_PROPERTIES, extended_properties);
    compare!(RELATED_TO, related_to);
    compare!(CREATED, created);
    compare!(CREATED_BY, created_by);
    compare!(LAST_MODIFIED, last_modified);
    compare!(MODIFIED_BY, modified_by);
    compare!(ATTENDEE_PRIVILEGES, attendee_privileges);
    compare!(FLAGS, flags);
    compare!(CALENDAR_USER, calendar_user);
    fields
}

/// Orders events by start date, then by recurrence id (series masters first)
pub fn compare_events_chrono(left: &Event, right: &Event) -> std::cmp::Ordering {
    left.start_date().cmp(&right.start_date())
        .then_with(|| left.recurrence_id().cmp(&right.recurrence_id()))
}
