//! Some utility functions shared by the analyzers

pub mod comparison;

use crate::analysis::{AnalyzedChange, ChangeType};
use crate::calendar_user::{Attendee, CalendarUser, find_attendee};
use crate::config;
use crate::event::{Event, EventFields};
use crate::session::CalendarSession;

/// The summary of an event, falling back to the one of `alternative`, and finally to an empty string
pub fn summary(event: Option<&Event>, alternative: Option<&Event>) -> String {
    event.and_then(|e| e.summary())
        .filter(|s| !s.is_empty())
        .or_else(|| alternative.and_then(|e| e.summary()))
        .unwrap_or_default()
        .to_string()
}

/// The comment the originator may have left in the `COMMENT` property
pub fn opt_comment(event: &Event) -> Option<String> {
    event.extended_property("COMMENT")
        .map(|prop| prop.value().trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

/// Selects the attendee of an incoming event that matches the originator of the message.
///
/// Unless `must_match` is set, this falls back to the first attendee (which covers messages of clients that omit the identity of the only attendee)
pub fn select_attendee<'a>(event: &'a Event, originator: Option<&CalendarUser>, must_match: bool) -> Option<&'a Attendee> {
    let attendees = event.attendees();
    if attendees.is_empty() {
        return None;
    }
    if let Some(originator) = originator {
        if must_match {
            return find_attendee(attendees, originator);
        }
        if attendees.len() > 1 {
            if let Some(attendee) = find_attendee(attendees, originator) {
                return Some(attendee);
            }
        }
    }
    attendees.first()
}

/// Returns the resource (or room) attendee whose `SENT-BY` is the originator.
///
/// This is how messages relayed by the booking delegate of a managed resource look like.
pub fn opt_resource_sent_by<'a>(event: &'a Event, originator: &CalendarUser) -> Option<&'a Attendee> {
    event.attendees().iter()
        .filter(|attendee| attendee.cu_type().is_resource())
        .find(|attendee| attendee.sent_by().map(|sent_by| sent_by.matches(originator)).unwrap_or(false))
}

/// Finds the change that best describes a list of changes:
/// the only one, else the one about a series master, else the first one
pub fn find_main_change(changes: &[AnalyzedChange]) -> Option<usize> {
    match changes.len() {
        0 => return None,
        1 => return Some(0),
        _ => {},
    }
    let master = changes.iter().position(|analyzed| {
        let change = analyzed.change();
        matches!(change.change_type(), ChangeType::Create | ChangeType::Update)
            && change.new_event().is_series_master()
    });
    Some(master.unwrap_or(0))
}

/// Fields that do not matter when checking what a counter proposal changes
fn administrative_fields() -> EventFields {
    EventFields::ID | EventFields::FOLDER_ID | EventFields::SERIES_ID | EventFields::UID
        | EventFields::RECURRENCE_ID | EventFields::CALENDAR_USER | EventFields::FLAGS
        | EventFields::SEQUENCE | EventFields::DTSTAMP
        | EventFields::CREATED | EventFields::CREATED_BY | EventFields::LAST_MODIFIED | EventFields::MODIFIED_BY
        | EventFields::CHANGE_EXCEPTION_DATES | EventFields::ATTENDEE_PRIVILEGES
}

/// Outlook keeps the original times of the countered event in both these properties
fn has_outlook_original_times(event: &Event) -> bool {
    ["X-MS-OLK-ORIGINALSTART", "X-MS-OLK-ORIGINALEND"].iter().all(|name| {
        event.extended_property(name).map(|prop| !prop.value().trim().is_empty()).unwrap_or(false)
    })
}

/// Whether a counter proposal only changes the start and end of the event
pub fn consider_as_time_change_only(incoming: &Event, stored: &Event, prod_id: Option<&str>) -> bool {
    if has_outlook_original_times(incoming) {
        log::trace!("Outlook counter proposal for {}, considering a time change", incoming);
        return true;
    }
    if let Some(prod_id) = prod_id {
        let marker = config::GOOGLE_PRODID_MARKER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if prod_id.contains(marker.as_str()) {
            log::trace!("Google counter proposal for {}, considering a time change", incoming);
            return true;
        }
    }
    let mut changed = stored.differing_fields(incoming) - administrative_fields();
    if stored.timezone().is_none() {
        // Assigned to the incoming event when patching it
        changed.remove(EventFields::TIMEZONE);
    }
    changed == EventFields::START_DATE | EventFields::END_DATE
}

/// Whether both organizers are the same calendar user
pub fn same_organizer(left: Option<&CalendarUser>, right: Option<&CalendarUser>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => left.matches(right),
        _ => false,
    }
}

/// Whether the organizer of a stored event has been replaced in the incoming one.
///
/// iCloud sends its messages from `imip.me.com` addresses, that denote the same account as the `icloud.com` (or `me.com`, `mac.com`) address of the stored copy.
pub fn organizer_changed(stored: Option<&CalendarUser>, incoming: Option<&CalendarUser>) -> bool {
    !same_organizer(stored, incoming) && !is_similar_icloud_organizer(stored, incoming)
}

fn is_similar_icloud_organizer(left: Option<&CalendarUser>, right: Option<&CalendarUser>) -> bool {
    let (left, right) = match (left.and_then(|l| l.email_address()), right.and_then(|r| r.email_address())) {
        (Some(left), Some(right)) => (left.to_lowercase(), right.to_lowercase()),
        _ => return false,
    };
    let split = |address: &str| -> Option<(String, String)> {
        let at = address.rfind('@')?;
        Some((address[..at].to_string(), address[at + 1..].to_string()))
    };
    let ((left_local, left_domain), (right_local, right_domain)) = match (split(&left), split(&right)) {
        (Some(l), Some(r)) => (l, r),
        _ => return false,
    };
    if left_local != right_local {
        return false;
    }
    let imip_domains = config::ICLOUD_IMIP_DOMAINS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let account_domains = config::ICLOUD_ACCOUNT_DOMAINS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let is_imip = |domain: &str| imip_domains.iter().any(|d| d == domain);
    let is_account = |domain: &str| account_domains.iter().any(|d| d == domain);
    (is_imip(&left_domain) && is_account(&right_domain)) || (is_account(&left_domain) && is_imip(&right_domain))
}

/// The locale of the session user, or the default one in case it cannot be looked up
pub async fn locale(session: &CalendarSession) -> String {
    match session.entities().locale(session.user()).await {
        Ok(locale) => locale,
        Err(err) => {
            log::warn!("Unable to get the locale of user {}, falling back to {}: {}", session.user(), config::FALLBACK_LOCALE, err);
            config::FALLBACK_LOCALE.to_string()
        },
    }
}

/// The timezone of the session user, or the default one in case it cannot be looked up
pub async fn timezone(session: &CalendarSession) -> String {
    match session.entities().timezone(session.user()).await {
        Ok(timezone) => timezone,
        Err(err) => {
            log::warn!("Unable to get the timezone of user {}, falling back to {}: {}", session.user(), config::FALLBACK_TIMEZONE, err);
            config::FALLBACK_TIMEZONE.to_string()
        },
    }
}
