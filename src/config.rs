//! Support for library configuration options

use std::sync::{Arc, Mutex};
use once_cell::sync::Lazy;

use crate::event::EventFields;

/// The event fields loaded when retrieving the currently stored calendar object resources from the storage.
///
/// This is the minimal set needed to compare revisions, identify calendar users and check who created the resource.
/// Analyzers may override it (`None` meaning "all fields").
pub static DEFAULT_FIELDS: Lazy<EventFields> = Lazy::new(|| {
    EventFields::ID | EventFields::SERIES_ID | EventFields::FOLDER_ID | EventFields::UID
        | EventFields::RECURRENCE_ID | EventFields::RECURRENCE_RULE
        | EventFields::DELETE_EXCEPTION_DATES | EventFields::CHANGE_EXCEPTION_DATES
        | EventFields::START_DATE | EventFields::SEQUENCE | EventFields::DTSTAMP
        | EventFields::ORGANIZER | EventFields::ATTENDEES | EventFields::SUMMARY
        | EventFields::CREATED_BY
});

/// Domains iCloud uses as sender addresses for its iMIP messages.
/// Feel free to override it when initing this library.
pub static ICLOUD_IMIP_DOMAINS: Lazy<Arc<Mutex<Vec<String>>>> = Lazy::new(|| Arc::new(Mutex::new(vec![
    "imip.me.com".to_string(),
])));

/// Domains of iCloud accounts that may show up as organizer of the stored copy, while the incoming messages use one of [`ICLOUD_IMIP_DOMAINS`].
/// Feel free to override it when initing this library.
pub static ICLOUD_ACCOUNT_DOMAINS: Lazy<Arc<Mutex<Vec<String>>>> = Lazy::new(|| Arc::new(Mutex::new(vec![
    "icloud.com".to_string(),
    "me.com".to_string(),
    "mac.com".to_string(),
])));

/// Part of the PRODID string that identifies Google Calendar, which only ever counters with date-time proposals.
/// Feel free to override it when initing this library.
pub static GOOGLE_PRODID_MARKER: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("Google Calendar".to_string())));

/// Locale used for annotations when the session user's locale cannot be resolved
pub const FALLBACK_LOCALE: &str = "en";
/// Timezone used when the session user's timezone cannot be resolved
pub const FALLBACK_TIMEZONE: &str = "UTC";
