//! Calendar users, i.e. organizers and attendees of events

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use url::Url;

/// The identifier of an internal entity (a user or a resource) on this server
pub type EntityId = u32;

/// A calendar user, as referenced by an `ORGANIZER` or an `ATTENDEE` property
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarUser {
    /// The calendar user address, usually a `mailto:` URI
    uri: Option<Url>,
    /// The common name
    cn: Option<String>,
    email: Option<String>,
    /// Set for calendar users that are known entities of this server
    entity: Option<EntityId>,
    /// The calendar user that acts on behalf of this one (`SENT-BY`)
    sent_by: Option<Box<CalendarUser>>,
}

impl CalendarUser {
    /// An external calendar user, only known by its e-mail address
    pub fn new(email: &str) -> Self {
        let uri = Url::parse(&format!("mailto:{}", email)).ok();
        Self { uri, cn: None, email: Some(email.to_string()), entity: None, sent_by: None }
    }

    /// A calendar user that is known on this server
    pub fn new_internal(entity: EntityId, email: &str) -> Self {
        Self { entity: Some(entity), ..Self::new(email) }
    }

    pub fn new_with_parameters(uri: Option<Url>, cn: Option<String>, email: Option<String>, entity: Option<EntityId>, sent_by: Option<CalendarUser>) -> Self {
        Self { uri, cn, email, entity, sent_by: sent_by.map(Box::new) }
    }

    pub fn with_cn(mut self, cn: &str) -> Self {
        self.cn = Some(cn.to_string());
        self
    }
    pub fn with_sent_by(mut self, sent_by: CalendarUser) -> Self {
        self.sent_by = Some(Box::new(sent_by));
        self
    }

    pub fn uri(&self) -> Option<&Url> { self.uri.as_ref() }
    pub fn cn(&self) -> Option<&str> { self.cn.as_deref() }
    pub fn email(&self) -> Option<&str> { self.email.as_deref() }
    pub fn entity(&self) -> Option<EntityId> { self.entity }
    pub fn sent_by(&self) -> Option<&CalendarUser> { self.sent_by.as_deref() }

    pub fn set_entity(&mut self, entity: Option<EntityId>) {
        self.entity = entity;
    }

    /// Whether this calendar user is an entity of this server
    pub fn is_internal(&self) -> bool {
        self.entity.is_some()
    }

    /// The e-mail address of this calendar user, either explicit or taken from a `mailto:` URI
    pub fn email_address(&self) -> Option<String> {
        if let Some(email) = &self.email {
            return Some(email.to_string());
        }
        match &self.uri {
            Some(uri) if uri.scheme().eq_ignore_ascii_case("mailto") => Some(uri.path().to_string()),
            _ => None,
        }
    }

    /// Whether both calendar users denote the same person.
    ///
    /// Internal entities are compared by identifier, other calendar users by address (ignoring case)
    pub fn matches(&self, other: &CalendarUser) -> bool {
        if let (Some(a), Some(b)) = (self.entity, other.entity) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.email_address(), other.email_address()) {
            if a.eq_ignore_ascii_case(&b) {
                return true;
            }
        }
        match (&self.uri, &other.uri) {
            (Some(a), Some(b)) => a.as_str().eq_ignore_ascii_case(b.as_str()),
            _ => false,
        }
    }

    /// The name to display for this calendar user
    pub fn display_name(&self) -> String {
        if let Some(cn) = &self.cn {
            return cn.clone();
        }
        if let Some(email) = self.email_address() {
            return email;
        }
        self.uri.as_ref().map(|uri| uri.to_string()).unwrap_or_default()
    }

    /// Turns this calendar user into an (individual, non-responded) attendee
    pub fn as_attendee(&self) -> Attendee {
        Attendee::new(self.clone())
    }
}

impl Display for CalendarUser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.entity {
            Some(entity) => write!(f, "{} (#{})", self.display_name(), entity),
            None => write!(f, "{}", self.display_name()),
        }
    }
}


/// The `CUTYPE` of an attendee
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalendarUserType {
    Individual,
    Group,
    Resource,
    Room,
    Unknown,
}

impl CalendarUserType {
    /// Whether this denotes a bookable resource (a resource or a room)
    pub fn is_resource(&self) -> bool {
        matches!(self, CalendarUserType::Resource | CalendarUserType::Room)
    }
}

impl Default for CalendarUserType {
    fn default() -> Self {
        CalendarUserType::Individual
    }
}


/// The `PARTSTAT` of an attendee
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipationStatus {
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
    Other(String),
}

impl Default for ParticipationStatus {
    fn default() -> Self {
        ParticipationStatus::NeedsAction
    }
}

impl Display for ParticipationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipationStatus::NeedsAction => write!(f, "NEEDS-ACTION"),
            ParticipationStatus::Accepted => write!(f, "ACCEPTED"),
            ParticipationStatus::Declined => write!(f, "DECLINED"),
            ParticipationStatus::Tentative => write!(f, "TENTATIVE"),
            ParticipationStatus::Delegated => write!(f, "DELEGATED"),
            ParticipationStatus::Other(value) => write!(f, "{}", value),
        }
    }
}

impl FromStr for ParticipationStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "NEEDS-ACTION" => ParticipationStatus::NeedsAction,
            "ACCEPTED" => ParticipationStatus::Accepted,
            "DECLINED" => ParticipationStatus::Declined,
            "TENTATIVE" => ParticipationStatus::Tentative,
            "DELEGATED" => ParticipationStatus::Delegated,
            other => ParticipationStatus::Other(other.to_string()),
        })
    }
}


/// The `ROLE` of an attendee
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantRole {
    Chair,
    ReqParticipant,
    OptParticipant,
    NonParticipant,
}

impl Default for ParticipantRole {
    fn default() -> Self {
        ParticipantRole::ReqParticipant
    }
}


/// The rights a user has to book a resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchedulingPrivilege {
    /// The user cannot book the resource
    None,
    /// The user may request a booking, that must be confirmed by a delegate
    Ask,
    /// The user may book the resource
    Book,
    /// The user manages the bookings of the resource
    Delegate,
}

impl SchedulingPrivilege {
    /// Whether this privilege grants at least the rights of `other`
    pub fn implies(&self, other: SchedulingPrivilege) -> bool {
        *self >= other
    }
}


/// An attendee of an event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    calendar_user: CalendarUser,
    cu_type: CalendarUserType,
    part_stat: ParticipationStatus,
    role: ParticipantRole,
    /// The calendar users that delegated their participation to this attendee (`DELEGATED-FROM`)
    delegated_from: Vec<CalendarUser>,
    /// When this attendee last replied
    timestamp: Option<DateTime<Utc>>,
}

impl Attendee {
    /// An individual attendee that did not reply yet
    pub fn new(calendar_user: CalendarUser) -> Self {
        Self {
            calendar_user,
            cu_type: CalendarUserType::default(),
            part_stat: ParticipationStatus::default(),
            role: ParticipantRole::default(),
            delegated_from: Vec::new(),
            timestamp: None,
        }
    }

    pub fn with_cu_type(mut self, cu_type: CalendarUserType) -> Self {
        self.cu_type = cu_type;
        self
    }
    pub fn with_part_stat(mut self, part_stat: ParticipationStatus) -> Self {
        self.part_stat = part_stat;
        self
    }
    pub fn with_role(mut self, role: ParticipantRole) -> Self {
        self.role = role;
        self
    }
    pub fn with_delegated_from(mut self, delegated_from: Vec<CalendarUser>) -> Self {
        self.delegated_from = delegated_from;
        self
    }
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn calendar_user(&self) -> &CalendarUser { &self.calendar_user }
    pub fn calendar_user_mut(&mut self) -> &mut CalendarUser { &mut self.calendar_user }
    pub fn cu_type(&self) -> CalendarUserType { self.cu_type }
    pub fn part_stat(&self) -> &ParticipationStatus { &self.part_stat }
    pub fn role(&self) -> ParticipantRole { self.role }
    pub fn delegated_from(&self) -> &[CalendarUser] { &self.delegated_from }
    pub fn timestamp(&self) -> Option<DateTime<Utc>> { self.timestamp }

    pub fn entity(&self) -> Option<EntityId> { self.calendar_user.entity() }
    pub fn sent_by(&self) -> Option<&CalendarUser> { self.calendar_user.sent_by() }

    pub fn matches(&self, calendar_user: &CalendarUser) -> bool {
        self.calendar_user.matches(calendar_user)
    }
}

/// Returns the attendee that matches `calendar_user`, if any
pub fn find_attendee<'a>(attendees: &'a [Attendee], calendar_user: &CalendarUser) -> Option<&'a Attendee> {
    attendees.iter().find(|attendee| attendee.matches(calendar_user))
}

/// Returns the attendee that is the internal entity `entity`, if any
pub fn find_attendee_by_entity(attendees: &[Attendee], entity: EntityId) -> Option<&Attendee> {
    attendees.iter().find(|attendee| attendee.entity() == Some(entity))
}
