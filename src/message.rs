//! Incoming scheduling messages

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calendar_user::{CalendarUser, EntityId};
use crate::resource::CalendarObjectResource;

/// An iTIP method, as defined by [RFC 5546](https://tools.ietf.org/html/rfc5546#section-1.4)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulingMethod {
    Publish,
    Request,
    Reply,
    Add,
    Cancel,
    Refresh,
    Counter,
    DeclineCounter,
}

impl Display for SchedulingMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SchedulingMethod::Publish => "PUBLISH",
            SchedulingMethod::Request => "REQUEST",
            SchedulingMethod::Reply => "REPLY",
            SchedulingMethod::Add => "ADD",
            SchedulingMethod::Cancel => "CANCEL",
            SchedulingMethod::Refresh => "REFRESH",
            SchedulingMethod::Counter => "COUNTER",
            SchedulingMethod::DeclineCounter => "DECLINECOUNTER",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SchedulingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PUBLISH" => Ok(SchedulingMethod::Publish),
            "REQUEST" => Ok(SchedulingMethod::Request),
            "REPLY" => Ok(SchedulingMethod::Reply),
            "ADD" => Ok(SchedulingMethod::Add),
            "CANCEL" => Ok(SchedulingMethod::Cancel),
            "REFRESH" => Ok(SchedulingMethod::Refresh),
            "COUNTER" => Ok(SchedulingMethod::Counter),
            "DECLINECOUNTER" => Ok(SchedulingMethod::DeclineCounter),
            other => Err(format!("Unsupported iTIP method {}", other)),
        }
    }
}


/// What the organizer did, as told by a server of the same installation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    Create,
    Update,
}

/// The correlation token some servers attach to the scheduling messages they send
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ITipData {
    server_uid: String,
    context_id: u32,
    /// The resource the message was sent on behalf of
    sent_by_resource: Option<EntityId>,
    action: Option<ChangeAction>,
}

impl ITipData {
    pub fn new(server_uid: &str, context_id: u32) -> Self {
        Self { server_uid: server_uid.to_string(), context_id, sent_by_resource: None, action: None }
    }
    pub fn with_sent_by_resource(mut self, resource: EntityId) -> Self {
        self.sent_by_resource = Some(resource);
        self
    }
    pub fn with_action(mut self, action: ChangeAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn server_uid(&self) -> &str { &self.server_uid }
    pub fn context_id(&self) -> u32 { self.context_id }
    pub fn sent_by_resource(&self) -> Option<EntityId> { self.sent_by_resource }
    pub fn action(&self) -> Option<ChangeAction> { self.action }
}


/// Data that comes along with a scheduling message, but outside of its calendar data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Additional {
    /// The `PRODID` of the iCalendar object
    ProdId(String),
    ITipData(ITipData),
}


/// A scheduling message that has been received for a calendar user of this server
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncomingSchedulingMessage {
    method: SchedulingMethod,
    resource: CalendarObjectResource,
    /// Who sent the message
    originator: CalendarUser,
    /// The calendar user the message is intended for
    target_user: EntityId,
    additionals: Vec<Additional>,
}

impl IncomingSchedulingMessage {
    pub fn new(method: SchedulingMethod, resource: CalendarObjectResource, originator: CalendarUser, target_user: EntityId) -> Self {
        Self { method, resource, originator, target_user, additionals: Vec::new() }
    }

    pub fn with_additional(mut self, additional: Additional) -> Self {
        self.additionals.push(additional);
        self
    }

    pub fn method(&self) -> SchedulingMethod { self.method }
    pub fn resource(&self) -> &CalendarObjectResource { &self.resource }
    pub fn originator(&self) -> &CalendarUser { &self.originator }
    pub fn target_user(&self) -> EntityId { self.target_user }
    pub fn additionals(&self) -> &[Additional] { &self.additionals }

    pub fn prod_id(&self) -> Option<&str> {
        self.additionals.iter().find_map(|additional| match additional {
            Additional::ProdId(prod_id) => Some(prod_id.as_str()),
            _ => None,
        })
    }

    pub fn itip_data(&self) -> Option<&ITipData> {
        self.additionals.iter().find_map(|additional| match additional {
            Additional::ITipData(data) => Some(data),
            _ => None,
        })
    }
}
