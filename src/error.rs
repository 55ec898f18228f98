//! Error types of this crate

use thiserror::Error;

use crate::calendar_user::EntityId;
use crate::permission::Permissions;
use crate::sequence::ITipSequence;

/// The error type every collaborator (storage, free/busy, entity resolution...) may return
pub type ServiceError = Box<dyn std::error::Error + Send + Sync>;

/// Why a session may not act on behalf of a calendar user
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("user {user} lacks the {missing:?} permissions in folder {folder}")]
    MissingPermissions {
        user: EntityId,
        folder: String,
        missing: Permissions,
    },
    #[error("user {user} may only act on their own events, but did not create {uid}")]
    NotCreator {
        user: EntityId,
        uid: String,
    },
    #[error("unable to look up permissions: {0}")]
    Lookup(#[source] ServiceError),
}

/// An error that aborts the analysis of a scheduling message (or of one of its events)
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A mandatory lookup (stored resource, tombstones) failed
    #[error("storage lookup failed: {0}")]
    Storage(#[source] ServiceError),
    /// The revision comparator yielded no ordering between two events
    #[error("illegal sequence/dtstamp ordering for {uid}: incoming {incoming}, stored {stored}")]
    IllegalRevision {
        uid: String,
        incoming: ITipSequence,
        stored: ITipSequence,
    },
    /// A calendar object resource (e.g. the one of an incoming message) holds no event at all
    #[error("the calendar object resource does not contain any event")]
    EmptyResource,
}
