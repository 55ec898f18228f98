//! This crate analyzes incoming iTIP ([RFC 5546](https://tools.ietf.org/html/rfc5546)) scheduling messages.
//!
//! Given a scheduling message received by a calendar user of this server, an [`ITipAnalyzer`] compares each incoming event to what is currently stored,
//! and tells what the message means (an invitation, an update, a reply...), what it would change, and which [`Action`](analysis::Action)s the recipient may take. \
//! Each analyzed change comes with human-readable [`Annotation`](analysis::annotation::Annotation)s.
//!
//! The analysis never writes anything. It reads the stored data through the collaborators of the [`traits`] module, that are bundled into a [`CalendarSession`]. \
//! An in-memory implementation of every collaborator is provided in the [`memory`] module.

pub mod traits;
pub mod config;
pub mod error;
pub use error::AnalysisError;

pub mod calendar_user;
pub mod event;
pub use event::Event;
pub mod resource;
pub use resource::CalendarObjectResource;
pub mod message;
pub use message::{IncomingSchedulingMessage, SchedulingMethod};
pub mod session;
pub use session::CalendarSession;

pub mod sequence;
pub mod permission;
pub mod provider;
pub mod analysis;
pub use analysis::ITipAnalysis;
pub mod analyzers;
pub use analyzers::ITipAnalyzer;

pub mod memory;
pub use memory::MemoryStore;
pub mod mock_behaviour;

pub mod utils;
