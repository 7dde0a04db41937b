//! SuperAI Protocol
//!
//! Shared types for the SuperAI chat client: conversation messages,
//! assistant request payloads, and the update deltas broadcast to observers.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

pub mod request;
pub mod types;
pub mod update;

pub use request::{ChatRequest, UnaryReply};
pub use types::*;
pub use update::{ChatUpdate, MessageChanges, SessionChanges};

/// Generate a new unique ID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time as `<unix seconds>Z`
pub fn timestamp_now() -> String {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}Z", duration.as_secs())
}
