//! SuperAI client
//!
//! Streaming chat session manager for the SuperAI assistants. A single chat
//! actor owns the conversation state; a connection registry deduplicates
//! identical in-flight requests; transports from `superai-connectors`
//! deliver reply fragments that are folded into the conversation through a
//! pure transition function.

pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod paths;
pub mod processing;
pub mod recent;
pub mod registry;
pub mod session;
pub mod session_actor;
pub mod session_command;
pub mod transition;

pub use chat::{ChatClient, SendOutcome, StreamTicket};
pub use config::{ClientConfig, Endpoint, EndpointTable};
pub use error::ChatError;
pub use recent::{RecentPolicy, RecentSessionIndex};
pub use registry::{compute_key, ConnectionLease, ConnectionRegistry};
pub use session::{ChatSnapshot, SessionStore};
