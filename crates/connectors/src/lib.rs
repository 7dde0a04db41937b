//! SuperAI Connectors
//!
//! Streaming transports for the remote assistants. Two wire styles are
//! supported: a subscribe-style SSE stream (`GET` with query parameters) and
//! a chunked response read loop over a `POST`. Both are normalized into a
//! single [`StreamEvent`] sequence delivered over a channel.

pub mod http;
pub mod lines;
pub mod sink;
pub mod sse;
pub mod transport;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::{HttpClient, HttpSettings};
pub use sink::{EventSink, StreamConnection, TransportHandle};
pub use transport::{ChunkedTransport, StreamRequest, StreamTransport, SubscribeTransport};

/// Errors that can occur in connectors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unauthorized (401)")]
    Unauthorized,

    #[error("Stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("Connection cancelled")]
    Cancelled,
}

/// Events emitted by a stream transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of assistant text, in transport order
    Content(String),

    /// Stream finished normally
    Complete,

    /// Stream failed; the string is the logged cause
    Error(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Content(_))
    }
}

/// Wire style used by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Long-lived `GET` event stream, one event per frame
    Subscribe,
    /// `POST` with a JSON body, newline-delimited response read incrementally
    Chunked,
}
