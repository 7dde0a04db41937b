//! Client error types

use superai_connectors::ConnectorError;
use thiserror::Error;

/// Errors surfaced by the chat client
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is empty and has no attachments")]
    EmptyInput,

    #[error("Identical request already in flight: {key}")]
    DuplicateRequest { key: String },

    #[error("A reply is still streaming")]
    Busy,

    #[error("Transport error: {0}")]
    Transport(#[from] ConnectorError),

    #[error("Chat actor stopped")]
    ActorClosed,

    #[error("No endpoint configured for app {0}")]
    UnknownApp(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
