//! Chat store → observer updates

use serde::{Deserialize, Serialize};

use crate::types::*;

/// Incremental updates broadcast by the chat store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatUpdate {
    MessageAppended {
        message: Message,
    },
    MessageUpdated {
        message_id: String,
        changes: MessageChanges,
    },
    SessionDelta {
        changes: SessionChanges,
    },
    RecentUpdated {
        entries: Vec<RecentChat>,
    },
    SessionReset {
        app: AssistantApp,
    },
}

/// Changes to apply to a message (delta updates)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageChanges {
    /// Fragment appended to the existing content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appended: Option<String>,
    /// Full replacement content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
}

/// Changes to the session-level view state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_loading: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_typing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<AssistantApp>,
}
