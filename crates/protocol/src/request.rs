//! Client → assistant request payloads

use serde::{Deserialize, Serialize};

use crate::types::{AssistantApp, Attachment};

/// Body (or query) sent to an assistant endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub app: AssistantApp,
}

impl ChatRequest {
    pub fn new(app: AssistantApp, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attachments: Vec::new(),
            chat_id: None,
            app,
        }
    }

    pub fn with_chat_id(mut self, chat_id: Option<String>) -> Self {
        self.chat_id = chat_id;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Response of the non-streaming chat endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnaryReply {
    pub message: String,
}
