//! Core types shared across the client

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Assistant application a conversation talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantApp {
    #[default]
    Fitness,
    Love,
    Manus,
    Health,
}

impl AssistantApp {
    pub const ALL: [AssistantApp; 4] = [
        AssistantApp::Fitness,
        AssistantApp::Love,
        AssistantApp::Manus,
        AssistantApp::Health,
    ];

    /// Tag used in URLs and request payloads
    pub fn slug(&self) -> &'static str {
        match self {
            AssistantApp::Fitness => "fitness",
            AssistantApp::Love => "love",
            AssistantApp::Manus => "manus",
            AssistantApp::Health => "health",
        }
    }

    /// Human-facing assistant name
    pub fn display_name(&self) -> &'static str {
        match self {
            AssistantApp::Fitness => "AI Fitness Coach",
            AssistantApp::Love => "AI Love Advisor",
            AssistantApp::Manus => "AI Super Assistant",
            AssistantApp::Health => "AI Health Assistant",
        }
    }
}

impl fmt::Display for AssistantApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Returned when a string does not name a known assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownApp(pub String);

impl fmt::Display for UnknownApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown assistant app: {}", self.0)
    }
}

impl std::error::Error for UnknownApp {}

impl FromStr for AssistantApp {
    type Err = UnknownApp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        AssistantApp::ALL
            .into_iter()
            .find(|app| app.slug() == needle)
            .ok_or_else(|| UnknownApp(s.to_string()))
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    Error,
}

/// Delivery status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Typing,
    Received,
    Error,
}

impl MessageStatus {
    /// Terminal statuses never transition again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageStatus::Typing)
    }
}

/// File or link attached to a user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Attachment {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            url: None,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub timestamp: String,
    pub status: MessageStatus,
}

impl Message {
    pub fn user(id: String, content: String, attachments: Vec<Attachment>, now: &str) -> Self {
        Self {
            id,
            role: MessageRole::User,
            content,
            attachments,
            timestamp: now.to_string(),
            status: MessageStatus::Sent,
        }
    }

    /// Empty assistant reply waiting for streamed fragments
    pub fn placeholder(id: String, now: &str) -> Self {
        Self {
            id,
            role: MessageRole::Assistant,
            content: String::new(),
            attachments: Vec::new(),
            timestamp: now.to_string(),
            status: MessageStatus::Typing,
        }
    }
}

/// Summary of a past conversation for the recent list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentChat {
    pub id: String,
    pub title: String,
    pub app: AssistantApp,
    #[serde(rename = "lastMessage")]
    pub preview: String,
    pub updated_at: String,
    pub message_count: usize,
}
