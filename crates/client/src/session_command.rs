//! Commands sent to the chat actor by the client and its stream forwarders.

use std::sync::Arc;

use superai_connectors::StreamEvent;
use superai_protocol::{AssistantApp, Attachment, ChatUpdate, RecentChat};
use tokio::sync::{broadcast, oneshot};

use crate::error::ChatError;
use crate::processing::{LogEntry, LogLevel, ProcessingState, ThinkingStage, ToolStatus};
use crate::session::{ChatSnapshot, Exchange};
use crate::transition::ChatState;

/// Snapshot plus a live update receiver, taken atomically.
pub struct Subscription {
    pub snapshot: Arc<ChatSnapshot>,
    pub updates: broadcast::Receiver<ChatUpdate>,
}

/// A command that can be sent to the chat actor.
pub enum ChatCommand {
    // -- Queries (use oneshot reply channels) --
    GetState {
        reply: oneshot::Sender<ChatState>,
    },
    /// Active app and chat id, ordered after every earlier command
    GetActiveChat {
        reply: oneshot::Sender<(AssistantApp, Option<String>)>,
    },
    GetRecent {
        reply: oneshot::Sender<Vec<RecentChat>>,
    },
    GetLogs {
        filtered: bool,
        reply: oneshot::Sender<Vec<LogEntry>>,
    },
    Subscribe {
        reply: oneshot::Sender<Subscription>,
    },
    GetProcessing {
        reply: oneshot::Sender<ProcessingState>,
    },

    // -- Exchange lifecycle --
    /// Append the user message and open a typing placeholder
    BeginExchange {
        content: String,
        attachments: Vec<Attachment>,
        reply: oneshot::Sender<Result<Exchange, ChatError>>,
    },
    /// Append the user message for a non-streaming send
    BeginUnary {
        content: String,
        attachments: Vec<Attachment>,
        reply: oneshot::Sender<Result<Exchange, ChatError>>,
    },
    /// Feed one stream event to the reply it belongs to
    ApplyEvent {
        message_id: String,
        event: StreamEvent,
    },
    /// Finalize a reply whose connection was released before it finished
    AbandonStream {
        message_id: String,
    },
    RecordUnaryReply {
        reply_to: String,
        content: String,
    },
    PushError {
        reply_to: String,
        content: String,
    },

    // -- Thinking and tool calls --
    StartThinking {
        text: String,
        stage: ThinkingStage,
    },
    UpdateThinking {
        text: String,
        progress: Option<u8>,
        stage: Option<ThinkingStage>,
    },
    CompleteThinking,
    AddTool {
        name: String,
        display_name: Option<String>,
        reply: oneshot::Sender<String>,
    },
    SetToolStatus {
        tool_id: String,
        status: ToolStatus,
        error: Option<String>,
    },
    RemoveTool {
        tool_id: String,
    },

    // -- Simple mutations (fire-and-forget) --
    SetTyping {
        is_typing: bool,
        text: String,
    },
    AddLog {
        level: LogLevel,
        message: String,
    },
    ToggleLogFilter {
        level: LogLevel,
    },
    Reset,
    SwitchApp {
        app: AssistantApp,
    },
    DeleteRecent {
        id: String,
        reply: oneshot::Sender<bool>,
    },
}
