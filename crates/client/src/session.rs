//! Session state store
//!
//! Owns the active conversation, the recent-session index and the
//! processing sub-state. Every mutation goes through
//! [`transition`](crate::transition::transition); this type only executes
//! the resulting effects (broadcast, index writes, processing updates).

use std::sync::Arc;

use arc_swap::ArcSwap;
use superai_connectors::StreamEvent;
use superai_protocol::{
    new_id, timestamp_now, AssistantApp, Attachment, ChatUpdate, Message, RecentChat,
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::processing::{LogLevel, ProcessingState};
use crate::recent::{RecentPolicy, RecentSessionIndex};
use crate::transition::{transition, ChatState, Effect, Input, ProcessingOp};

const UPDATE_CHANNEL_CAPACITY: usize = 512;

/// Ids produced by [`SessionStore::begin_exchange`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user_message_id: String,
    pub reply_id: String,
    pub content: String,
    pub chat_id: Option<String>,
}

/// Immutable view published after every mutation
#[derive(Debug, Clone, Default)]
pub struct ChatSnapshot {
    pub state: ChatState,
    pub recent: Vec<RecentChat>,
    pub processing_step: Option<String>,
    pub processing_error: Option<String>,
    pub tools_progress: u8,
}

impl ChatSnapshot {
    pub fn message_count(&self) -> usize {
        self.state.messages.len()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.state.last_message()
    }

    pub fn can_send(&self) -> bool {
        self.state.can_send()
    }
}

pub struct SessionStore {
    state: ChatState,
    recent: RecentSessionIndex,
    processing: ProcessingState,
    update_tx: broadcast::Sender<ChatUpdate>,
    snapshot: Arc<ArcSwap<ChatSnapshot>>,
}

impl SessionStore {
    pub fn new(
        app: AssistantApp,
        recent_limit: usize,
        recent_policy: RecentPolicy,
        log_limit: usize,
    ) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let store = Self {
            state: ChatState::new(app),
            recent: RecentSessionIndex::new(recent_limit, recent_policy),
            processing: ProcessingState::new(log_limit),
            update_tx,
            snapshot: Arc::new(ArcSwap::from_pointee(ChatSnapshot::default())),
        };
        store.refresh_snapshot();
        store
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.default_app,
            config.recent_limit,
            config.recent_policy,
            config.log_limit,
        )
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn recent(&self) -> &RecentSessionIndex {
        &self.recent
    }

    pub fn processing(&self) -> &ProcessingState {
        &self.processing
    }

    pub fn processing_mut(&mut self) -> &mut ProcessingState {
        &mut self.processing
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.update_tx.subscribe()
    }

    pub fn update_sender(&self) -> broadcast::Sender<ChatUpdate> {
        self.update_tx.clone()
    }

    pub fn snapshot_arc(&self) -> Arc<ArcSwap<ChatSnapshot>> {
        self.snapshot.clone()
    }

    pub fn refresh_snapshot(&self) {
        self.snapshot.store(Arc::new(ChatSnapshot {
            state: self.state.clone(),
            recent: self.recent.entries().to_vec(),
            processing_step: self.processing.step().map(str::to_string),
            processing_error: self.processing.error().map(str::to_string),
            tools_progress: self.processing.tools_progress(),
        }));
    }

    // -- Transition plumbing --

    fn apply(&mut self, input: Input) {
        let now = timestamp_now();
        let state = std::mem::take(&mut self.state);
        let (next, effects) = transition(state, input, &now);
        self.state = next;
        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Emit(update) => {
                // No receivers is fine
                let _ = self.update_tx.send(*update);
            }
            Effect::IndexRecent(entry) => {
                self.recent.upsert(*entry);
                let _ = self.update_tx.send(ChatUpdate::RecentUpdated {
                    entries: self.recent.entries().to_vec(),
                });
            }
            Effect::Processing(op) => self.run_processing(op),
        }
    }

    fn run_processing(&mut self, op: ProcessingOp) {
        match op {
            ProcessingOp::Start(step) => self.processing.start_processing(step),
            ProcessingOp::Complete => {
                self.processing.complete_processing();
                self.processing.add_log(
                    LogLevel::Success,
                    "Reply received",
                    Some(self.state.app.slug()),
                );
            }
            ProcessingOp::Fail(cause) => {
                warn!(
                    component = "session_store",
                    event = "stream.failed",
                    app = %self.state.app,
                    error = %cause,
                    "Reply stream failed"
                );
                self.processing.fail_processing(cause);
            }
            ProcessingOp::Cancel => self.processing.cancel_processing(),
            ProcessingOp::Reset => self.processing.reset(),
        }
    }

    // -- Operations --

    /// Append a user message. Content is trimmed; an empty message with no
    /// attachments is refused.
    pub fn append_user_message(
        &mut self,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<String, ChatError> {
        let content = content.trim();
        if content.is_empty() && attachments.is_empty() {
            return Err(ChatError::EmptyInput);
        }
        let id = new_id();
        self.apply(Input::UserMessage {
            id: id.clone(),
            content: content.to_string(),
            attachments,
        });
        Ok(id)
    }

    /// Append an empty typing assistant message and mark the session loading.
    pub fn open_assistant_placeholder(&mut self) -> String {
        let id = new_id();
        self.apply(Input::PlaceholderOpened { id: id.clone() });
        id
    }

    /// Validate, append the user message and open the reply placeholder.
    pub fn begin_exchange(
        &mut self,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Exchange, ChatError> {
        if self.state.is_loading {
            return Err(ChatError::Busy);
        }
        let user_message_id = self.append_user_message(content, attachments)?;
        let reply_id = self.open_assistant_placeholder();
        debug!(
            component = "session_store",
            event = "exchange.started",
            app = %self.state.app,
            reply_id = %reply_id,
            "Exchange started"
        );
        Ok(Exchange {
            user_message_id,
            reply_id,
            content: content.trim().to_string(),
            chat_id: self.state.chat_id.clone(),
        })
    }

    /// Validate and append the user message for a non-streaming send.
    pub fn begin_unary(
        &mut self,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Exchange, ChatError> {
        if self.state.is_loading {
            return Err(ChatError::Busy);
        }
        let user_message_id = self.append_user_message(content, attachments)?;
        self.apply(Input::LoadingChanged(true));
        self.run_processing(ProcessingOp::Start(format!(
            "Asking {}",
            self.state.app.display_name()
        )));
        Ok(Exchange {
            user_message_id,
            reply_id: String::new(),
            content: content.trim().to_string(),
            chat_id: self.state.chat_id.clone(),
        })
    }

    pub fn apply_event(&mut self, message_id: &str, event: StreamEvent) {
        self.apply(Input::Stream {
            message_id: message_id.to_string(),
            event,
        });
    }

    /// Finalize a typing reply whose connection was released.
    pub fn abandon_stream(&mut self, message_id: &str) {
        self.apply(Input::StreamAbandoned {
            message_id: message_id.to_string(),
        });
    }

    /// Append the reply to `reply_to`. Dropped if that user message is gone.
    pub fn record_unary_reply(&mut self, reply_to: &str, content: String) -> String {
        let id = new_id();
        self.apply(Input::UnaryReply {
            id: id.clone(),
            reply_to: reply_to.to_string(),
            content,
        });
        id
    }

    pub fn push_error_message(&mut self, reply_to: &str, content: String) -> String {
        let id = new_id();
        self.apply(Input::ErrorMessage {
            id: id.clone(),
            reply_to: reply_to.to_string(),
            content,
        });
        id
    }

    pub fn set_typing(&mut self, is_typing: bool, text: String) {
        self.apply(Input::TypingChanged { is_typing, text });
    }

    pub fn reset(&mut self) {
        self.apply(Input::Reset);
    }

    /// Start a fresh conversation with the current app.
    pub fn new_session(&mut self) {
        self.reset();
    }

    pub fn switch_app(&mut self, app: AssistantApp) {
        self.apply(Input::AppSwitched(app));
    }

    /// Drop a conversation from the recent list. Deleting the active one
    /// also starts a new conversation.
    pub fn delete_recent(&mut self, id: &str) -> bool {
        let removed = self.recent.remove(id);
        if removed {
            let _ = self.update_tx.send(ChatUpdate::RecentUpdated {
                entries: self.recent.entries().to_vec(),
            });
        }
        if self.state.chat_id.as_deref() == Some(id) {
            self.new_session();
        }
        removed
    }
}
