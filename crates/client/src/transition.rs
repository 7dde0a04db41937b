//! Pure state transition function
//!
//! All chat-store business logic lives here as a pure, synchronous
//! function: `transition(state, input, now) -> (state, effects)`.
//! No IO, no async, no locking.

use superai_connectors::StreamEvent;
use superai_protocol::{
    new_id, AssistantApp, Attachment, ChatUpdate, Message, MessageChanges, MessageRole,
    MessageStatus, RecentChat, SessionChanges,
};

use crate::naming;

/// Shown in place of a reply whose stream failed
pub const STREAM_FAILURE_TEXT: &str = "Connection interrupted, please try again.";

/// Shown when a non-streaming send fails
pub const SEND_FAILURE_TEXT: &str =
    "Sorry, something went wrong while sending your message. Please try again later.";

/// Shown in place of a reply that was cancelled before any text arrived
pub const CANCELLED_TEXT: &str = "Reply cancelled.";

// ---------------------------------------------------------------------------
// ChatState: pure data snapshot of the active conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub chat_id: Option<String>,
    pub app: AssistantApp,
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub is_typing: bool,
    pub typing_text: String,
    pub last_message_id: Option<String>,
}

impl ChatState {
    pub fn new(app: AssistantApp) -> Self {
        Self {
            app,
            ..Default::default()
        }
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn can_send(&self) -> bool {
        !self.is_loading && !self.is_typing
    }

    fn summary(&self, id: String, now: &str) -> RecentChat {
        RecentChat {
            id,
            title: naming::chat_title(&self.messages, self.app),
            app: self.app,
            preview: naming::preview(self.last_message()),
            updated_at: now.to_string(),
            message_count: self.messages.len(),
        }
    }

    /// Assign a chat id on first indexing; stable afterwards.
    fn has_message(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    fn ensure_chat_id(&mut self) -> (String, bool) {
        match &self.chat_id {
            Some(id) => (id.clone(), false),
            None => {
                let id = new_id();
                self.chat_id = Some(id.clone());
                (id, true)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Input {
    UserMessage {
        id: String,
        content: String,
        attachments: Vec<Attachment>,
    },
    PlaceholderOpened {
        id: String,
    },
    Stream {
        message_id: String,
        event: StreamEvent,
    },
    /// The connection behind a typing reply went away without a terminal
    /// event
    StreamAbandoned {
        message_id: String,
    },
    /// `reply_to` is the user message the reply answers
    UnaryReply {
        id: String,
        reply_to: String,
        content: String,
    },
    ErrorMessage {
        id: String,
        reply_to: String,
        content: String,
    },
    LoadingChanged(bool),
    TypingChanged {
        is_typing: bool,
        text: String,
    },
    Reset,
    AppSwitched(AssistantApp),
}

// ---------------------------------------------------------------------------
// Effects: work for the caller to execute
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Effect {
    Emit(Box<ChatUpdate>),
    IndexRecent(Box<RecentChat>),
    Processing(ProcessingOp),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOp {
    Start(String),
    Complete,
    Fail(String),
    Cancel,
    Reset,
}

fn emit(update: ChatUpdate) -> Effect {
    Effect::Emit(Box::new(update))
}

fn loading_delta(is_loading: bool) -> Effect {
    emit(ChatUpdate::SessionDelta {
        changes: SessionChanges {
            is_loading: Some(is_loading),
            ..Default::default()
        },
    })
}

// ---------------------------------------------------------------------------
// transition()
// ---------------------------------------------------------------------------

/// Pure, synchronous state transition.
///
/// Given the current state and an input, returns the new state and a list
/// of effects (broadcasts, recent-index writes, processing updates).
/// Inputs that target a message which no longer exists, or which has
/// already reached a terminal status, produce no change and no effects.
pub fn transition(mut state: ChatState, input: Input, now: &str) -> (ChatState, Vec<Effect>) {
    let mut effects: Vec<Effect> = Vec::new();

    match input {
        Input::UserMessage {
            id,
            content,
            attachments,
        } => {
            let message = Message::user(id.clone(), content, attachments, now);
            state.messages.push(message.clone());
            state.last_message_id = Some(id);
            effects.push(emit(ChatUpdate::MessageAppended { message }));
        }

        Input::PlaceholderOpened { id } => {
            let message = Message::placeholder(id, now);
            state.messages.push(message.clone());
            state.is_loading = true;
            effects.push(emit(ChatUpdate::MessageAppended { message }));
            effects.push(loading_delta(true));
            effects.push(Effect::Processing(ProcessingOp::Start(format!(
                "Waiting for {}",
                state.app.display_name()
            ))));
        }

        Input::Stream { message_id, event } => {
            let Some(idx) = state
                .messages
                .iter()
                .position(|m| m.id == message_id && m.status == MessageStatus::Typing)
            else {
                return (state, effects);
            };

            match event {
                StreamEvent::Content(text) => {
                    state.messages[idx].content.push_str(&text);
                    effects.push(emit(ChatUpdate::MessageUpdated {
                        message_id,
                        changes: MessageChanges {
                            appended: Some(text),
                            ..Default::default()
                        },
                    }));
                }
                StreamEvent::Complete => {
                    state.messages[idx].status = MessageStatus::Received;
                    state.is_loading = false;
                    state.last_message_id = Some(message_id.clone());
                    let (chat_id, assigned) = state.ensure_chat_id();

                    effects.push(emit(ChatUpdate::MessageUpdated {
                        message_id,
                        changes: MessageChanges {
                            status: Some(MessageStatus::Received),
                            ..Default::default()
                        },
                    }));
                    effects.push(emit(ChatUpdate::SessionDelta {
                        changes: SessionChanges {
                            is_loading: Some(false),
                            chat_id: assigned.then(|| Some(chat_id.clone())),
                            ..Default::default()
                        },
                    }));
                    effects.push(Effect::IndexRecent(Box::new(state.summary(chat_id, now))));
                    effects.push(Effect::Processing(ProcessingOp::Complete));
                }
                StreamEvent::Error(cause) => {
                    state.messages[idx].content = STREAM_FAILURE_TEXT.to_string();
                    state.messages[idx].status = MessageStatus::Error;
                    state.is_loading = false;

                    effects.push(emit(ChatUpdate::MessageUpdated {
                        message_id,
                        changes: MessageChanges {
                            content: Some(STREAM_FAILURE_TEXT.to_string()),
                            status: Some(MessageStatus::Error),
                            ..Default::default()
                        },
                    }));
                    effects.push(loading_delta(false));
                    effects.push(Effect::Processing(ProcessingOp::Fail(cause)));
                }
            }
        }

        Input::StreamAbandoned { message_id } => {
            let Some(idx) = state
                .messages
                .iter()
                .position(|m| m.id == message_id && m.status == MessageStatus::Typing)
            else {
                return (state, effects);
            };

            let reply = &mut state.messages[idx];
            let content = reply.content.is_empty().then(|| CANCELLED_TEXT.to_string());
            if let Some(text) = &content {
                reply.content = text.clone();
            }
            reply.status = MessageStatus::Received;
            state.is_loading = false;

            effects.push(emit(ChatUpdate::MessageUpdated {
                message_id,
                changes: MessageChanges {
                    content,
                    status: Some(MessageStatus::Received),
                    ..Default::default()
                },
            }));
            effects.push(loading_delta(false));
            effects.push(Effect::Processing(ProcessingOp::Cancel));
        }

        Input::UnaryReply {
            id,
            reply_to,
            content,
        } => {
            if !state.has_message(&reply_to) {
                return (state, effects);
            }
            let message = Message {
                id: id.clone(),
                role: MessageRole::Assistant,
                content,
                attachments: Vec::new(),
                timestamp: now.to_string(),
                status: MessageStatus::Received,
            };
            state.messages.push(message.clone());
            state.is_loading = false;
            state.last_message_id = Some(id);
            let (chat_id, assigned) = state.ensure_chat_id();

            effects.push(emit(ChatUpdate::MessageAppended { message }));
            effects.push(emit(ChatUpdate::SessionDelta {
                changes: SessionChanges {
                    is_loading: Some(false),
                    chat_id: assigned.then(|| Some(chat_id.clone())),
                    ..Default::default()
                },
            }));
            effects.push(Effect::IndexRecent(Box::new(state.summary(chat_id, now))));
            effects.push(Effect::Processing(ProcessingOp::Complete));
        }

        Input::ErrorMessage {
            id,
            reply_to,
            content,
        } => {
            if !state.has_message(&reply_to) {
                return (state, effects);
            }
            let message = Message {
                id,
                role: MessageRole::Error,
                content,
                attachments: Vec::new(),
                timestamp: now.to_string(),
                status: MessageStatus::Error,
            };
            state.messages.push(message.clone());
            state.is_loading = false;
            effects.push(emit(ChatUpdate::MessageAppended { message }));
            effects.push(loading_delta(false));
        }

        Input::LoadingChanged(is_loading) => {
            if state.is_loading != is_loading {
                state.is_loading = is_loading;
                effects.push(loading_delta(is_loading));
            }
        }

        Input::TypingChanged { is_typing, text } => {
            state.is_typing = is_typing;
            state.typing_text = text;
            effects.push(emit(ChatUpdate::SessionDelta {
                changes: SessionChanges {
                    is_typing: Some(is_typing),
                    ..Default::default()
                },
            }));
        }

        Input::Reset => {
            clear_session(&mut state);
            effects.push(emit(ChatUpdate::SessionReset { app: state.app }));
            effects.push(Effect::Processing(ProcessingOp::Reset));
        }

        Input::AppSwitched(app) => {
            state.app = app;
            clear_session(&mut state);
            effects.push(emit(ChatUpdate::SessionReset { app }));
            effects.push(Effect::Processing(ProcessingOp::Reset));
        }
    }

    (state, effects)
}

fn clear_session(state: &mut ChatState) {
    state.messages.clear();
    state.chat_id = None;
    state.last_message_id = None;
    state.is_loading = false;
    state.is_typing = false;
    state.typing_text.clear();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "1000Z";

    fn test_state() -> ChatState {
        ChatState::new(AssistantApp::Fitness)
    }

    fn with_placeholder(id: &str) -> ChatState {
        let (state, _) = transition(
            test_state(),
            Input::UserMessage {
                id: "u1".into(),
                content: "hello".into(),
                attachments: vec![],
            },
            NOW,
        );
        let (state, _) = transition(state, Input::PlaceholderOpened { id: id.into() }, NOW);
        state
    }

    fn stream(state: ChatState, id: &str, event: StreamEvent) -> (ChatState, Vec<Effect>) {
        transition(
            state,
            Input::Stream {
                message_id: id.into(),
                event,
            },
            NOW,
        )
    }

    #[test]
    fn placeholder_opens_typing_message_and_sets_loading() {
        let state = with_placeholder("m1");

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].status, MessageStatus::Typing);
        assert!(state.messages[1].content.is_empty());
        assert!(state.is_loading);
        assert!(!state.can_send());
    }

    #[test]
    fn content_fragments_concatenate_in_order() {
        let mut state = with_placeholder("m1");
        for text in ["Hi", " there", "!"] {
            let (next, effects) = stream(state, "m1", StreamEvent::Content(text.into()));
            assert_eq!(effects.len(), 1);
            state = next;
        }
        let (state, effects) = stream(state, "m1", StreamEvent::Complete);

        let m1 = state.message("m1").unwrap();
        assert_eq!(m1.content, "Hi there!");
        assert_eq!(m1.status, MessageStatus::Received);
        assert!(!state.is_loading);
        assert_eq!(state.last_message_id.as_deref(), Some("m1"));
        // MessageUpdated + SessionDelta + IndexRecent + Processing
        assert_eq!(effects.len(), 4);
    }

    #[test]
    fn complete_assigns_chat_id_once_and_indexes_summary() {
        let state = with_placeholder("m1");
        let (state, _) = stream(state, "m1", StreamEvent::Content("Sure.".into()));
        let (state, effects) = stream(state, "m1", StreamEvent::Complete);

        let chat_id = state.chat_id.clone().expect("chat id assigned");
        let summary = effects
            .iter()
            .find_map(|e| match e {
                Effect::IndexRecent(entry) => Some(entry.as_ref().clone()),
                _ => None,
            })
            .expect("recent index update");
        assert_eq!(summary.id, chat_id);
        assert_eq!(summary.title, "hello");
        assert_eq!(summary.preview, "Sure.");
        assert_eq!(summary.message_count, 2);

        let (state, _) = transition(state, Input::PlaceholderOpened { id: "m2".into() }, NOW);
        let (state, effects) = stream(state, "m2", StreamEvent::Complete);
        assert_eq!(state.chat_id.as_deref(), Some(chat_id.as_str()));
        let delta_has_chat_id = effects.iter().any(|e| matches!(
            e,
            Effect::Emit(msg) if matches!(
                msg.as_ref(),
                ChatUpdate::SessionDelta { changes } if changes.chat_id.is_some()
            )
        ));
        assert!(!delta_has_chat_id, "chat id announced only when first assigned");
    }

    #[test]
    fn error_replaces_content_and_is_terminal() {
        let state = with_placeholder("m1");
        let (state, _) = stream(state, "m1", StreamEvent::Content("partial".into()));
        let (state, effects) = stream(state, "m1", StreamEvent::Error("reset by peer".into()));

        let m1 = state.message("m1").unwrap();
        assert_eq!(m1.content, STREAM_FAILURE_TEXT);
        assert_eq!(m1.status, MessageStatus::Error);
        assert!(!state.is_loading);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Processing(ProcessingOp::Fail(cause)) if cause == "reset by peer"
        )));
        assert!(!effects.iter().any(|e| matches!(e, Effect::IndexRecent(_))));

        let (after, effects) = stream(state.clone(), "m1", StreamEvent::Content("late".into()));
        assert!(effects.is_empty());
        assert_eq!(after, state);
    }

    #[test]
    fn terminal_message_never_returns_to_typing() {
        let state = with_placeholder("m1");
        let (state, _) = stream(state, "m1", StreamEvent::Complete);
        let (after, effects) = stream(state.clone(), "m1", StreamEvent::Error("late".into()));

        assert!(effects.is_empty());
        assert_eq!(after.message("m1").unwrap().status, MessageStatus::Received);
    }

    #[test]
    fn events_after_reset_are_no_ops() {
        let state = with_placeholder("m1");
        let (state, effects) = transition(state, Input::Reset, NOW);
        assert!(state.messages.is_empty());
        assert!(state.chat_id.is_none());
        assert!(!state.is_loading);
        assert_eq!(effects.len(), 2);

        let (after, effects) = stream(state.clone(), "m1", StreamEvent::Content("x".into()));
        assert!(effects.is_empty());
        let (after, effects) = stream(after, "m1", StreamEvent::Complete);
        assert!(effects.is_empty());
        assert_eq!(after, state);
    }

    #[test]
    fn user_messages_are_never_stream_targets() {
        let state = with_placeholder("m1");
        let (after, effects) = stream(state.clone(), "u1", StreamEvent::Content("x".into()));
        assert!(effects.is_empty());
        assert_eq!(after.message("u1").unwrap().content, "hello");
    }

    fn with_user_message() -> ChatState {
        let (state, _) = transition(
            test_state(),
            Input::UserMessage {
                id: "u1".into(),
                content: "ping".into(),
                attachments: vec![],
            },
            NOW,
        );
        let (state, _) = transition(state, Input::LoadingChanged(true), NOW);
        state
    }

    fn unary_reply(state: ChatState, reply_to: &str) -> (ChatState, Vec<Effect>) {
        transition(
            state,
            Input::UnaryReply {
                id: "a1".into(),
                reply_to: reply_to.into(),
                content: "pong".into(),
            },
            NOW,
        )
    }

    #[test]
    fn unary_reply_indexes_and_clears_loading() {
        let (state, effects) = unary_reply(with_user_message(), "u1");

        assert!(!state.is_loading);
        assert!(state.chat_id.is_some());
        assert_eq!(state.messages[1].status, MessageStatus::Received);
        assert!(effects.iter().any(|e| matches!(e, Effect::IndexRecent(_))));
    }

    #[test]
    fn unary_reply_after_reset_is_dropped() {
        let (state, _) = transition(with_user_message(), Input::Reset, NOW);
        let (after, effects) = unary_reply(state.clone(), "u1");

        assert!(effects.is_empty());
        assert_eq!(after, state);
        assert!(after.chat_id.is_none());
    }

    #[test]
    fn error_message_uses_error_role() {
        let (state, _) = transition(
            with_user_message(),
            Input::ErrorMessage {
                id: "e1".into(),
                reply_to: "u1".into(),
                content: SEND_FAILURE_TEXT.into(),
            },
            NOW,
        );
        assert_eq!(state.messages[1].role, MessageRole::Error);
        assert_eq!(state.messages[1].status, MessageStatus::Error);
        assert!(!state.is_loading);
    }

    #[test]
    fn error_message_after_app_switch_is_dropped() {
        let (state, _) = transition(
            with_user_message(),
            Input::AppSwitched(AssistantApp::Health),
            NOW,
        );
        let (after, effects) = transition(
            state.clone(),
            Input::ErrorMessage {
                id: "e1".into(),
                reply_to: "u1".into(),
                content: SEND_FAILURE_TEXT.into(),
            },
            NOW,
        );
        assert!(effects.is_empty());
        assert_eq!(after, state);
    }

    #[test]
    fn abandoned_stream_finalizes_reply_and_frees_session() {
        let state = with_placeholder("m1");
        let (state, _) = stream(state, "m1", StreamEvent::Content("Half an ans".into()));
        let (state, effects) = transition(
            state,
            Input::StreamAbandoned {
                message_id: "m1".into(),
            },
            NOW,
        );

        let m1 = state.message("m1").unwrap();
        assert_eq!(m1.content, "Half an ans");
        assert_eq!(m1.status, MessageStatus::Received);
        assert!(state.can_send());
        assert!(state.chat_id.is_none());
        assert!(!effects.iter().any(|e| matches!(e, Effect::IndexRecent(_))));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Processing(ProcessingOp::Cancel))));
    }

    #[test]
    fn abandoned_empty_reply_gets_cancelled_text() {
        let state = with_placeholder("m1");
        let (state, _) = transition(
            state,
            Input::StreamAbandoned {
                message_id: "m1".into(),
            },
            NOW,
        );
        assert_eq!(state.message("m1").unwrap().content, CANCELLED_TEXT);
    }

    #[test]
    fn abandon_after_reset_or_completion_is_a_no_op() {
        let abandon = || Input::StreamAbandoned {
            message_id: "m1".into(),
        };

        let (reset, _) = transition(with_placeholder("m1"), Input::Reset, NOW);
        let (after, effects) = transition(reset.clone(), abandon(), NOW);
        assert!(effects.is_empty());
        assert_eq!(after, reset);

        let (done, _) = stream(with_placeholder("m1"), "m1", StreamEvent::Complete);
        let (after, effects) = transition(done.clone(), abandon(), NOW);
        assert!(effects.is_empty());
        assert_eq!(after, done);
    }

    #[test]
    fn app_switch_resets_conversation() {
        let state = with_placeholder("m1");
        let (state, effects) = transition(state, Input::AppSwitched(AssistantApp::Manus), NOW);

        assert_eq!(state.app, AssistantApp::Manus);
        assert!(state.messages.is_empty());
        assert!(matches!(
            effects[0],
            Effect::Emit(ref msg) if matches!(
                msg.as_ref(),
                ChatUpdate::SessionReset { app: AssistantApp::Manus }
            )
        ));
    }

    #[test]
    fn typing_indicator_blocks_sending() {
        let (state, effects) = transition(
            test_state(),
            Input::TypingChanged {
                is_typing: true,
                text: "composing".into(),
            },
            NOW,
        );
        assert!(!state.can_send());
        assert_eq!(state.typing_text, "composing");
        assert_eq!(effects.len(), 1);
    }
}
