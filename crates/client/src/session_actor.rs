//! Chat actor: owns the SessionStore and processes commands sequentially.
//!
//! The store runs inside one tokio task. Callers talk to it through
//! `ChatActorHandle`, which sends `ChatCommand` messages over an mpsc
//! channel. Lock-free reads go through `ArcSwap`.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::session::{ChatSnapshot, SessionStore};
use crate::session_command::{ChatCommand, Subscription};

const COMMAND_BUFFER: usize = 256;

/// Handle to the running chat actor (cheap to Clone).
#[derive(Clone)]
pub struct ChatActorHandle {
    command_tx: mpsc::Sender<ChatCommand>,
    snapshot: Arc<ArcSwap<ChatSnapshot>>,
}

impl ChatActorHandle {
    /// Spawn the actor task, returning a handle.
    pub fn spawn(store: SessionStore) -> ChatActorHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let snapshot = store.snapshot_arc();
        store.refresh_snapshot();

        tokio::spawn(actor_loop(store, command_rx));

        ChatActorHandle {
            command_tx,
            snapshot,
        }
    }

    /// Send a command to the actor (fire-and-forget).
    pub async fn send(&self, cmd: ChatCommand) -> Result<(), ChatError> {
        self.command_tx.send(cmd).await.map_err(|_| {
            warn!(
                component = "chat_actor",
                event = "actor.closed",
                "Actor channel closed, command dropped"
            );
            ChatError::ActorClosed
        })
    }

    /// Send a command carrying a reply channel and wait for the answer.
    pub async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ChatCommand,
    ) -> Result<T, ChatError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| ChatError::ActorClosed)
    }

    /// Lock-free snapshot read.
    pub fn snapshot(&self) -> Arc<ChatSnapshot> {
        self.snapshot.load_full()
    }

    pub async fn subscribe(&self) -> Result<Subscription, ChatError> {
        self.request(|reply| ChatCommand::Subscribe { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

async fn actor_loop(mut store: SessionStore, mut command_rx: mpsc::Receiver<ChatCommand>) {
    while let Some(cmd) = command_rx.recv().await {
        handle_command(cmd, &mut store);
        store.refresh_snapshot();
    }
    debug!(
        component = "chat_actor",
        event = "actor.stopped",
        "All handles dropped, chat actor stopping"
    );
}

fn handle_command(cmd: ChatCommand, store: &mut SessionStore) {
    match cmd {
        ChatCommand::GetState { reply } => {
            let _ = reply.send(store.state().clone());
        }
        ChatCommand::GetActiveChat { reply } => {
            let state = store.state();
            let _ = reply.send((state.app, state.chat_id.clone()));
        }
        ChatCommand::GetRecent { reply } => {
            let _ = reply.send(store.recent().entries().to_vec());
        }
        ChatCommand::GetLogs { filtered, reply } => {
            let logs = if filtered {
                store.processing().filtered_logs().cloned().collect()
            } else {
                store.processing().logs().cloned().collect()
            };
            let _ = reply.send(logs);
        }
        ChatCommand::GetProcessing { reply } => {
            let _ = reply.send(store.processing().clone());
        }
        ChatCommand::Subscribe { reply } => {
            // Refresh first so the snapshot and the receiver line up
            store.refresh_snapshot();
            let _ = reply.send(Subscription {
                snapshot: store.snapshot_arc().load_full(),
                updates: store.subscribe(),
            });
        }
        ChatCommand::BeginExchange {
            content,
            attachments,
            reply,
        } => {
            let _ = reply.send(store.begin_exchange(&content, attachments));
        }
        ChatCommand::BeginUnary {
            content,
            attachments,
            reply,
        } => {
            let _ = reply.send(store.begin_unary(&content, attachments));
        }
        ChatCommand::ApplyEvent { message_id, event } => {
            store.apply_event(&message_id, event);
        }
        ChatCommand::AbandonStream { message_id } => {
            store.abandon_stream(&message_id);
        }
        ChatCommand::RecordUnaryReply { reply_to, content } => {
            store.record_unary_reply(&reply_to, content);
        }
        ChatCommand::PushError { reply_to, content } => {
            store.push_error_message(&reply_to, content);
        }
        ChatCommand::StartThinking { text, stage } => {
            store.processing_mut().start_thinking(text, stage);
        }
        ChatCommand::UpdateThinking {
            text,
            progress,
            stage,
        } => {
            store.processing_mut().update_thinking(text, progress, stage);
        }
        ChatCommand::CompleteThinking => store.processing_mut().complete_thinking(),
        ChatCommand::AddTool {
            name,
            display_name,
            reply,
        } => {
            let _ = reply.send(store.processing_mut().add_tool(name, display_name));
        }
        ChatCommand::SetToolStatus {
            tool_id,
            status,
            error,
        } => {
            store
                .processing_mut()
                .set_tool_status(&tool_id, status, error);
        }
        ChatCommand::RemoveTool { tool_id } => {
            store.processing_mut().remove_tool(&tool_id);
        }
        ChatCommand::SetTyping { is_typing, text } => {
            store.set_typing(is_typing, text);
        }
        ChatCommand::AddLog { level, message } => {
            store.processing_mut().add_log(level, message, None);
        }
        ChatCommand::ToggleLogFilter { level } => {
            store.processing_mut().toggle_filter(level);
        }
        ChatCommand::Reset => store.reset(),
        ChatCommand::SwitchApp { app } => store.switch_app(app),
        ChatCommand::DeleteRecent { id, reply } => {
            let _ = reply.send(store.delete_recent(&id));
        }
    }
}
