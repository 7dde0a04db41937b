//! Chat client
//!
//! Coordinates one send: claim the request key in the connection registry,
//! open the exchange in the chat actor, start the transport for the active
//! app, and forward its events back to the actor from a dedicated task that
//! owns the registry lease.

use std::collections::HashMap;
use std::sync::Arc;

use superai_connectors::{
    ChunkedTransport, HttpClient, StreamEvent, StreamRequest, StreamTransport, SubscribeTransport,
    TransportKind,
};
use superai_protocol::{AssistantApp, Attachment, ChatRequest, RecentChat};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::processing::{LogEntry, LogLevel, ProcessingState, ThinkingStage, ToolStatus};
use crate::registry::{compute_key, ConnectionLease, ConnectionRegistry};
use crate::session::{ChatSnapshot, SessionStore};
use crate::session_actor::ChatActorHandle;
use crate::session_command::{ChatCommand, Subscription};
use crate::transition::{ChatState, SEND_FAILURE_TEXT};

/// Result of [`ChatClient::send_stream`]
#[derive(Debug)]
pub enum SendOutcome {
    /// A new stream was opened
    Started(StreamTicket),
    /// An identical request is already in flight; nothing was sent
    Duplicate,
}

/// Tracks one forwarded stream.
#[derive(Debug)]
pub struct StreamTicket {
    pub reply_id: String,
    pub key: String,
    forwarder: JoinHandle<()>,
}

impl StreamTicket {
    /// Wait until the stream reached a terminal event or was cancelled.
    pub async fn wait(self) {
        if let Err(err) = self.forwarder.await {
            warn!(
                component = "chat_client",
                event = "stream.forwarder_failed",
                key = %self.key,
                error = %err,
                "Stream forwarder ended abnormally"
            );
        }
    }

    pub fn is_finished(&self) -> bool {
        self.forwarder.is_finished()
    }
}

pub struct ChatClient {
    config: Arc<ClientConfig>,
    http: HttpClient,
    transports: HashMap<TransportKind, Arc<dyn StreamTransport>>,
    registry: ConnectionRegistry,
    actor: ChatActorHandle,
}

impl ChatClient {
    /// Build a client with the HTTP transports. Must run inside a tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        let http = HttpClient::new(config.http_settings())?;
        let transports: Vec<Arc<dyn StreamTransport>> = vec![
            Arc::new(SubscribeTransport::new(http.clone())),
            Arc::new(ChunkedTransport::new(http.clone())),
        ];
        Ok(Self::assemble(config, http, transports))
    }

    /// Build a client with caller-supplied transports.
    pub fn with_transports(
        config: ClientConfig,
        transports: Vec<Arc<dyn StreamTransport>>,
    ) -> Result<Self, ChatError> {
        let http = HttpClient::new(config.http_settings())?;
        Ok(Self::assemble(config, http, transports))
    }

    fn assemble(
        config: ClientConfig,
        http: HttpClient,
        transports: Vec<Arc<dyn StreamTransport>>,
    ) -> Self {
        let actor = ChatActorHandle::spawn(SessionStore::from_config(&config));
        Self {
            config: Arc::new(config),
            http,
            transports: transports.into_iter().map(|t| (t.kind(), t)).collect(),
            registry: ConnectionRegistry::new(),
            actor,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> Arc<ChatSnapshot> {
        self.actor.snapshot()
    }

    pub async fn subscribe(&self) -> Result<Subscription, ChatError> {
        self.actor.subscribe().await
    }

    pub async fn state(&self) -> Result<ChatState, ChatError> {
        self.actor
            .request(|reply| ChatCommand::GetState { reply })
            .await
    }

    async fn active_chat(&self) -> Result<(AssistantApp, Option<String>), ChatError> {
        self.actor
            .request(|reply| ChatCommand::GetActiveChat { reply })
            .await
    }

    pub async fn recent(&self) -> Result<Vec<RecentChat>, ChatError> {
        self.actor
            .request(|reply| ChatCommand::GetRecent { reply })
            .await
    }

    pub async fn logs(&self, filtered: bool) -> Result<Vec<LogEntry>, ChatError> {
        self.actor
            .request(|reply| ChatCommand::GetLogs { filtered, reply })
            .await
    }

    pub async fn toggle_log_filter(&self, level: LogLevel) -> Result<(), ChatError> {
        self.actor.send(ChatCommand::ToggleLogFilter { level }).await
    }

    pub async fn add_log(&self, level: LogLevel, message: impl Into<String>) -> Result<(), ChatError> {
        self.actor
            .send(ChatCommand::AddLog {
                level,
                message: message.into(),
            })
            .await
    }

    /// Thinking indicator, tool calls and log as of now.
    pub async fn processing(&self) -> Result<ProcessingState, ChatError> {
        self.actor
            .request(|reply| ChatCommand::GetProcessing { reply })
            .await
    }

    pub async fn start_thinking(
        &self,
        text: impl Into<String>,
        stage: ThinkingStage,
    ) -> Result<(), ChatError> {
        self.actor
            .send(ChatCommand::StartThinking {
                text: text.into(),
                stage,
            })
            .await
    }

    pub async fn update_thinking(
        &self,
        text: impl Into<String>,
        progress: Option<u8>,
        stage: Option<ThinkingStage>,
    ) -> Result<(), ChatError> {
        self.actor
            .send(ChatCommand::UpdateThinking {
                text: text.into(),
                progress,
                stage,
            })
            .await
    }

    pub async fn complete_thinking(&self) -> Result<(), ChatError> {
        self.actor.send(ChatCommand::CompleteThinking).await
    }

    /// Queue a tool call and return its id.
    pub async fn add_tool(
        &self,
        name: impl Into<String>,
        display_name: Option<String>,
    ) -> Result<String, ChatError> {
        let name = name.into();
        self.actor
            .request(|reply| ChatCommand::AddTool {
                name,
                display_name,
                reply,
            })
            .await
    }

    pub async fn set_tool_status(
        &self,
        tool_id: &str,
        status: ToolStatus,
        error: Option<String>,
    ) -> Result<(), ChatError> {
        self.actor
            .send(ChatCommand::SetToolStatus {
                tool_id: tool_id.to_string(),
                status,
                error,
            })
            .await
    }

    pub async fn remove_tool(&self, tool_id: &str) -> Result<(), ChatError> {
        self.actor
            .send(ChatCommand::RemoveTool {
                tool_id: tool_id.to_string(),
            })
            .await
    }

    /// Stream a reply to `content` from the active assistant.
    pub async fn send_stream(
        &self,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<SendOutcome, ChatError> {
        let message = content.trim();
        if message.is_empty() && attachments.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let (app, chat_id) = self.active_chat().await?;
        let endpoint = self.config.endpoints.get(app);
        let transport = self
            .transports
            .get(&endpoint.transport)
            .cloned()
            .ok_or_else(|| ChatError::UnknownApp(app.slug().to_string()))?;

        let key = compute_key(
            &endpoint.stream_path,
            message,
            chat_id.as_deref(),
        );
        let lease = match self.registry.try_acquire(&key) {
            Ok(lease) => lease,
            Err(ChatError::DuplicateRequest { .. }) => return Ok(SendOutcome::Duplicate),
            Err(err) => return Err(err),
        };

        // The lease drops (and frees the key) if the exchange is refused
        let exchange = self
            .actor
            .request(|reply| ChatCommand::BeginExchange {
                content: message.to_string(),
                attachments: attachments.clone(),
                reply,
            })
            .await??;

        let payload = ChatRequest::new(app, exchange.content)
            .with_chat_id(exchange.chat_id)
            .with_attachments(attachments);
        info!(
            component = "chat_client",
            event = "stream.opening",
            app = %app,
            transport = ?transport.kind(),
            path = %endpoint.stream_path,
            reply_id = %exchange.reply_id,
            "Opening reply stream"
        );
        let connection = transport.open(StreamRequest {
            path: endpoint.stream_path.clone(),
            payload,
        });
        let token = connection.handle.token();
        lease.register(connection.handle);

        let forwarder = tokio::spawn(forward_events(
            self.actor.clone(),
            lease,
            token,
            connection.events,
            exchange.reply_id.clone(),
        ));

        Ok(SendOutcome::Started(StreamTicket {
            reply_id: exchange.reply_id,
            key,
            forwarder,
        }))
    }

    /// Non-streaming send. Failures are shown as an error message in the
    /// conversation and returned to the caller.
    pub async fn ask(
        &self,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<String, ChatError> {
        let (app, _) = self.active_chat().await?;
        let exchange = self
            .actor
            .request(|reply| ChatCommand::BeginUnary {
                content: content.to_string(),
                attachments: attachments.clone(),
                reply,
            })
            .await??;

        let endpoint = self.config.endpoints.get(app);
        let payload = ChatRequest::new(app, exchange.content)
            .with_chat_id(exchange.chat_id)
            .with_attachments(attachments);

        match self.http.post_unary(&endpoint.unary_path, &payload).await {
            Ok(reply) => {
                self.actor
                    .send(ChatCommand::RecordUnaryReply {
                        reply_to: exchange.user_message_id,
                        content: reply.message.clone(),
                    })
                    .await?;
                Ok(reply.message)
            }
            Err(err) => {
                warn!(
                    component = "chat_client",
                    event = "unary.failed",
                    app = %app,
                    error = %err,
                    "Unary chat request failed"
                );
                self.actor
                    .send(ChatCommand::PushError {
                        reply_to: exchange.user_message_id,
                        content: SEND_FAILURE_TEXT.to_string(),
                    })
                    .await?;
                Err(err.into())
            }
        }
    }

    pub async fn set_typing(&self, is_typing: bool, text: impl Into<String>) -> Result<(), ChatError> {
        self.actor
            .send(ChatCommand::SetTyping {
                is_typing,
                text: text.into(),
            })
            .await
    }

    /// Close every open stream and clear the conversation.
    pub async fn reset(&self) -> Result<(), ChatError> {
        self.registry.release_all();
        self.actor.send(ChatCommand::Reset).await
    }

    pub async fn new_session(&self) -> Result<(), ChatError> {
        self.reset().await
    }

    pub async fn switch_app(&self, app: AssistantApp) -> Result<(), ChatError> {
        self.registry.release_all();
        self.actor.send(ChatCommand::SwitchApp { app }).await
    }

    pub async fn delete_recent(&self, id: &str) -> Result<bool, ChatError> {
        self.actor
            .request(|reply| ChatCommand::DeleteRecent {
                id: id.to_string(),
                reply,
            })
            .await
    }

    /// Close every open stream without touching the conversation.
    pub fn disconnect_all(&self) {
        self.registry.release_all();
    }
}

/// Relay transport events to the actor until the first terminal event or
/// cancellation. Holds the lease for the lifetime of the stream. A cancelled
/// stream delivers nothing further; its reply is finalized as abandoned.
async fn forward_events(
    actor: ChatActorHandle,
    lease: ConnectionLease,
    token: CancellationToken,
    mut events: mpsc::Receiver<StreamEvent>,
    reply_id: String,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(
                    component = "chat_client",
                    event = "stream.cancelled",
                    key = %lease.key(),
                    "Stream cancelled, dropping remaining events"
                );
                abandon(&actor, &reply_id).await;
                break;
            }
            next = events.recv() => {
                let event = match next {
                    Some(event) => event,
                    None if token.is_cancelled() => {
                        abandon(&actor, &reply_id).await;
                        break;
                    }
                    None => StreamEvent::Error("stream ended without completion".to_string()),
                };
                let terminal = event.is_terminal();
                let forwarded = actor
                    .send(ChatCommand::ApplyEvent {
                        message_id: reply_id.clone(),
                        event,
                    })
                    .await;
                if forwarded.is_err() || terminal {
                    break;
                }
            }
        }
    }
    drop(lease);
}

async fn abandon(actor: &ChatActorHandle, reply_id: &str) {
    // Only fails once the actor is gone, and then there is nothing to finalize
    let _ = actor
        .send(ChatCommand::AbandonStream {
            message_id: reply_id.to_string(),
        })
        .await;
}
