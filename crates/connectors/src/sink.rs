//! Event sink and transport handles.
//!
//! A transport task owns an [`EventSink`] and reports through three calls:
//! `on_content`, `on_complete`, `on_error`. The sink guarantees at most one
//! terminal event per connection and goes silent once the connection's
//! [`TransportHandle`] has been closed.

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{ConnectorError, StreamEvent};

const EVENT_BUFFER: usize = 256;

/// Receiving side of an opened stream plus the handle that cancels it
pub struct StreamConnection {
    pub handle: TransportHandle,
    pub events: mpsc::Receiver<StreamEvent>,
}

/// Owning handle to an in-flight transport. Closing is idempotent.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    cancel: CancellationToken,
    task: Option<AbortHandle>,
}

impl TransportHandle {
    pub fn new(cancel: CancellationToken, task: Option<AbortHandle>) -> Self {
        Self { cancel, task }
    }

    /// Stop delivery and abort the underlying request.
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        if let Some(task) = &self.task {
            task.abort();
        }
        debug!(
            component = "transport",
            event = "transport.closed",
            "Transport handle closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token observers can await to learn about cancellation.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Producer side handed to a transport task.
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    terminated: bool,
}

impl EventSink {
    /// Create a sink, its receiver, and the token shared with the handle.
    pub fn channel() -> (Self, mpsc::Receiver<StreamEvent>, CancellationToken) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let sink = Self {
            tx,
            cancel: cancel.clone(),
            terminated: false,
        };
        (sink, rx, cancel)
    }

    /// True once a terminal event was sent or the connection was cancelled.
    pub fn is_closed(&self) -> bool {
        self.terminated || self.cancel.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn on_content(&mut self, text: String) {
        if self.is_closed() || text.is_empty() {
            return;
        }
        if self.tx.send(StreamEvent::Content(text)).await.is_err() {
            // Receiver gone: nobody will read a terminal event either.
            self.terminated = true;
        }
    }

    pub async fn on_complete(&mut self) {
        self.finish(StreamEvent::Complete).await;
    }

    pub async fn on_error(&mut self, err: ConnectorError) {
        if self.is_cancelled() || matches!(err, ConnectorError::Cancelled) {
            debug!(
                component = "transport",
                event = "transport.error_swallowed",
                error = %err,
                "Error after cancellation ignored"
            );
            self.terminated = true;
            return;
        }
        self.finish(StreamEvent::Error(err.to_string())).await;
    }

    async fn finish(&mut self, event: StreamEvent) {
        if self.is_closed() {
            return;
        }
        self.terminated = true;
        let _ = self.tx.send(event).await;
    }
}
