//! Stream transports.
//!
//! Each transport spawns one task per connection. The task reads the
//! response body, normalizes it into [`StreamEvent`]s through an
//! [`EventSink`], and stops as soon as the connection's handle is closed.

use std::future::Future;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use superai_protocol::ChatRequest;
use tracing::{debug, info};

use crate::http::HttpClient;
use crate::lines::{classify_line, ChunkedLine, LineDecoder};
use crate::sink::{EventSink, StreamConnection, TransportHandle};
use crate::sse::SseDecoder;
use crate::{ConnectorError, TransportKind};

/// What to open: endpoint path plus the chat payload
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub path: String,
    pub payload: ChatRequest,
}

/// A wire style able to open streaming connections.
pub trait StreamTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Start a connection. Must be called from within a tokio runtime.
    fn open(&self, request: StreamRequest) -> StreamConnection;
}

/// Subscribe-style SSE stream over `GET`
pub struct SubscribeTransport {
    http: HttpClient,
}

impl SubscribeTransport {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

impl StreamTransport for SubscribeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Subscribe
    }

    fn open(&self, request: StreamRequest) -> StreamConnection {
        let http = self.http.clone();
        spawn_transport(self.kind(), move |mut sink| async move {
            match http
                .open_event_stream(&request.path, &request.payload)
                .await
            {
                Ok(response) => drive_subscribe(response.bytes_stream(), &mut sink).await,
                Err(err) => sink.on_error(err).await,
            }
        })
    }
}

/// Chunked response read loop over `POST`
pub struct ChunkedTransport {
    http: HttpClient,
}

impl ChunkedTransport {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

impl StreamTransport for ChunkedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Chunked
    }

    fn open(&self, request: StreamRequest) -> StreamConnection {
        let http = self.http.clone();
        spawn_transport(self.kind(), move |mut sink| async move {
            match http.open_chunked(&request.path, &request.payload).await {
                Ok(response) => drive_chunked(response.bytes_stream(), &mut sink).await,
                Err(err) => sink.on_error(err).await,
            }
        })
    }
}

fn spawn_transport<F, Fut>(kind: TransportKind, run: F) -> StreamConnection
where
    F: FnOnce(EventSink) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (sink, events, cancel) = EventSink::channel();
    let token = cancel.clone();
    let body = run(sink);

    let task = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(
                    component = "transport",
                    event = "transport.cancelled",
                    kind = ?kind,
                    "Stream cancelled before completion"
                );
            }
            _ = body => {}
        }
    });

    StreamConnection {
        handle: TransportHandle::new(cancel, Some(task.abort_handle())),
        events,
    }
}

/// Read an SSE body: one content fragment per dispatched frame.
pub async fn drive_subscribe<S, E>(body: S, sink: &mut EventSink)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<ConnectorError>,
{
    futures::pin_mut!(body);
    let mut lines = LineDecoder::new();
    let mut frames = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(err) => {
                sink.on_error(err.into()).await;
                return;
            }
        };
        for line in lines.push(&bytes) {
            if let Some(data) = frames.push_line(&line) {
                sink.on_content(data).await;
            }
        }
        if sink.is_closed() {
            return;
        }
    }

    if let Some(data) = lines.finish().and_then(|line| frames.push_line(&line)) {
        sink.on_content(data).await;
    }
    if let Some(data) = frames.finish() {
        sink.on_content(data).await;
    }
    info!(
        component = "transport",
        event = "transport.subscribe.closed",
        "Event stream closed by server"
    );
    sink.on_complete().await;
}

/// Read a newline-delimited body, honoring the `data:` marker and `[DONE]`.
pub async fn drive_chunked<S, E>(body: S, sink: &mut EventSink)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<ConnectorError>,
{
    futures::pin_mut!(body);
    let mut lines = LineDecoder::new();

    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(err) => {
                sink.on_error(err.into()).await;
                return;
            }
        };
        for line in lines.push(&bytes) {
            if emit_line(&line, sink).await {
                sink.on_complete().await;
                return;
            }
        }
        if sink.is_closed() {
            return;
        }
    }

    if let Some(line) = lines.finish() {
        emit_line(&line, sink).await;
    }
    info!(
        component = "transport",
        event = "transport.chunked.eof",
        "Chunked stream reached end of input"
    );
    sink.on_complete().await;
}

/// Returns true when the line is the end-of-stream sentinel.
async fn emit_line(line: &str, sink: &mut EventSink) -> bool {
    match classify_line(line) {
        ChunkedLine::Content(text) => {
            sink.on_content(text).await;
            false
        }
        ChunkedLine::Done => true,
        ChunkedLine::Skip => false,
    }
}
