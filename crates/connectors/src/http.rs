//! Shared HTTP plumbing for the assistant endpoints.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use superai_protocol::{ChatRequest, UnaryReply};
use tracing::{debug, warn};

use crate::ConnectorError;

/// Chat id sent in query strings when the conversation has none yet
pub const DEFAULT_CHAT_ID: &str = "default";

const EVENT_STREAM: &str = "text/event-stream";

/// Connection settings resolved from client configuration
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub connect_timeout: Duration,
    pub client_type: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8123/api".to_string(),
            auth_token: None,
            connect_timeout: Duration::from_secs(60),
            client_type: "superai-cli".to_string(),
        }
    }
}

/// Cheap-to-clone wrapper around a configured `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    settings: Arc<HttpSettings>,
}

impl HttpClient {
    pub fn new(settings: HttpSettings) -> Result<Self, ConnectorError> {
        if !settings.base_url.starts_with("http://") && !settings.base_url.starts_with("https://")
        {
            return Err(ConnectorError::InvalidUrl(settings.base_url));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            settings: Arc::new(settings),
        })
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Join the base URL and an endpoint path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn decorate(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("X-Client-Type", &self.settings.client_type);
        match &self.settings.auth_token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Open a subscribe-style event stream (`GET` with query parameters).
    pub async fn open_event_stream(
        &self,
        path: &str,
        request: &ChatRequest,
    ) -> Result<Response, ConnectorError> {
        let url = self.url(path);
        let chat_id = request.chat_id.as_deref().unwrap_or(DEFAULT_CHAT_ID);
        debug!(
            component = "http",
            event = "http.subscribe",
            url = %url,
            app = %request.app,
            "Opening event stream"
        );

        let response = self
            .decorate(self.client.get(&url))
            .header("Accept", EVENT_STREAM)
            .query(&[
                ("message", request.message.as_str()),
                ("chatId", chat_id),
                ("app", request.app.slug()),
            ])
            .send()
            .await?;
        check_status(response).await
    }

    /// Issue a streaming `POST` with a JSON body.
    pub async fn open_chunked(
        &self,
        path: &str,
        request: &ChatRequest,
    ) -> Result<Response, ConnectorError> {
        let url = self.url(path);
        debug!(
            component = "http",
            event = "http.chunked",
            url = %url,
            app = %request.app,
            "Opening chunked stream"
        );

        let response = self
            .decorate(self.client.post(&url))
            .header("Accept", EVENT_STREAM)
            .json(request)
            .send()
            .await?;
        check_status(response).await
    }

    /// Non-streaming chat call; the reply arrives as one JSON document.
    pub async fn post_unary(
        &self,
        path: &str,
        request: &ChatRequest,
    ) -> Result<UnaryReply, ConnectorError> {
        let url = self.url(path);
        let response = self
            .decorate(self.client.post(&url))
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn check_status(response: Response) -> Result<Response, ConnectorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        warn!(
            component = "http",
            event = "http.unauthorized",
            url = %response.url(),
            "Assistant rejected credentials"
        );
        return Err(ConnectorError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ConnectorError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_duplicate_slashes() {
        let client = HttpClient::new(HttpSettings {
            base_url: "http://localhost:8123/api/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.url("/ai/manus/chat"),
            "http://localhost:8123/api/ai/manus/chat"
        );
    }

    #[test]
    fn rejects_base_url_without_scheme() {
        let err = HttpClient::new(HttpSettings {
            base_url: "localhost:8123".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidUrl(_)));
    }
}
