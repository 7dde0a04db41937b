//! Client configuration.
//!
//! Resolved once at startup: defaults, then an optional TOML file
//! (`--config` > `SUPERAI_CONFIG` > `{data_dir}/config.toml`), then
//! environment overrides, then CLI flags applied by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use superai_connectors::{HttpSettings, TransportKind};
use superai_protocol::AssistantApp;
use tracing::debug;

use crate::error::ChatError;
use crate::paths;
use crate::recent::{RecentPolicy, DEFAULT_RECENT_LIMIT};

pub const CONFIG_ENV: &str = "SUPERAI_CONFIG";
pub const BASE_URL_ENV: &str = "SUPERAI_API_BASE_URL";
pub const AUTH_TOKEN_ENV: &str = "SUPERAI_AUTH_TOKEN";

/// One assistant's endpoints and the wire style of its stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub stream_path: String,
    pub transport: TransportKind,
    pub unary_path: String,
}

impl Endpoint {
    fn subscribe(stream_path: &str, unary_path: &str) -> Self {
        Self {
            stream_path: stream_path.to_string(),
            transport: TransportKind::Subscribe,
            unary_path: unary_path.to_string(),
        }
    }
}

/// Static app → endpoint mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointTable {
    pub fitness: Endpoint,
    pub love: Endpoint,
    pub manus: Endpoint,
    pub health: Endpoint,
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self {
            fitness: Endpoint::subscribe("/ai/fitness/chat-stream", "/ai/fitness/chat"),
            love: Endpoint::subscribe("/ai/love/chat-stream", "/ai/love/chat"),
            manus: Endpoint {
                stream_path: "/ai/manus/chat".to_string(),
                transport: TransportKind::Chunked,
                unary_path: "/ai/manus/chat".to_string(),
            },
            health: Endpoint::subscribe("/ai/health/chat/sse/emitter", "/ai/health/chat"),
        }
    }
}

impl EndpointTable {
    pub fn get(&self, app: AssistantApp) -> &Endpoint {
        match app {
            AssistantApp::Fitness => &self.fitness,
            AssistantApp::Love => &self.love,
            AssistantApp::Manus => &self.manus,
            AssistantApp::Health => &self.health,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub connect_timeout_secs: u64,
    pub client_type: String,
    pub default_app: AssistantApp,
    pub recent_limit: usize,
    pub recent_policy: RecentPolicy,
    pub log_limit: usize,
    pub endpoints: EndpointTable,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let http = HttpSettings::default();
        Self {
            base_url: http.base_url,
            auth_token: None,
            connect_timeout_secs: http.connect_timeout.as_secs(),
            client_type: http.client_type,
            default_app: AssistantApp::default(),
            recent_limit: DEFAULT_RECENT_LIMIT,
            recent_policy: RecentPolicy::default(),
            log_limit: crate::processing::DEFAULT_LOG_LIMIT,
            endpoints: EndpointTable::default(),
        }
    }
}

impl ClientConfig {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load(explicit: Option<&Path>, data_dir: &Path) -> Result<Self, ChatError> {
        let env_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let required = explicit.is_some() || env_path.is_some();
        let path = explicit
            .map(Path::to_path_buf)
            .or(env_path)
            .unwrap_or_else(|| paths::config_path(data_dir));

        let mut config = if path.exists() {
            debug!(
                component = "config",
                event = "config.file_loaded",
                path = %path.display(),
                "Loading config file"
            );
            Self::from_file(&path)?
        } else if required {
            return Err(ChatError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ChatError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ChatError> {
        toml::from_str(text).map_err(|e| ChatError::Config(e.to_string()))
    }

    /// Apply `SUPERAI_API_BASE_URL` / `SUPERAI_AUTH_TOKEN` style overrides.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(token) = lookup(AUTH_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.auth_token = Some(token);
        }
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            base_url: self.base_url.clone(),
            auth_token: self.auth_token.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            client_type: self.client_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_route_manus_through_chunked_transport() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8123/api");
        assert_eq!(config.recent_limit, 20);
        assert_eq!(
            config.endpoints.get(AssistantApp::Manus).transport,
            TransportKind::Chunked
        );
        assert_eq!(
            config.endpoints.get(AssistantApp::Health).stream_path,
            "/ai/health/chat/sse/emitter"
        );
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            base_url = "https://example.test/api"
            recent_policy = "move_to_front"

            [endpoints.love]
            stream_path = "/v2/love/stream"
            transport = "chunked"
            unary_path = "/v2/love/chat"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://example.test/api");
        assert_eq!(config.recent_policy, RecentPolicy::MoveToFront);
        assert_eq!(config.endpoints.love.transport, TransportKind::Chunked);
        assert_eq!(config.endpoints.fitness, EndpointTable::default().fitness);
        assert_eq!(config.connect_timeout_secs, 60);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ClientConfig::default();
        config.apply_env(|key| match key {
            BASE_URL_ENV => Some("http://10.0.0.2:9000/api".into()),
            AUTH_TOKEN_ENV => Some("secret".into()),
            _ => None,
        });
        assert_eq!(config.base_url, "http://10.0.0.2:9000/api");
        assert_eq!(config.http_settings().auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = ClientConfig::from_toml_str("recent_limit = \"lots\"").unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(&path, "default_app = \"health\"\n").unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.default_app, AssistantApp::Health);
    }
}
