//! HTTP client for the agent's `run_sse` endpoint.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::errors::StreamError;
use crate::source::ByteStreamSource;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_USER_ID: &str = "user_1";
const DEFAULT_SESSION_ID: &str = "session_001";
const BASIC_AUTH_USER: &str = "admin";

/// Chunk source over a live HTTP response body.
pub type HttpChunkSource = ByteStreamSource<reqwest::Error>;

/// Connection settings for the agent backend.
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    /// Base URL of the agent service.
    pub base_url: String,
    pub user_id: String,
    pub session_id: String,
    /// Optional knowledge-base name appended to the stream path.
    pub rag_name: Option<String>,
    /// Password for HTTP basic auth, when the backend requires it.
    pub password: Option<String>,
    /// Whole-request timeout, streaming included.
    pub timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            session_id: DEFAULT_SESSION_ID.to_string(),
            rag_name: None,
            password: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl EndpointConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from `AGENT_*` environment variables.
    pub fn from_env() -> Result<Self, StreamError> {
        let mut config = Self::default();
        if let Some(base_url) = env_value("AGENT_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(user_id) = env_value("AGENT_USER_ID") {
            config.user_id = user_id;
        }
        if let Some(session_id) = env_value("AGENT_SESSION_ID") {
            config.session_id = session_id;
        }
        config.rag_name = env_value("AGENT_RAG_NAME");
        config.password = env_value("AGENT_PASSWORD");
        if let Some(raw) = env_value("AGENT_TIMEOUT_SECS") {
            let secs: u64 = raw
                .parse()
                .map_err(|e| StreamError::Config(format!("invalid AGENT_TIMEOUT_SECS {raw:?}: {e}")))?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn rag_name(mut self, rag_name: impl Into<String>) -> Self {
        self.rag_name = Some(rag_name.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn stream_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.rag_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(rag) => format!("{base}/run_sse/{rag}"),
            None => format!("{base}/run_sse"),
        }
    }

    fn validate(&self) -> Result<(), StreamError> {
        if self.base_url.trim().is_empty() {
            return Err(StreamError::Config("base_url must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(StreamError::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    prompt: &'a str,
    user_id: &'a str,
    session_id: &'a str,
}

/// Opens response streams against the agent backend.
pub struct AgentEndpoint {
    client: reqwest::Client,
    config: EndpointConfig,
}

impl AgentEndpoint {
    pub fn new(config: EndpointConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StreamError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates an endpoint from `AGENT_*` environment variables.
    pub fn from_env() -> Result<Self, StreamError> {
        Self::new(EndpointConfig::from_env()?)
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Posts `prompt` and returns the response body as a chunk source.
    ///
    /// Non-success statuses fail before any chunk is read.
    pub async fn open_stream(&self, prompt: &str) -> Result<HttpChunkSource, StreamError> {
        let url = self.config.stream_url();
        debug!(%url, session_id = %self.config.session_id, "opening agent stream");

        let body = RunRequest {
            prompt,
            user_id: &self.config.user_id,
            session_id: &self.config.session_id,
        };
        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body);
        if let Some(password) = &self.config.password {
            request = request.basic_auth(BASIC_AUTH_USER, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| StreamError::transport(format!("agent request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StreamError::http_status(
                status.as_u16(),
                format!("agent request failed with status {status}: {body}"),
            ));
        }
        Ok(ByteStreamSource::new(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_includes_rag_name_when_set() {
        let config = EndpointConfig::new("http://agent:8000/");
        assert_eq!(config.stream_url(), "http://agent:8000/run_sse");
        let config = config.rag_name("handbook");
        assert_eq!(config.stream_url(), "http://agent:8000/run_sse/handbook");
        assert_eq!(
            EndpointConfig::default().rag_name("  ").stream_url(),
            "http://localhost:8000/run_sse"
        );
    }

    #[test]
    fn defaults_match_backend_expectations() {
        let config = EndpointConfig::default();
        assert_eq!(config.user_id, "user_1");
        assert_eq!(config.session_id, "session_001");
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn request_body_serializes_expected_fields() {
        let body = RunRequest {
            prompt: "hi",
            user_id: "u",
            session_id: "s",
        };
        assert_eq!(
            serde_json::to_value(&body).expect("json"),
            serde_json::json!({"prompt": "hi", "user_id": "u", "session_id": "s"})
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            AgentEndpoint::new(EndpointConfig::new(" ")),
            Err(StreamError::Config(_))
        ));
        assert!(matches!(
            AgentEndpoint::new(EndpointConfig::default().timeout(Duration::ZERO)),
            Err(StreamError::Config(_))
        ));
    }

    #[tokio::test]
    async fn env_gated_smoke_opens_stream_if_agent_url_present() {
        if std::env::var("AGENT_BASE_URL")
            .unwrap_or_default()
            .trim()
            .is_empty()
        {
            eprintln!("skipping agent smoke test (AGENT_BASE_URL missing)");
            return;
        }
        let endpoint = AgentEndpoint::from_env().expect("endpoint");
        let result = endpoint.open_stream("ping").await;
        assert!(result.is_ok(), "agent smoke failed: {:?}", result.err());
    }
}
