//! Dashboard configuration
//!
//! Where the backend lives, how long a submission may take, and how much
//! activity the log keeps. Every value comes from an `INTELLICLAIM_*`
//! environment variable; unset variables fall back to the defaults and
//! malformed ones are rejected.

use crate::error::ClientError;
use crate::state::activity::DEFAULT_ACTIVITY_LINES;
use std::env;
use std::time::Duration;
use url::Url;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

const QUERY_PATH: &str = "api/v1/process-query";
const HEALTH_PATH: &str = "api/v1/health";
const SOCKET_IO_PATH: &str = "socket.io/";
const SOCKET_IO_QUERY: &str = "EIO=4&transport=websocket";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend location
    pub server: ServerConfig,
    /// Submission call settings
    pub http: HttpConfig,
    /// View settings
    pub ui: UiConfig,
}

/// Backend location
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the backend, always ending in `/`
    pub base_url: Url,
    /// Base URL for the realtime channel when it is served elsewhere
    pub channel_base_url: Option<Url>,
}

/// HTTP client configuration
#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
    /// Overall timeout for the submission call (None = wait indefinitely)
    pub request_timeout_secs: Option<u64>,
}

/// View configuration
#[derive(Debug, Clone)]
pub struct UiConfig {
    /// Lines kept in the activity log (0 = unlimited)
    pub activity_log_lines: usize,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("INTELLICLAIM_SERVER_URL")
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let channel_base_url = lookup("INTELLICLAIM_CHANNEL_URL")
            .map(|raw| parse_base_url(&raw))
            .transpose()?;

        let request_timeout_secs = lookup("INTELLICLAIM_REQUEST_TIMEOUT_SECS")
            .map(|raw| parse_count("INTELLICLAIM_REQUEST_TIMEOUT_SECS", &raw))
            .transpose()?;
        let activity_log_lines = lookup("INTELLICLAIM_ACTIVITY_LOG_LINES")
            .map(|raw| parse_count("INTELLICLAIM_ACTIVITY_LOG_LINES", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_ACTIVITY_LINES);

        Ok(Self {
            server: ServerConfig {
                base_url: parse_base_url(&base_url)?,
                channel_base_url,
            },
            http: HttpConfig {
                request_timeout_secs,
            },
            ui: UiConfig { activity_log_lines },
        })
    }

    /// Configuration pointing at `base_url` with every other value defaulted
    pub fn for_server(base_url: &str) -> Result<Self, ClientError> {
        let base_url = base_url.to_string();
        Self::from_lookup(move |key| (key == "INTELLICLAIM_SERVER_URL").then(|| base_url.clone()))
    }

    /// Query submission endpoint
    pub fn query_url(&self) -> Result<Url, ClientError> {
        Ok(self.server.base_url.join(QUERY_PATH)?)
    }

    /// Health check endpoint
    pub fn health_url(&self) -> Result<Url, ClientError> {
        Ok(self.server.base_url.join(HEALTH_PATH)?)
    }

    /// Websocket URL of the Socket.IO endpoint
    pub fn channel_url(&self) -> Result<Url, ClientError> {
        let base = self
            .server
            .channel_base_url
            .as_ref()
            .unwrap_or(&self.server.base_url);
        let mut url = base.join(SOCKET_IO_PATH)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ClientError::UnsupportedScheme(other.to_string())),
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::UnsupportedScheme(url.scheme().to_string()))?;
        url.set_query(Some(SOCKET_IO_QUERY));
        Ok(url)
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            activity_log_lines: DEFAULT_ACTIVITY_LINES,
        }
    }
}

fn parse_count<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ClientError> {
    raw.trim().parse().map_err(|_| {
        ClientError::InvalidConfig(format!(
            "{} must be a non-negative whole number, got {:?}",
            key, raw
        ))
    })
}

// Joined paths replace the last segment unless the base ends in '/'
fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
