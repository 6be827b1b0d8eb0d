//! Error types for the dashboard client
//!
//! `ClientError` covers everything the realtime client and the HTTP calls can
//! fail with. `ProtocolError` covers frames and payloads that do not match the
//! wire format; they are rejected at the boundary instead of being applied.

use thiserror::Error;

/// Client-level error types
#[derive(Error, Debug)]
pub enum ClientError {
    /// `process_query` was called before `connect`
    #[error("Realtime channel is not connected")]
    NotConnected,

    /// A run is still in flight
    #[error("A query is already being processed")]
    RunInProgress,

    /// HTTP transport failure (connect, send, body read, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A configured URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL scheme has no websocket counterpart
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// A configuration value is present but unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The backend answered with something that is not a known message
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The backend answered with valid JSON of an unexpected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Wire format violations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Empty frame")]
    EmptyFrame,

    #[error("Unknown Engine.IO packet type: {0:?}")]
    UnknownEnginePacket(char),

    #[error("Unknown Socket.IO packet type: {0:?}")]
    UnknownSocketPacket(char),

    /// Binary attachments are never sent by the backend
    #[error("Binary Socket.IO packets are not supported")]
    BinaryPacket,

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}
