//! Error types for the chat client
//!
//! Defines connection-level errors and outbound send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Connection-level errors
///
/// Delivered to the `on_error` callback; never returned from send operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket protocol or handshake error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Gateway endpoint could not be parsed
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Gateway endpoint is not a ws:// or wss:// address
    #[error("Unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),

    /// Transport went away before the handshake completed
    #[error("Transport closed")]
    TransportClosed,
}

/// Outbound send errors
///
/// Frames are never queued: a send while the socket is not open is dropped
/// and reported here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The connection is not in the open state
    #[error("Connection not open")]
    NotOpen,

    /// The manager task has shut down
    #[error("Channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_error_from_parse() {
        let err: ClientError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, ClientError::InvalidEndpoint(_)));
        assert!(err.to_string().starts_with("Invalid endpoint"));
    }

    #[test]
    fn test_send_error_display() {
        assert_eq!(SendError::NotOpen.to_string(), "Connection not open");
    }
}
