//! Client configuration
//!
//! Compiled defaults, builder-style overrides, and an environment loader for
//! the binary.

use std::env;
use std::time::Duration;

/// Default gateway endpoint
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8001/ws";

/// Delay before each reconnect attempt
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);

/// Consecutive reconnect attempts before giving up
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Idle time after the last keystroke before "stopped typing" is sent
pub const DEFAULT_TYPING_IDLE: Duration = Duration::from_millis(1000);

/// Connection manager configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Gateway address without query parameters
    pub endpoint: String,
    /// Fixed delay between an unclean closure and the next attempt
    pub reconnect_interval: Duration,
    /// Reconnect budget; the counter resets on every successful open
    pub max_reconnect_attempts: u32,
    /// Idle time used by `TypingNotifier`
    pub typing_idle: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            typing_idle: DEFAULT_TYPING_IDLE,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given endpoint with default timings
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Build configuration from environment variables
    ///
    /// - `CHAT_WS_URL`: gateway endpoint
    /// - `CHAT_RECONNECT_INTERVAL_MS`: reconnect delay in milliseconds
    /// - `CHAT_MAX_RECONNECT_ATTEMPTS`: reconnect budget
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("CHAT_WS_URL").filter(|v| !v.trim().is_empty()) {
            config.endpoint = endpoint.trim().to_string();
        }
        if let Some(ms) = lookup("CHAT_RECONNECT_INTERVAL_MS").and_then(|v| v.trim().parse().ok()) {
            config.reconnect_interval = Duration::from_millis(ms);
        }
        if let Some(max) = lookup("CHAT_MAX_RECONNECT_ATTEMPTS").and_then(|v| v.trim().parse().ok()) {
            config.max_reconnect_attempts = max;
        }

        config
    }

    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, max: u32) -> Self {
        self.max_reconnect_attempts = max;
        self
    }

    #[must_use]
    pub fn with_typing_idle(mut self, idle: Duration) -> Self {
        self.typing_idle = idle;
        self
    }
}
