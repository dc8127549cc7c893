//! Basic type definitions for the chat client
//!
//! Provides newtype wrappers and the explicit connection state:
//! - `RoomId`: integer room identifier assigned by the backend
//! - `ConnectionId`: UUID-based tag for one transport attempt
//! - `ConnectionState`: lifecycle of the managed connection

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chat room identifier (newtype pattern)
///
/// Serialized as a bare JSON integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl From<i64> for RoomId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for RoomId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single transport attempt
///
/// A fresh one is minted for every connect or reconnect so log lines from
/// different attempts can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport, no handshake in flight
    #[default]
    Disconnected,
    /// Handshake in flight
    Connecting,
    /// Transport open, frames may be sent
    Open,
    /// Close frame sent, transport being torn down
    Closing,
}

impl ConnectionState {
    /// Numeric websocket ready-state code for this state
    ///
    /// `CONNECTING = 0`, `OPEN = 1`, `CLOSING = 2`, `CLOSED = 3`.
    pub fn ready_state(self) -> u16 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Open => 1,
            ConnectionState::Closing => 2,
            ConnectionState::Disconnected => 3,
        }
    }

    /// True while a handshake is pending or the transport is open
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        };
        f.write_str(name)
    }
}
