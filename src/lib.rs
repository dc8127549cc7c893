//! Reconnecting WebSocket Chat Client Library
//!
//! Client-side connection manager for a chat gateway, built with
//! tokio-tungstenite using the Actor pattern for state management.
//!
//! # Features
//! - Single managed connection with idempotent connect
//! - Token or guest authentication on the handshake URL
//! - Fixed-interval reconnect with a bounded attempt budget
//! - Typed JSON frames for joining rooms, chatting and typing indicators
//! - Single-slot callbacks for messages, errors, connect and disconnect
//! - Debounced typing indicator
//!
//! # Architecture
//! `ConnectionManager` is a cloneable handle; a background session task owns
//! the transport, the callbacks and the reconnect timer and processes
//! everything through one event loop:
//! - Handles send commands over an `mpsc` channel
//! - State is published through a `watch` channel for synchronous observers
//! - The transport is reached through the `Connector` trait
//!
//! # Example
//! ```ignore
//! use chat_client_v1::{ClientConfig, ConnectAs, ConnectionManager, RoomId};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = ConnectionManager::new(ClientConfig::default());
//!     manager.on_message(|msg| println!("{:?}", msg));
//!     manager.connect(ConnectAs::Guest).await;
//!
//!     manager.wait_for_state(chat_client_v1::ConnectionState::Open).await;
//!     let _ = manager.join_room(RoomId(1), Some("Fox"));
//! }
//! ```

pub mod callbacks;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod manager;
pub mod message;
pub mod models;
pub mod transport;
pub mod types;
pub mod typing;

// Re-export main types for convenience
pub use callbacks::{Callbacks, Handler};
pub use config::ClientConfig;
pub use credentials::{EnvTokenStore, MemoryTokenStore, TokenStore};
pub use endpoint::{build_endpoint, ConnectAs};
pub use error::{ClientError, SendError};
pub use manager::{ConnectionManager, WeakConnectionManager};
pub use message::{ClientMessage, ServerMessage};
pub use models::{ApiResponse, ChatMessage, ChatRoom, RoomType, User};
pub use transport::{Connector, Link, LinkEvent, WsConnector};
pub use types::{ConnectionId, ConnectionState, RoomId};
pub use typing::TypingNotifier;
