//! Terminal Chat Client - Entry Point
//!
//! Connects to the gateway, joins one room and relays stdin lines as chat
//! messages.
//!
//! Usage: `chat_client_v1 [room_id] [display_name]`
//! - Passing a display name connects in guest mode
//! - `CHAT_TOKEN` supplies the bearer credential otherwise
//! - `CHAT_WS_URL` overrides the gateway address

use std::env;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chat_client_v1::{ClientConfig, ConnectionManager, EnvTokenStore, RoomId, ServerMessage};

/// Room joined when none is given
const DEFAULT_ROOM: RoomId = RoomId(1);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_client_v1=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_client_v1=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let room_id = match args.next() {
        Some(arg) => arg.parse::<RoomId>()?,
        None => DEFAULT_ROOM,
    };
    let display_name = args.next().filter(|name| !name.trim().is_empty());
    let is_guest = display_name.is_some();

    let config = ClientConfig::from_env();
    info!("Using gateway {}", config.endpoint);
    let manager = ConnectionManager::new(config);

    // Rejoin on every open so reconnects land back in the room
    let joiner = manager.downgrade();
    let join_name = display_name.clone();
    manager.on_connect(move || {
        info!("Connected, joining room {}", room_id);
        let Some(manager) = joiner.upgrade() else {
            return;
        };
        if let Err(e) = manager.join_room(room_id, join_name.as_deref()) {
            warn!("Join request dropped: {}", e);
        }
    });

    manager.on_message(|msg| match &msg {
        ServerMessage::NewMessage { message } => {
            let at = message.timestamp.as_deref().unwrap_or("-");
            println!("[{}] {}: {}", at, message.author(), message.content);
        }
        ServerMessage::UserTyping { is_typing, .. } => {
            if *is_typing {
                println!("* {} is typing...", msg.typist().unwrap_or("Someone"));
            }
        }
        ServerMessage::UserJoined { user_name, .. } => {
            println!("* {} joined", user_name);
        }
        ServerMessage::ConnectionEstablished { message } => {
            info!("{}", message.as_deref().unwrap_or("Connection established"));
        }
        ServerMessage::Error { error } => {
            eprintln!("! {}", error);
        }
    });

    manager.on_error(|e| {
        error!("WebSocket error: {}", e);
        eprintln!("Connection error. Waiting for reconnect...");
    });

    manager.on_disconnect(|| {
        warn!("Disconnected from gateway");
    });

    manager.on_give_up(|attempts| {
        eprintln!("Could not reconnect after {} attempts. Type /quit to exit.", attempts);
    });

    manager.connect_with(&EnvTokenStore::default(), is_guest).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" {
                    break;
                }
                if manager
                    .send_chat_message(room_id, line, display_name.as_deref())
                    .is_err()
                {
                    eprintln!("Not connected, message not sent");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    manager.disconnect().await;
    info!("Bye");

    Ok(())
}
