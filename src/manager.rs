//! Connection manager
//!
//! Owns the single logical connection to the chat gateway. The public
//! `ConnectionManager` is a cheap cloneable handle; all state lives in a
//! background `Session` actor that processes commands, transport events and
//! the reconnect timer one at a time, so callbacks never run concurrently.
//!
//! # State machine
//! ```text
//! Disconnected -> Connecting -> Open -> Disconnected          (clean close)
//! Open -> Disconnected -> (interval) -> Connecting -> ...     (unclean close)
//! Connecting -> Disconnected                                  (handshake failure)
//! any -> Disconnected                                         (disconnect())
//! ```

use std::pin::Pin;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::callbacks::{Callbacks, Handler};
use crate::config::ClientConfig;
use crate::credentials::TokenStore;
use crate::endpoint::{build_endpoint, redacted, ConnectAs};
use crate::error::{ClientError, SendError};
use crate::message::{ClientMessage, ServerMessage};
use crate::transport::{CloseInfo, Connector, Link, LinkEvent, WsConnector, NORMAL_CLOSURE};
use crate::types::{ConnectionId, ConnectionState, RoomId};

/// Close reason sent on an explicit disconnect
const DISCONNECT_REASON: &str = "Client disconnect";

/// Commands sent from handles to the session actor
enum Command {
    /// Open the transport unless already connecting or open
    Connect {
        who: ConnectAs,
        ack: oneshot::Sender<()>,
    },
    /// Tear everything down and clear callbacks
    Disconnect { ack: oneshot::Sender<()> },
    /// Send one frame if open
    Send(ClientMessage),
    /// Fill a callback slot
    Register(Handler),
}

/// Snapshot published to handles for synchronous observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Status {
    state: ConnectionState,
    reconnect_attempts: u32,
}

/// Handle to the connection manager
///
/// Clones share one connection. Dropping the last handle shuts the session
/// down and closes the transport.
///
/// Callbacks are owned by the session, so a callback that captures a handle
/// keeps the session alive until `disconnect()` clears it. Callbacks that
/// need to talk back to the manager should capture a `WeakConnectionManager`
/// from `downgrade()` instead.
#[derive(Clone)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<Status>,
}

impl ConnectionManager {
    /// Create a manager that connects with tokio-tungstenite
    ///
    /// Must be called within a tokio runtime.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, WsConnector)
    }

    /// Create a manager over a custom transport connector
    pub fn with_connector<C: Connector>(config: ClientConfig, connector: C) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(Status::default());

        let session = Session::new(config, connector, cmd_rx, status_tx);
        tokio::spawn(session.run());

        Self {
            commands: cmd_tx,
            status: status_rx,
        }
    }

    /// Open the connection
    ///
    /// No-op while already connecting or open. Returns once the session has
    /// accepted the request, not when the transport is open; use `on_connect`
    /// or `wait_for_state` for that.
    pub async fn connect(&self, who: ConnectAs) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Connect { who, ack }).is_err() {
            warn!("Connect requested after the session shut down");
            return;
        }
        let _ = done.await;
    }

    /// Open the connection with the credential from `store`
    pub async fn connect_with(&self, store: &dyn TokenStore, is_guest: bool) {
        self.connect(ConnectAs::from_parts(store.token(), is_guest))
            .await;
    }

    /// Close the connection, cancel any pending reconnect and clear callbacks
    ///
    /// Safe to call in any state. On return the state is `Disconnected`.
    pub async fn disconnect(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Disconnect { ack }).is_err() {
            return;
        }
        let _ = done.await;
    }

    /// Ask to join a room, optionally as a named guest
    pub fn join_room(&self, room_id: RoomId, display_name: Option<&str>) -> Result<(), SendError> {
        self.send(ClientMessage::join_room(room_id, display_name))
    }

    /// Post a chat message
    pub fn send_chat_message(
        &self,
        room_id: RoomId,
        content: &str,
        display_name: Option<&str>,
    ) -> Result<(), SendError> {
        self.send(ClientMessage::send_message(room_id, content, display_name))
    }

    /// Publish a typing indicator change
    pub fn send_typing_state(
        &self,
        room_id: RoomId,
        is_typing: bool,
        display_name: Option<&str>,
    ) -> Result<(), SendError> {
        self.send(ClientMessage::typing(room_id, is_typing, display_name))
    }

    /// Send a frame if the connection is open
    ///
    /// Frames are never queued: while not open the frame is dropped and
    /// `SendError::NotOpen` is returned.
    pub fn send(&self, msg: ClientMessage) -> Result<(), SendError> {
        let state = self.state();
        if state != ConnectionState::Open {
            debug!("Dropping {} frame for room {}: connection {}", msg.kind(), msg.room_id(), state);
            return Err(SendError::NotOpen);
        }
        self.commands
            .send(Command::Send(msg))
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Weak handle that does not keep the session alive
    pub fn downgrade(&self) -> WeakConnectionManager {
        WeakConnectionManager {
            commands: self.commands.downgrade(),
            status: self.status.clone(),
        }
    }

    /// Set the handler for parsed inbound frames
    ///
    /// Like every `on_*` handler it lives in the session until replaced or
    /// cleared by `disconnect()`; capture a weak handle, not a clone.
    pub fn on_message(&self, f: impl FnMut(ServerMessage) + Send + 'static) {
        self.register(Handler::Message(Box::new(f)));
    }

    /// Set the handler for transport and handshake errors
    pub fn on_error(&self, f: impl FnMut(&ClientError) + Send + 'static) {
        self.register(Handler::Error(Box::new(f)));
    }

    /// Set the handler for a successful open
    ///
    /// The usual place to (re)join rooms. Send through a
    /// `WeakConnectionManager`: a captured `ConnectionManager` clone would
    /// keep the session running after every other handle is gone.
    pub fn on_connect(&self, f: impl FnMut() + Send + 'static) {
        self.register(Handler::Connect(Box::new(f)));
    }

    /// Set the handler for transport closure
    pub fn on_disconnect(&self, f: impl FnMut() + Send + 'static) {
        self.register(Handler::Disconnect(Box::new(f)));
    }

    /// Set the handler for an exhausted reconnect budget
    pub fn on_give_up(&self, f: impl FnMut(u32) + Send + 'static) {
        self.register(Handler::GiveUp(Box::new(f)));
    }

    fn register(&self, handler: Handler) {
        if self.commands.send(Command::Register(handler)).is_err() {
            warn!("Callback registered after the session shut down");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Numeric websocket ready-state (`CONNECTING=0 .. CLOSED=3`)
    pub fn ready_state(&self) -> u16 {
        self.state().ready_state()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Reconnect attempts made since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.status.borrow().reconnect_attempts
    }

    /// Wait until the connection reaches `state`
    ///
    /// Returns false if the session shut down first.
    pub async fn wait_for_state(&self, state: ConnectionState) -> bool {
        self.status.clone().wait_for(|s| s.state == state).await.is_ok()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = *self.status.borrow();
        f.debug_struct("ConnectionManager")
            .field("state", &status.state)
            .field("reconnect_attempts", &status.reconnect_attempts)
            .finish()
    }
}

/// Non-owning handle to the connection manager
///
/// Obtained from `ConnectionManager::downgrade`. Safe to capture in
/// callbacks without keeping the session alive.
#[derive(Clone)]
pub struct WeakConnectionManager {
    commands: mpsc::WeakUnboundedSender<Command>,
    status: watch::Receiver<Status>,
}

impl WeakConnectionManager {
    /// Strong handle, or `None` once every `ConnectionManager` is dropped
    pub fn upgrade(&self) -> Option<ConnectionManager> {
        let commands = self.commands.upgrade()?;
        Some(ConnectionManager {
            commands,
            status: self.status.clone(),
        })
    }
}

impl std::fmt::Debug for WeakConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakConnectionManager")
            .field("state", &self.status.borrow().state)
            .finish()
    }
}

/// The session actor
///
/// Single owner of the transport, the callbacks and the reconnect timer.
struct Session<C> {
    config: ClientConfig,
    connector: C,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<Status>,
    state: ConnectionState,
    callbacks: Callbacks,
    /// Address of the last explicit connect, reused by reconnects
    target: Option<Url>,
    conn_id: ConnectionId,
    /// Handshake in flight
    pending: Option<JoinHandle<Result<Link, ClientError>>>,
    /// Open transport
    link: Option<Link>,
    reconnect_attempts: u32,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
}

impl<C: Connector> Session<C> {
    fn new(
        config: ClientConfig,
        connector: C,
        commands: mpsc::UnboundedReceiver<Command>,
        status: watch::Sender<Status>,
    ) -> Self {
        Self {
            config,
            connector,
            commands,
            status,
            state: ConnectionState::Disconnected,
            callbacks: Callbacks::default(),
            target: None,
            conn_id: ConnectionId::new(),
            pending: None,
            link: None,
            reconnect_attempts: 0,
            reconnect_timer: None,
        }
    }

    /// Run the session event loop
    ///
    /// Continuously processes commands and transport events until all
    /// handles are dropped.
    async fn run(mut self) {
        debug!("Connection session started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                result = handshake(&mut self.pending) => {
                    self.pending = None;
                    self.handle_handshake(result);
                }
                event = next_event(&mut self.link) => {
                    self.handle_link_event(event);
                }
                () = reconnect_due(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    self.handle_reconnect_due();
                }
            }
        }

        self.teardown();
        debug!("Connection session shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { who, ack } => {
                self.handle_connect(who);
                let _ = ack.send(());
            }
            Command::Disconnect { ack } => {
                self.handle_disconnect();
                let _ = ack.send(());
            }
            Command::Send(msg) => self.handle_send(msg),
            Command::Register(handler) => {
                debug!("Registered {:?}", handler);
                self.callbacks.register(handler);
            }
        }
    }

    /// Handle an explicit connect request
    fn handle_connect(&mut self, who: ConnectAs) {
        if self.state.is_active() {
            debug!("Connect ignored: connection already {}", self.state);
            return;
        }

        self.cancel_reconnect();
        self.reconnect_attempts = 0;

        match build_endpoint(&self.config.endpoint, &who) {
            Ok(url) => {
                self.target = Some(url.clone());
                self.start_handshake(url);
            }
            Err(e) => {
                error!("Cannot build gateway address: {}", e);
                self.set_state(ConnectionState::Disconnected);
                self.callbacks.error(&e);
            }
        }
    }

    /// Handle an explicit disconnect request
    fn handle_disconnect(&mut self) {
        self.cancel_reconnect();

        if let Some(task) = self.pending.take() {
            debug!("[{}] Cancelling pending handshake", self.conn_id);
            task.abort();
        }

        if let Some(link) = self.link.take() {
            self.set_state(ConnectionState::Closing);
            link.close(NORMAL_CLOSURE, DISCONNECT_REASON);
        }

        self.callbacks.clear();
        self.reconnect_attempts = 0;
        self.set_state(ConnectionState::Disconnected);
        info!("[{}] Disconnected by client", self.conn_id);
    }

    /// Handle an outbound frame
    fn handle_send(&mut self, msg: ClientMessage) {
        let Some(link) = self.link.as_ref().filter(|_| self.state == ConnectionState::Open) else {
            debug!("Dropping {} frame: connection {}", msg.kind(), self.state);
            return;
        };

        match serde_json::to_string(&msg) {
            Ok(json) => {
                debug!("[{}] -> {}", self.conn_id, json);
                if !link.send_text(json) {
                    debug!("[{}] Transport gone, frame dropped", self.conn_id);
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
            }
        }
    }

    /// Handle the outcome of a handshake
    fn handle_handshake(&mut self, result: Result<Link, ClientError>) {
        match result {
            Ok(link) => {
                info!("[{}] WebSocket connected", self.conn_id);
                self.link = Some(link);
                self.reconnect_attempts = 0;
                self.set_state(ConnectionState::Open);
                self.callbacks.connect();
            }
            Err(e) => {
                error!("[{}] WebSocket handshake failed: {}", self.conn_id, e);
                self.set_state(ConnectionState::Disconnected);
                self.callbacks.error(&e);
                self.callbacks.disconnect();
                self.schedule_reconnect();
            }
        }
    }

    /// Handle an event from the open transport
    fn handle_link_event(&mut self, event: Option<LinkEvent>) {
        match event {
            Some(LinkEvent::Frame(text)) => self.dispatch(&text),
            Some(LinkEvent::Error(e)) => {
                error!("[{}] WebSocket error: {}", self.conn_id, e);
                self.callbacks.error(&e);
            }
            Some(LinkEvent::Closed(close)) => self.handle_closed(close),
            None => self.handle_closed(CloseInfo::abnormal()),
        }
    }

    /// Parse and deliver one inbound frame; malformed frames are dropped
    fn dispatch(&mut self, text: &str) {
        match ServerMessage::parse(text) {
            Ok(msg) => {
                debug!("[{}] <- {:?}", self.conn_id, msg);
                self.callbacks.message(msg);
            }
            Err(e) => {
                warn!("[{}] Error parsing WebSocket message: {}", self.conn_id, e);
            }
        }
    }

    /// Handle transport closure
    fn handle_closed(&mut self, close: CloseInfo) {
        self.link = None;
        info!(
            "[{}] WebSocket disconnected: {} {}",
            self.conn_id, close.code, close.reason
        );
        self.set_state(ConnectionState::Disconnected);
        self.callbacks.disconnect();

        if !close.clean {
            self.schedule_reconnect();
        }
    }

    /// Arm the reconnect timer, or give up once the budget is spent
    fn schedule_reconnect(&mut self) {
        if self.target.is_none() {
            return;
        }

        let max = self.config.max_reconnect_attempts;
        if self.reconnect_attempts >= max {
            warn!("Giving up after {} reconnect attempts", self.reconnect_attempts);
            self.callbacks.give_up(self.reconnect_attempts);
            return;
        }

        self.reconnect_attempts += 1;
        info!(
            "Attempting to reconnect ({}/{}) in {:?}",
            self.reconnect_attempts, max, self.config.reconnect_interval
        );
        self.reconnect_timer = Some(Box::pin(tokio::time::sleep(self.config.reconnect_interval)));
        self.publish();
    }

    /// Reconnect timer fired
    fn handle_reconnect_due(&mut self) {
        if self.state.is_active() {
            return;
        }
        if let Some(url) = self.target.clone() {
            self.start_handshake(url);
        }
    }

    fn start_handshake(&mut self, url: Url) {
        self.conn_id = ConnectionId::new();
        info!("[{}] Connecting to {}", self.conn_id, redacted(&url));

        self.set_state(ConnectionState::Connecting);
        let attempt = self.connector.connect(url);
        self.pending = Some(tokio::spawn(attempt));
    }

    fn cancel_reconnect(&mut self) {
        if self.reconnect_timer.take().is_some() {
            debug!("Pending reconnect cancelled");
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("[{}] State {} -> {}", self.conn_id, self.state, state);
        }
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        let next = Status {
            state: self.state,
            reconnect_attempts: self.reconnect_attempts,
        };
        self.status.send_if_modified(|status| {
            let changed = *status != next;
            *status = next;
            changed
        });
    }

    /// Last handle dropped
    fn teardown(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        if let Some(link) = self.link.take() {
            link.close(NORMAL_CLOSURE, DISCONNECT_REASON);
        }
        self.reconnect_timer = None;
        self.state = ConnectionState::Disconnected;
        self.publish();
    }
}

/// Resolves when the pending handshake finishes; never if there is none
async fn handshake(pending: &mut Option<JoinHandle<Result<Link, ClientError>>>) -> Result<Link, ClientError> {
    match pending {
        Some(task) => match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Handshake task failed: {}", e);
                Err(ClientError::TransportClosed)
            }
        },
        None => std::future::pending().await,
    }
}

/// Next event from the open transport; never resolves without one
async fn next_event(link: &mut Option<Link>) -> Option<LinkEvent> {
    match link {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}

/// Resolves when the reconnect timer elapses; never if none is armed
async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
