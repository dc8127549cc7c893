//! Callback slots
//!
//! One handler per event class. Registering a handler replaces whatever was
//! in the slot before; there is no fan-out to multiple subscribers.

use crate::error::ClientError;
use crate::message::ServerMessage;

pub type MessageHandler = Box<dyn FnMut(ServerMessage) + Send>;
pub type ErrorHandler = Box<dyn FnMut(&ClientError) + Send>;
pub type ConnectHandler = Box<dyn FnMut() + Send>;
pub type DisconnectHandler = Box<dyn FnMut() + Send>;
pub type GiveUpHandler = Box<dyn FnMut(u32) + Send>;

/// A handler for one event class
pub enum Handler {
    /// Parsed inbound frame
    Message(MessageHandler),
    /// Transport or handshake error
    Error(ErrorHandler),
    /// Transport opened
    Connect(ConnectHandler),
    /// Transport closed (not fired for a local `disconnect`)
    Disconnect(DisconnectHandler),
    /// Reconnect budget exhausted; receives the attempt count
    GiveUp(GiveUpHandler),
}

impl Handler {
    fn slot_name(&self) -> &'static str {
        match self {
            Handler::Message(_) => "on_message",
            Handler::Error(_) => "on_error",
            Handler::Connect(_) => "on_connect",
            Handler::Disconnect(_) => "on_disconnect",
            Handler::GiveUp(_) => "on_give_up",
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handler({})", self.slot_name())
    }
}

/// Registered handlers, at most one per event class
#[derive(Default)]
pub struct Callbacks {
    on_message: Option<MessageHandler>,
    on_error: Option<ErrorHandler>,
    on_connect: Option<ConnectHandler>,
    on_disconnect: Option<DisconnectHandler>,
    on_give_up: Option<GiveUpHandler>,
}

impl Callbacks {
    /// Store a handler, overwriting the previous one of the same class
    pub fn register(&mut self, handler: Handler) {
        match handler {
            Handler::Message(f) => self.on_message = Some(f),
            Handler::Error(f) => self.on_error = Some(f),
            Handler::Connect(f) => self.on_connect = Some(f),
            Handler::Disconnect(f) => self.on_disconnect = Some(f),
            Handler::GiveUp(f) => self.on_give_up = Some(f),
        }
    }

    /// Drop every registered handler
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn message(&mut self, msg: ServerMessage) {
        if let Some(f) = self.on_message.as_mut() {
            f(msg);
        }
    }

    pub fn error(&mut self, err: &ClientError) {
        if let Some(f) = self.on_error.as_mut() {
            f(err);
        }
    }

    pub fn connect(&mut self) {
        if let Some(f) = self.on_connect.as_mut() {
            f();
        }
    }

    pub fn disconnect(&mut self) {
        if let Some(f) = self.on_disconnect.as_mut() {
            f();
        }
    }

    pub fn give_up(&mut self, attempts: u32) {
        if let Some(f) = self.on_give_up.as_mut() {
            f(attempts);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_give_up", &self.on_give_up.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_last_registration_wins() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut callbacks = Callbacks::default();

        let first = Arc::clone(&seen);
        callbacks.register(Handler::Connect(Box::new(move || first.lock().unwrap().push("first"))));
        let second = Arc::clone(&seen);
        callbacks.register(Handler::Connect(Box::new(move || second.lock().unwrap().push("second"))));

        callbacks.connect();
        assert_eq!(*seen.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn test_clear_removes_all() {
        let mut callbacks = Callbacks::default();
        callbacks.register(Handler::Disconnect(Box::new(|| panic!("cleared handler ran"))));
        callbacks.register(Handler::GiveUp(Box::new(|_| panic!("cleared handler ran"))));

        callbacks.clear();
        callbacks.disconnect();
        callbacks.give_up(5);
    }

    #[test]
    fn test_dispatch_without_handler_is_noop() {
        let mut callbacks = Callbacks::default();
        callbacks.message(ServerMessage::Error {
            error: "x".to_string(),
        });
        callbacks.error(&ClientError::TransportClosed);
    }

    #[test]
    fn test_message_handler_receives_payload() {
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let mut callbacks = Callbacks::default();
        callbacks.register(Handler::Message(Box::new(move |msg| {
            *slot.lock().unwrap() = Some(msg);
        })));

        let msg = ServerMessage::UserJoined {
            user_name: "bob".to_string(),
            chat_room_id: None,
        };
        callbacks.message(msg.clone());
        assert_eq!(seen.lock().unwrap().as_ref(), Some(&msg));
    }
}
