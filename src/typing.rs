//! Typing indicator debouncing
//!
//! Every keystroke announces "typing"; once input has been idle for the
//! configured period a single "stopped typing" follows.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::manager::ConnectionManager;
use crate::types::RoomId;

/// Sends typing state for one room on behalf of the local user
#[derive(Debug)]
pub struct TypingNotifier {
    manager: ConnectionManager,
    room_id: RoomId,
    display_name: Option<String>,
    idle: Duration,
    stop_timer: Option<JoinHandle<()>>,
}

impl TypingNotifier {
    pub fn new(
        manager: ConnectionManager,
        room_id: RoomId,
        display_name: Option<String>,
        idle: Duration,
    ) -> Self {
        Self {
            manager,
            room_id,
            display_name,
            idle,
            stop_timer: None,
        }
    }

    /// Input changed: announce typing and restart the idle timer
    pub fn keystroke(&mut self) {
        let _ = self
            .manager
            .send_typing_state(self.room_id, true, self.display_name.as_deref());

        if let Some(timer) = self.stop_timer.take() {
            timer.abort();
        }

        let manager = self.manager.clone();
        let room_id = self.room_id;
        let display_name = self.display_name.clone();
        let idle = self.idle;
        self.stop_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            debug!("Typing idle in room {}", room_id);
            let _ = manager.send_typing_state(room_id, false, display_name.as_deref());
        }));
    }

    /// Announce "stopped typing" now if a stop is still pending
    pub fn stop(&mut self) {
        if let Some(timer) = self.stop_timer.take() {
            timer.abort();
            let _ = self
                .manager
                .send_typing_state(self.room_id, false, self.display_name.as_deref());
        }
    }

    /// True while a "stopped typing" is pending
    pub fn is_typing(&self) -> bool {
        self.stop_timer.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for TypingNotifier {
    fn drop(&mut self) {
        if let Some(timer) = self.stop_timer.take() {
            timer.abort();
        }
    }
}
