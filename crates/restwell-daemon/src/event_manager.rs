//! Central event management and broadcasting

use tokio::sync::broadcast;

use crate::events::{DaemonEvent, Toast, ToastLevel};
use crate::session::SessionEvent;
use crate::timer::TimerEvent;

/// Event channel handed to every engine at construction.
pub struct EventManager {
    event_tx: broadcast::Sender<DaemonEvent>,
}

impl EventManager {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1000);
        Self { event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.event_tx.subscribe()
    }

    pub fn emit_timer(&self, event: TimerEvent) {
        let _ = self.event_tx.send(DaemonEvent::Timer(event));
    }

    pub fn emit_session(&self, event: SessionEvent) {
        let _ = self.event_tx.send(DaemonEvent::Session(event));
    }

    pub fn toast(&self, level: ToastLevel, title: &str, message: &str) {
        tracing::debug!("toast [{:?}] {}: {}", level, title, message);
        let _ = self
            .event_tx
            .send(DaemonEvent::Toast(Toast::new(level, title, message)));
    }

    pub fn info(&self, title: &str, message: &str) {
        self.toast(ToastLevel::Info, title, message);
    }

    pub fn success(&self, title: &str, message: &str) {
        self.toast(ToastLevel::Success, title, message);
    }

    pub fn warning(&self, title: &str, message: &str) {
        self.toast(ToastLevel::Warning, title, message);
    }

    pub fn error(&self, title: &str, message: &str) {
        self.toast(ToastLevel::Error, title, message);
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let manager = EventManager::new();
        manager.info("nobody", "is listening");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let manager = EventManager::new();
        let mut receiver1 = manager.subscribe();
        let mut receiver2 = manager.subscribe();

        manager.warning("Sign in required", "Sign in to start a session");

        for received in [receiver1.recv().await.unwrap(), receiver2.recv().await.unwrap()] {
            match received {
                DaemonEvent::Toast(toast) => assert_eq!(toast.level, ToastLevel::Warning),
                other => panic!("Expected toast, got {:?}", other),
            }
        }
    }
}
