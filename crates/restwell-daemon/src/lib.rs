//! Restwell Daemon Library
//!
//! Break timers and focus/break sessions, exposed as a library for testing.

pub mod alerts;
pub mod config;
pub mod driver;
pub mod event_manager;
pub mod events;
pub mod session;
pub mod timer;

pub use alerts::{Alerts, BellPlayer, DesktopNotifier, NotificationPermission};
pub use config::ConfigManager;
pub use driver::Driver;
pub use event_manager::EventManager;
pub use events::{DaemonEvent, Toast, ToastLevel};
pub use session::{MemorySessionStore, RestSessionStore, SessionManager, SessionStore};
pub use timer::{TimerEngine, TimerEvent};
