//! Completion side effects: alert sounds and OS notifications.
//!
//! Both capabilities are best-effort. Implementations log their own failures
//! and never hand them back to the engines.

use restwell_core::models::AlertSound;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    /// Never asked.
    Default,
    Granted,
    Denied,
}

pub trait AlertPlayer: Send + Sync {
    fn play(&self, sound: AlertSound);
}

pub trait Notifier: Send + Sync {
    fn permission(&self) -> NotificationPermission;
    fn request_permission(&self) -> NotificationPermission;
    fn notify(&self, title: &str, body: &str);
}

/// The pair of capabilities injected into each engine.
#[derive(Clone)]
pub struct Alerts {
    pub player: Arc<dyn AlertPlayer>,
    pub notifier: Arc<dyn Notifier>,
}

impl Alerts {
    pub fn new(player: Arc<dyn AlertPlayer>, notifier: Arc<dyn Notifier>) -> Self {
        Self { player, notifier }
    }

    /// Show an OS notification if the user allowed it; otherwise do nothing.
    pub fn notify_if_permitted(&self, title: &str, body: &str) {
        match self.notifier.permission() {
            NotificationPermission::Granted => self.notifier.notify(title, body),
            permission => tracing::debug!("Skipping notification ({:?}): {}", permission, title),
        }
    }
}

/// Rings the terminal bell.
#[derive(Debug, Default)]
pub struct BellPlayer;

impl AlertPlayer for BellPlayer {
    fn play(&self, sound: AlertSound) {
        use std::io::Write;

        tracing::debug!("Playing alert '{}' as terminal bell", sound);
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout.write_all(b"\x07").and_then(|_| stdout.flush()) {
            tracing::warn!("Failed to ring bell: {}", e);
        }
    }
}

/// Decodes and plays sound assets from disk on a short-lived audio thread.
#[cfg(feature = "audio")]
#[derive(Debug)]
pub struct RodioPlayer {
    sounds_dir: PathBuf,
}

#[cfg(feature = "audio")]
impl RodioPlayer {
    pub fn new(sounds_dir: PathBuf) -> Self {
        Self { sounds_dir }
    }

    fn play_file(path: &std::path::Path) -> Result<(), String> {
        let (_stream, handle) = rodio::OutputStream::try_default().map_err(|e| e.to_string())?;
        let sink = rodio::Sink::try_new(&handle).map_err(|e| e.to_string())?;
        let file = std::fs::File::open(path).map_err(|e| e.to_string())?;
        let source =
            rodio::Decoder::new(std::io::BufReader::new(file)).map_err(|e| e.to_string())?;
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}

#[cfg(feature = "audio")]
impl AlertPlayer for RodioPlayer {
    fn play(&self, sound: AlertSound) {
        let path = sound_path(&self.sounds_dir, sound);
        let spawned = std::thread::Builder::new()
            .name("alert-sound".to_string())
            .spawn(move || {
                if let Err(e) = Self::play_file(&path) {
                    tracing::warn!("Failed to play {}: {}", path.display(), e);
                }
            });
        if let Err(e) = spawned {
            tracing::warn!("Failed to spawn audio thread: {}", e);
        }
    }
}

pub fn sound_path(sounds_dir: &std::path::Path, sound: AlertSound) -> PathBuf {
    sounds_dir.join(sound.asset_path())
}

/// Desktop notifications through the platform notification service.
#[derive(Debug)]
pub struct DesktopNotifier {
    enabled: bool,
    permission: AtomicU8,
}

impl DesktopNotifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            permission: AtomicU8::new(encode(NotificationPermission::Default)),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn permission(&self) -> NotificationPermission {
        decode(self.permission.load(Ordering::Acquire))
    }

    fn request_permission(&self) -> NotificationPermission {
        let granted = if self.enabled {
            NotificationPermission::Granted
        } else {
            NotificationPermission::Denied
        };
        self.permission.store(encode(granted), Ordering::Release);
        granted
    }

    fn notify(&self, title: &str, body: &str) {
        let notification = notify_rust::Notification::new()
            .appname("restwell")
            .summary(title)
            .body(body)
            .icon("alarm-clock")
            .timeout(notify_rust::Timeout::Milliseconds(5000))
            .finalize();

        run_blocking(move || {
            if let Err(e) = notification.show() {
                tracing::error!("Failed to send notification: {}", e);
            }
        });
    }
}

/// Run `task` on the blocking pool when called inside a runtime, inline
/// otherwise.
fn run_blocking(task: impl FnOnce() + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(task);
        }
        Err(_) => task(),
    }
}

fn encode(permission: NotificationPermission) -> u8 {
    match permission {
        NotificationPermission::Default => 0,
        NotificationPermission::Granted => 1,
        NotificationPermission::Denied => 2,
    }
}

fn decode(value: u8) -> NotificationPermission {
    match value {
        1 => NotificationPermission::Granted,
        2 => NotificationPermission::Denied,
        _ => NotificationPermission::Default,
    }
}

/// Test double that records every sound and notification.
#[derive(Clone)]
pub struct RecordingAlerts {
    pub sounds: Arc<Mutex<Vec<AlertSound>>>,
    pub notifications: Arc<Mutex<Vec<(String, String)>>>,
    permission: Arc<Mutex<NotificationPermission>>,
}

impl RecordingAlerts {
    /// Starts with notification permission already granted.
    pub fn new() -> Self {
        Self {
            sounds: Arc::new(Mutex::new(Vec::new())),
            notifications: Arc::new(Mutex::new(Vec::new())),
            permission: Arc::new(Mutex::new(NotificationPermission::Granted)),
        }
    }

    pub fn deny_notifications(&self) {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner()) =
            NotificationPermission::Denied;
    }

    pub fn alerts(&self) -> Alerts {
        Alerts::new(Arc::new(self.clone()), Arc::new(self.clone()))
    }

    pub fn sound_count(&self) -> usize {
        self.sounds.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for RecordingAlerts {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertPlayer for RecordingAlerts {
    fn play(&self, sound: AlertSound) {
        self.sounds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sound);
    }
}

impl Notifier for RecordingAlerts {
    fn permission(&self) -> NotificationPermission {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn request_permission(&self) -> NotificationPermission {
        self.permission()
    }

    fn notify(&self, title: &str, body: &str) {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((title.to_string(), body.to_string()));
    }
}
