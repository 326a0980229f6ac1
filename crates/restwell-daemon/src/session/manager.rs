//! Session manager - async shell around the session machine

use chrono::Utc;
use restwell_core::models::{
    ActiveSession, NewSessionRecord, SessionConfig, SessionKind, SessionOutcome, SessionRecord,
    SessionSummary,
};
use restwell_core::scheduler::Clock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::events::{SessionEvent, SessionEventType};
use super::machine::{Result, SessionError, SessionMachine};
use super::store::SessionStore;
use crate::alerts::{Alerts, NotificationPermission};
use crate::event_manager::EventManager;

/// Writes terminal records and keeps the local history in step with the
/// writes that succeeded.
#[derive(Clone)]
struct Persistence {
    store: Arc<dyn SessionStore>,
    events: Arc<EventManager>,
    history: Arc<RwLock<Vec<SessionRecord>>>,
}

impl Persistence {
    /// One attempt, no retry. On failure the record is dropped.
    async fn save(&self, record: NewSessionRecord, history_limit: usize) -> Option<SessionRecord> {
        let kind = record.kind;

        match self.store.insert(&record).await {
            Ok(row) => {
                tracing::info!(
                    "Saved {} session {} ({}s, {})",
                    kind.as_str(),
                    row.id,
                    row.record.elapsed_seconds,
                    row.record.outcome.as_str()
                );
                {
                    let mut history = self.history.write().await;
                    history.insert(0, row.clone());
                    history.truncate(history_limit);
                }
                self.events.emit_session(SessionEvent::new(
                    SessionEventType::Saved {
                        record_id: row.id.clone(),
                    },
                    kind,
                ));
                Some(row)
            }
            Err(e) => {
                tracing::error!("Failed to save {} session: {}", kind.as_str(), e);
                self.events.emit_session(SessionEvent::new(
                    SessionEventType::SaveFailed {
                        error: e.to_string(),
                    },
                    kind,
                ));
                self.events
                    .error("Save Failed", "Your session could not be saved.");
                None
            }
        }
    }
}

/// Owns the single focus/break session and its side effects.
pub struct SessionManager {
    machine: Mutex<SessionMachine>,
    config: RwLock<SessionConfig>,
    persistence: Persistence,
    alerts: Alerts,
    pending: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn SessionStore>,
        events: Arc<EventManager>,
        alerts: Alerts,
        config: SessionConfig,
    ) -> Self {
        Self {
            machine: Mutex::new(SessionMachine::new(clock)),
            config: RwLock::new(config),
            persistence: Persistence {
                store,
                events,
                history: Arc::new(RwLock::new(Vec::new())),
            },
            alerts,
            pending: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> &EventManager {
        &self.persistence.events
    }

    pub async fn set_owner(&self, owner_id: Option<String>) {
        self.machine.lock().await.set_owner(owner_id);
    }

    pub async fn owner(&self) -> Option<String> {
        self.machine.lock().await.owner().map(str::to_string)
    }

    pub async fn update_config(&self, config: SessionConfig) {
        *self.config.write().await = config;
    }

    pub fn request_notification_permission(&self) -> NotificationPermission {
        self.alerts.notifier.request_permission()
    }

    pub async fn start_focus_session(
        &self,
        duration_seconds: Option<u64>,
        task_id: Option<String>,
    ) -> Result<bool> {
        self.start_session(SessionKind::Focus, duration_seconds, task_id)
            .await
    }

    pub async fn start_break_session(&self, duration_seconds: Option<u64>) -> Result<bool> {
        self.start_session(SessionKind::Break, duration_seconds, None)
            .await
    }

    /// Returns `Ok(false)` when nobody is signed in; the user gets a warning
    /// and nothing changes.
    ///
    /// An active session is ended as interrupted and its write issued in the
    /// same critical section that installs the new one. The write itself runs
    /// in the background, so ticks never wait on the store.
    async fn start_session(
        &self,
        kind: SessionKind,
        duration_seconds: Option<u64>,
        task_id: Option<String>,
    ) -> Result<bool> {
        let config = self.config.read().await.clone();
        let mut machine = self.machine.lock().await;
        if machine.owner().is_none() {
            tracing::warn!("Refusing to start {} session without an owner", kind.as_str());
            self.events()
                .warning("Sign In Required", "Please sign in to start a session.");
            return Ok(false);
        }

        let duration = duration_seconds.unwrap_or(match kind {
            SessionKind::Focus => config.focus_duration,
            SessionKind::Break => config.break_duration,
        });
        if duration == 0 {
            return Err(SessionError::InvalidDuration);
        }

        if let Some(previous) = machine.start(kind, duration, task_id)? {
            self.emit_ended(&previous);
            self.spawn_save(previous, config.history_limit);
        }
        let Some(session) = machine.active() else {
            return Ok(false);
        };

        tracing::info!("{} session started ({}s)", kind.as_str(), duration);
        self.events().emit_session(SessionEvent::new(
            SessionEventType::Started {
                planned_duration_seconds: duration,
                task_id: session.task_id.clone(),
            },
            kind,
        ));
        self.events().info(
            &format!("{} Session Started", kind.as_str()),
            &format!("{} minutes on the clock.", duration / 60),
        );
        Ok(true)
    }

    pub async fn pause_session(&self) -> bool {
        let mut machine = self.machine.lock().await;
        let Some(session) = machine.pause() else {
            return false;
        };

        self.events().emit_session(SessionEvent::new(
            SessionEventType::Paused {
                interruption_count: session.interruption_count,
            },
            session.kind,
        ));
        true
    }

    pub async fn resume_session(&self) -> bool {
        let mut machine = self.machine.lock().await;
        let Some(session) = machine.resume() else {
            return false;
        };

        self.events()
            .emit_session(SessionEvent::new(SessionEventType::Resumed, session.kind));
        true
    }

    /// End the active session as interrupted and write it. Returns the stored
    /// row, or `None` when nothing was active or the write failed.
    pub async fn stop_session(&self) -> Option<SessionRecord> {
        let record = self.machine.lock().await.stop()?;
        let history_limit = self.config.read().await.history_limit;

        self.emit_ended(&record);
        self.events().info(
            "Session Stopped",
            &format!("{} session ended early.", record.kind.as_str()),
        );
        self.persistence.save(record, history_limit).await
    }

    /// Apply due ticks. A completed session is written on a background task
    /// so the caller never waits on the store.
    pub async fn tick(&self) {
        let (kind, progress) = {
            let mut machine = self.machine.lock().await;
            let kind = machine.active().map(|s| s.kind);
            (kind, machine.run_due())
        };

        let Some(kind) = kind else {
            return;
        };

        if let Some(remaining) = progress.remaining_seconds {
            self.events().emit_session(SessionEvent::new(
                SessionEventType::Tick {
                    remaining_seconds: remaining,
                },
                kind,
            ));
        }

        if let Some(record) = progress.completed {
            let config = self.config.read().await.clone();
            self.emit_ended(&record);
            self.completion_alerts(kind, &config);

            self.spawn_save(record, config.history_limit);
        }
    }

    /// Issue the write for a terminal record on a background task tracked
    /// by `flush`.
    fn spawn_save(&self, record: NewSessionRecord, history_limit: usize) {
        let persistence = self.persistence.clone();
        let handle = tokio::spawn(async move {
            persistence.save(record, history_limit).await;
        });
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    /// Wait for background writes started by `tick` to finish.
    pub async fn flush(&self) {
        let handles = std::mem::take(&mut *self.pending.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Session save task failed: {}", e);
            }
        }
    }

    fn completion_alerts(&self, kind: SessionKind, config: &SessionConfig) {
        let (title, body) = match kind {
            SessionKind::Focus => ("Focus Session Complete!", "Great work! Time for a break."),
            SessionKind::Break => ("Break Complete!", "Ready to focus again?"),
        };

        if config.notifications_enabled {
            self.alerts.notify_if_permitted(title, body);
        }
        if config.sound_enabled {
            self.alerts.player.play(config.completion_sound);
        }
        self.events().success(title, body);
    }

    fn emit_ended(&self, record: &NewSessionRecord) {
        self.events().emit_session(SessionEvent::new(
            SessionEventType::Ended {
                outcome: record.outcome,
                elapsed_seconds: record.elapsed_seconds,
            },
            record.kind,
        ));
    }

    /// Replace the local history with the owner's most recent sessions.
    pub async fn load_history(&self, limit: Option<usize>) -> Result<Vec<SessionRecord>> {
        let owner = self.owner().await.ok_or(SessionError::NoOwner)?;
        let limit = match limit {
            Some(limit) => limit,
            None => self.config.read().await.history_limit,
        };

        let rows = match self.persistence.store.recent(&owner, limit).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Failed to load session history: {}", e);
                self.events()
                    .error("History Unavailable", "Could not load your sessions.");
                return Err(e.into());
            }
        };

        *self.persistence.history.write().await = rows.clone();
        Ok(rows)
    }

    pub async fn history(&self) -> Vec<SessionRecord> {
        self.persistence.history.read().await.clone()
    }

    pub async fn summary_today(&self) -> SessionSummary {
        let history = self.persistence.history.read().await;
        SessionSummary::from_records(history.iter(), Some(Utc::now().date_naive()))
    }

    pub async fn active_session(&self) -> Option<ActiveSession> {
        self.machine.lock().await.active().cloned()
    }

    pub async fn is_ticking(&self) -> bool {
        self.machine.lock().await.is_ticking()
    }

    pub async fn next_wakeup(&self) -> Option<Instant> {
        self.machine.lock().await.next_wakeup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::RecordingAlerts;
    use crate::events::{DaemonEvent, ToastLevel};
    use crate::session::store::MemorySessionStore;
    use restwell_core::scheduler::ManualClock;

    struct Harness {
        manager: SessionManager,
        clock: ManualClock,
        store: Arc<MemorySessionStore>,
        recorder: RecordingAlerts,
        events: Arc<EventManager>,
    }

    fn harness() -> Harness {
        let clock = ManualClock::new();
        let store = Arc::new(MemorySessionStore::new());
        let recorder = RecordingAlerts::new();
        let events = Arc::new(EventManager::new());
        let manager = SessionManager::new(
            Arc::new(clock.clone()),
            store.clone(),
            events.clone(),
            recorder.alerts(),
            SessionConfig::default(),
        );
        Harness {
            manager,
            clock,
            store,
            recorder,
            events,
        }
    }

    async fn signed_in() -> Harness {
        let h = harness();
        h.manager.set_owner(Some("user-1".to_string())).await;
        h
    }

    fn toasts(rx: &mut tokio::sync::broadcast::Receiver<DaemonEvent>) -> Vec<ToastLevel> {
        let mut levels = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DaemonEvent::Toast(toast) = event {
                levels.push(toast.level);
            }
        }
        levels
    }

    #[tokio::test]
    async fn test_start_without_owner_warns() {
        let h = harness();
        let mut rx = h.events.subscribe();

        let started = h.manager.start_focus_session(None, None).await.unwrap();
        assert!(!started);
        assert!(h.manager.active_session().await.is_none());
        assert!(h.store.inserts().is_empty());
        assert_eq!(toasts(&mut rx), vec![ToastLevel::Warning]);
    }

    #[tokio::test]
    async fn test_default_durations() {
        let h = signed_in().await;

        h.manager.start_focus_session(None, None).await.unwrap();
        let session = h.manager.active_session().await.unwrap();
        assert_eq!(session.planned_duration_seconds, 1500);

        h.manager.start_break_session(None).await.unwrap();
        let session = h.manager.active_session().await.unwrap();
        assert_eq!(session.planned_duration_seconds, 300);
    }

    #[tokio::test]
    async fn test_focus_pause_resume_stop() {
        let h = signed_in().await;

        assert!(h
            .manager
            .start_focus_session(Some(1500), Some("t1".to_string()))
            .await
            .unwrap());

        assert!(h.manager.pause_session().await);
        let session = h.manager.active_session().await.unwrap();
        assert_eq!(session.interruption_count, 1);
        assert!(!h.manager.is_ticking().await);

        assert!(h.manager.resume_session().await);
        assert!(h.manager.is_ticking().await);
        assert_eq!(h.manager.active_session().await.unwrap().interruption_count, 1);

        h.clock.advance_secs(42);
        h.manager.tick().await;

        let row = h.manager.stop_session().await.unwrap();
        let inserts = h.store.inserts();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].outcome, SessionOutcome::Interrupted);
        assert_eq!(inserts[0].task_id.as_deref(), Some("t1"));
        assert_eq!(inserts[0].elapsed_seconds, 42);
        assert_eq!(inserts[0].interruption_count, 1);

        assert!(h.manager.active_session().await.is_none());
        assert_eq!(h.manager.history().await, vec![row]);
        assert_eq!(h.recorder.sound_count(), 0);
    }

    #[tokio::test]
    async fn test_new_session_interrupts_previous() {
        let h = signed_in().await;

        h.manager
            .start_focus_session(Some(1500), Some("t1".to_string()))
            .await
            .unwrap();
        h.clock.advance_secs(5);
        h.manager.tick().await;

        h.manager.start_break_session(Some(300)).await.unwrap();
        h.manager.flush().await;

        let inserts = h.store.inserts();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].kind, SessionKind::Focus);
        assert_eq!(inserts[0].outcome, SessionOutcome::Interrupted);
        assert_eq!(inserts[0].elapsed_seconds, 5);

        let active = h.manager.active_session().await.unwrap();
        assert_eq!(active.kind, SessionKind::Break);
        assert!(active.task_id.is_none());
    }

    #[tokio::test]
    async fn test_completion_saves_and_alerts() {
        let h = signed_in().await;

        h.manager.start_break_session(Some(3)).await.unwrap();
        h.clock.advance_secs(3);
        h.manager.tick().await;
        h.manager.flush().await;

        assert!(h.manager.active_session().await.is_none());
        let inserts = h.store.inserts();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].outcome, SessionOutcome::Completed);
        assert_eq!(inserts[0].elapsed_seconds, 3);
        assert_eq!(h.recorder.sound_count(), 1);
        assert_eq!(h.recorder.notification_count(), 1);
        assert_eq!(h.manager.history().await.len(), 1);

        h.clock.advance_secs(10);
        h.manager.tick().await;
        h.manager.flush().await;
        assert_eq!(h.store.inserts().len(), 1);
        assert_eq!(h.recorder.sound_count(), 1);
    }

    #[tokio::test]
    async fn test_completion_respects_preferences() {
        let h = signed_in().await;
        h.manager
            .update_config(SessionConfig {
                sound_enabled: false,
                ..SessionConfig::default()
            })
            .await;
        h.recorder.deny_notifications();
        let mut rx = h.events.subscribe();

        h.manager.start_focus_session(Some(2), None).await.unwrap();
        h.clock.advance_secs(2);
        h.manager.tick().await;
        h.manager.flush().await;

        assert_eq!(h.store.inserts().len(), 1);
        assert_eq!(h.recorder.sound_count(), 0);
        assert_eq!(h.recorder.notification_count(), 0);
        assert!(toasts(&mut rx).contains(&ToastLevel::Success));
    }

    #[tokio::test]
    async fn test_denied_notifications_keep_sound_and_toast() {
        let h = signed_in().await;
        h.recorder.deny_notifications();
        let mut rx = h.events.subscribe();

        h.manager.start_break_session(Some(2)).await.unwrap();
        h.clock.advance_secs(2);
        h.manager.tick().await;
        h.manager.flush().await;

        assert_eq!(h.recorder.notification_count(), 0);
        assert_eq!(h.recorder.sound_count(), 1);
        assert!(toasts(&mut rx).contains(&ToastLevel::Success));
    }

    #[tokio::test]
    async fn test_missing_owner_wins_over_bad_duration() {
        let h = harness();
        let mut rx = h.events.subscribe();

        let started = h.manager.start_break_session(Some(0)).await.unwrap();
        assert!(!started);
        assert!(h.manager.active_session().await.is_none());
        assert_eq!(toasts(&mut rx), vec![ToastLevel::Warning]);
    }

    #[tokio::test]
    async fn test_zero_duration_rejected_when_signed_in() {
        let h = signed_in().await;
        assert!(matches!(
            h.manager.start_focus_session(Some(0), None).await,
            Err(SessionError::InvalidDuration)
        ));
        assert!(h.manager.active_session().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_save_is_not_rolled_back() {
        let h = signed_in().await;
        let mut rx = h.events.subscribe();
        h.store.set_failing(true);

        h.manager.start_focus_session(Some(60), None).await.unwrap();
        assert!(h.manager.stop_session().await.is_none());

        assert_eq!(h.store.inserts().len(), 1);
        assert!(h.manager.active_session().await.is_none());
        assert!(h.manager.history().await.is_empty());
        assert!(toasts(&mut rx).contains(&ToastLevel::Error));
    }

    #[tokio::test]
    async fn test_load_history_and_summary() {
        let h = signed_in().await;

        for _ in 0..3 {
            h.manager.start_focus_session(Some(2), None).await.unwrap();
            h.clock.advance_secs(2);
            h.manager.tick().await;
        }
        h.manager.flush().await;

        let loaded = h.manager.load_history(Some(2)).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(h.manager.history().await.len(), 2);

        let summary = h.manager.summary_today().await;
        assert_eq!(summary.completed_focus_sessions, 2);
        assert_eq!(summary.focus_seconds, 4);
    }

    #[tokio::test]
    async fn test_load_history_requires_owner() {
        let h = harness();
        assert!(matches!(
            h.manager.load_history(None).await,
            Err(SessionError::NoOwner)
        ));
    }
}
