//! Single-session focus/break state machine.
//!
//! `None -> Active(ticking) <-> Active(frozen)`, and any active session leaves
//! memory the moment it turns terminal. The terminal record is handed back
//! to the caller to persist.

use chrono::Utc;
use restwell_core::models::{
    ActiveSession, NewSessionRecord, SessionKind, SessionOutcome, SessionTick,
};
use restwell_core::scheduler::{Clock, Scheduler};
use std::sync::Arc;
use std::time::Instant;

use crate::timer::TICK_PERIOD;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No signed-in owner to record the session for")]
    NoOwner,

    #[error("Session duration must be greater than 0")]
    InvalidDuration,

    #[error("Store error: {0}")]
    Store(#[from] super::store::StoreError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// What one `run_due` call did.
#[derive(Debug, Default, PartialEq)]
pub struct SessionProgress {
    pub ticks: u32,
    pub remaining_seconds: Option<u64>,
    pub completed: Option<NewSessionRecord>,
}

pub struct SessionMachine {
    owner_id: Option<String>,
    active: Option<ActiveSession>,
    scheduler: Scheduler<()>,
    clock: Arc<dyn Clock>,
}

impl SessionMachine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            owner_id: None,
            active: None,
            scheduler: Scheduler::new(),
            clock,
        }
    }

    pub fn set_owner(&mut self, owner_id: Option<String>) {
        self.owner_id = owner_id;
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_scheduled(&())
    }

    /// Begin a new session. A session that is still active is ended as
    /// interrupted first and its record returned.
    pub fn start(
        &mut self,
        kind: SessionKind,
        duration_seconds: u64,
        task_id: Option<String>,
    ) -> Result<Option<NewSessionRecord>> {
        let owner_id = self.owner_id.clone().ok_or(SessionError::NoOwner)?;
        if duration_seconds == 0 {
            return Err(SessionError::InvalidDuration);
        }

        let replaced = self.end(SessionOutcome::Interrupted);

        self.active = Some(ActiveSession::new(owner_id, kind, duration_seconds, task_id));
        self.scheduler
            .schedule_repeating((), self.clock.now(), TICK_PERIOD);

        Ok(replaced)
    }

    /// Freeze the countdown and count an interruption. No-op unless ticking.
    pub fn pause(&mut self) -> Option<&ActiveSession> {
        let session = self.active.as_mut()?;
        if !session.pause() {
            return None;
        }
        self.scheduler.cancel(&());
        self.active.as_ref()
    }

    /// Restart the countdown where it was frozen. No-op unless frozen.
    pub fn resume(&mut self) -> Option<&ActiveSession> {
        let session = self.active.as_mut()?;
        if !session.resume() {
            return None;
        }
        self.scheduler
            .schedule_repeating((), self.clock.now(), TICK_PERIOD);
        self.active.as_ref()
    }

    /// End the active session as interrupted.
    pub fn stop(&mut self) -> Option<NewSessionRecord> {
        self.end(SessionOutcome::Interrupted)
    }

    pub fn run_due(&mut self) -> SessionProgress {
        let now = self.clock.now();
        let mut progress = SessionProgress::default();

        while self.scheduler.pop_due(now).is_some() {
            let Some(session) = self.active.as_mut() else {
                self.scheduler.cancel(&());
                break;
            };

            match session.tick() {
                SessionTick::Ignored => {
                    self.scheduler.cancel(&());
                }
                SessionTick::Decremented(remaining) => {
                    progress.ticks += 1;
                    progress.remaining_seconds = Some(remaining);
                }
                SessionTick::Finished => {
                    progress.ticks += 1;
                    progress.remaining_seconds = Some(0);
                    progress.completed = self.end(SessionOutcome::Completed);
                    break;
                }
            }
        }

        progress
    }

    pub fn next_wakeup(&mut self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    fn end(&mut self, outcome: SessionOutcome) -> Option<NewSessionRecord> {
        self.scheduler.cancel(&());
        self.active
            .take()
            .map(|session| session.finish(outcome, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restwell_core::scheduler::ManualClock;

    fn machine() -> (SessionMachine, ManualClock) {
        let clock = ManualClock::new();
        let mut machine = SessionMachine::new(Arc::new(clock.clone()));
        machine.set_owner(Some("user-1".to_string()));
        (machine, clock)
    }

    #[test]
    fn test_start_requires_owner() {
        let (mut machine, _) = machine();
        machine.set_owner(None);

        let result = machine.start(SessionKind::Focus, 1500, None);
        assert!(matches!(result, Err(SessionError::NoOwner)));
        assert!(machine.active().is_none());
        assert!(!machine.is_ticking());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let (mut machine, _) = machine();
        assert!(matches!(
            machine.start(SessionKind::Break, 0, None),
            Err(SessionError::InvalidDuration)
        ));
    }

    #[test]
    fn test_start_replaces_active() {
        let (mut machine, clock) = machine();
        machine.start(SessionKind::Focus, 1500, Some("t1".to_string())).unwrap();
        clock.advance_secs(10);
        machine.run_due();

        let replaced = machine.start(SessionKind::Break, 300, None).unwrap().unwrap();
        assert_eq!(replaced.outcome, SessionOutcome::Interrupted);
        assert_eq!(replaced.kind, SessionKind::Focus);
        assert_eq!(replaced.elapsed_seconds, 10);

        let active = machine.active().unwrap();
        assert_eq!(active.kind, SessionKind::Break);
        assert_eq!(active.remaining_seconds, 300);
    }

    #[test]
    fn test_pause_resume() {
        let (mut machine, clock) = machine();
        machine.start(SessionKind::Focus, 60, None).unwrap();

        assert!(machine.pause().is_some());
        assert!(machine.pause().is_none());
        assert!(!machine.is_ticking());
        clock.advance_secs(10);
        assert_eq!(machine.run_due().ticks, 0);

        assert!(machine.resume().is_some());
        assert!(machine.resume().is_none());
        clock.advance_secs(10);
        let progress = machine.run_due();
        assert_eq!(progress.ticks, 10);
        assert_eq!(progress.remaining_seconds, Some(50));
        assert_eq!(machine.active().unwrap().interruption_count, 1);
    }

    #[test]
    fn test_pause_without_session() {
        let (mut machine, _) = machine();
        assert!(machine.pause().is_none());
        assert!(machine.resume().is_none());
        assert!(machine.stop().is_none());
    }

    #[test]
    fn test_runs_to_completion_once() {
        let (mut machine, clock) = machine();
        machine.start(SessionKind::Break, 5, None).unwrap();

        clock.advance_secs(30);
        let progress = machine.run_due();
        assert_eq!(progress.ticks, 5);
        let record = progress.completed.unwrap();
        assert_eq!(record.outcome, SessionOutcome::Completed);
        assert_eq!(record.elapsed_seconds, 5);
        assert!(machine.active().is_none());

        clock.advance_secs(30);
        assert_eq!(machine.run_due(), SessionProgress::default());
    }
}
