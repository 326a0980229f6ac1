//! Runtime loop that advances both engines on a single clock.

use restwell_core::scheduler::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};

use crate::session::SessionManager;
use crate::timer::TimerEngine;

/// Longest the loop sleeps when nothing is scheduled.
const IDLE_WAIT: Duration = Duration::from_secs(1);

pub struct Driver {
    clock: Arc<dyn Clock>,
    timers: Arc<Mutex<TimerEngine>>,
    sessions: Arc<SessionManager>,
    wake: Arc<Notify>,
}

impl Driver {
    pub fn new(
        clock: Arc<dyn Clock>,
        timers: Arc<Mutex<TimerEngine>>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            clock,
            timers,
            sessions,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Handle used to make the loop re-read its deadlines after a command.
    pub fn waker(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    /// Apply everything due right now.
    pub async fn step(&self) {
        let ticks = self.timers.lock().await.run_due();
        if ticks > 0 {
            tracing::trace!("Applied {} timer ticks", ticks);
        }
        self.sessions.tick().await;
    }

    async fn wait_time(&self) -> Duration {
        let timer_next = self.timers.lock().await.next_wakeup();
        let session_next = self.sessions.next_wakeup().await;

        let next = match (timer_next, session_next) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        next.map(|deadline| deadline.saturating_duration_since(self.clock.now()))
            .unwrap_or(IDLE_WAIT)
            .min(IDLE_WAIT)
    }

    /// Run until `shutdown` flips to true, then wait for in-flight timer and
    /// session writes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Driver started");

        loop {
            let wait = self.wait_time().await;

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.wake.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }

            self.step().await;
        }

        self.timers.lock().await.flush().await;
        self.sessions.flush().await;
        tracing::info!("Driver stopped");
    }
}
