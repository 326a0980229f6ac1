use restwell_core::models::{AlertSound, BreakTimer, TickOutcome};
use restwell_core::scheduler::{Clock, Scheduler};
use restwell_core::storage::TimerStorage;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::events::{TimerEvent, TimerEventType};
use crate::alerts::Alerts;
use crate::event_manager::EventManager;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum TimerEngineError {
    #[error("Timer not found: {0}")]
    NotFound(String),

    #[error("Core error: {0}")]
    Core(#[from] restwell_core::Error),
}

pub type Result<T> = std::result::Result<T, TimerEngineError>;

/// Owns every break timer and the tick streams driving them.
///
/// Tick handles live in the engine's scheduler, keyed by timer id, never on
/// the timers themselves. Callers that share the engine across tasks wrap it
/// in a mutex so each mutation is atomic with respect to ticks.
pub struct TimerEngine {
    timers: Vec<BreakTimer>,
    scheduler: Scheduler<String>,
    storage: Option<TimerStorage>,
    /// Generation of the newest snapshot on disk. Saves run off the runtime
    /// and skip themselves when a newer one has already landed.
    written: Arc<Mutex<u64>>,
    generation: u64,
    pending: Vec<JoinHandle<()>>,
    clock: Arc<dyn Clock>,
    events: Arc<EventManager>,
    alerts: Alerts,
    muted: bool,
    show_completed: bool,
}

impl TimerEngine {
    /// In-memory engine with no timers.
    pub fn new(clock: Arc<dyn Clock>, events: Arc<EventManager>, alerts: Alerts) -> Self {
        Self {
            timers: Vec::new(),
            scheduler: Scheduler::new(),
            storage: None,
            written: Arc::new(Mutex::new(0)),
            generation: 0,
            pending: Vec::new(),
            clock,
            events,
            alerts,
            muted: false,
            show_completed: true,
        }
    }

    /// Attach durable storage and restore the saved timers, all idle.
    pub fn with_storage(mut self, storage: TimerStorage) -> Result<Self> {
        self.timers = storage.load()?;
        tracing::info!(
            "Restored {} timers from {}",
            self.timers.len(),
            storage.path().display()
        );
        self.storage = Some(storage);
        Ok(self)
    }

    /// Add an idle timer. Zero or over-long lengths are rejected before
    /// anything changes.
    pub fn create_timer(
        &mut self,
        name: &str,
        duration_minutes: u64,
        sound: AlertSound,
    ) -> Result<String> {
        let timer = BreakTimer::new(name, duration_minutes, sound)?;
        let id = timer.id.clone();

        tracing::info!("Created timer '{}' ({}m)", timer.name, duration_minutes);
        self.events.emit_timer(TimerEvent::new(
            TimerEventType::Created {
                name: timer.name.clone(),
                duration_seconds: timer.duration_seconds,
                alert_sound: sound,
            },
            id.clone(),
        ));
        self.events
            .success("Timer Created", &format!("{} has been added", timer.name));

        self.timers.push(timer);
        self.persist();
        Ok(id)
    }

    /// Start or resume a timer. Re-arms the tick stream, so calling this on a
    /// running timer leaves exactly one stream.
    pub fn start(&mut self, timer_id: &str) -> Result<()> {
        let now = self.clock.now();
        let timer = self.find_mut(timer_id)?;
        timer.start()?;
        let remaining = timer.remaining_seconds;

        self.scheduler
            .schedule_repeating(timer_id.to_string(), now, TICK_PERIOD);

        tracing::debug!("Timer {} running, {}s left", timer_id, remaining);
        self.events.emit_timer(TimerEvent::new(
            TimerEventType::Started {
                remaining_seconds: remaining,
            },
            timer_id.to_string(),
        ));
        self.persist();
        Ok(())
    }

    pub fn resume(&mut self, timer_id: &str) -> Result<()> {
        self.start(timer_id)
    }

    pub fn pause(&mut self, timer_id: &str) -> Result<()> {
        let timer = self.find_mut(timer_id)?;
        timer.pause()?;
        let remaining = timer.remaining_seconds;

        self.scheduler.cancel(&timer_id.to_string());

        self.events.emit_timer(TimerEvent::new(
            TimerEventType::Paused {
                remaining_seconds: remaining,
            },
            timer_id.to_string(),
        ));
        self.persist();
        Ok(())
    }

    pub fn reset(&mut self, timer_id: &str) -> Result<()> {
        self.scheduler.cancel(&timer_id.to_string());
        self.find_mut(timer_id)?.reset();

        self.events
            .emit_timer(TimerEvent::new(TimerEventType::Reset, timer_id.to_string()));
        self.persist();
        Ok(())
    }

    pub fn delete(&mut self, timer_id: &str) -> Result<BreakTimer> {
        let index = self.index_of(timer_id)?;
        self.scheduler.cancel(&timer_id.to_string());
        let timer = self.timers.remove(index);

        tracing::info!("Deleted timer '{}'", timer.name);
        self.events
            .emit_timer(TimerEvent::new(TimerEventType::Deleted, timer_id.to_string()));
        self.events
            .info("Timer Deleted", &format!("{} has been removed", timer.name));
        self.persist();
        Ok(timer)
    }

    /// Apply every tick that is due at the clock's current time. Returns how
    /// many ticks changed a timer.
    pub fn run_due(&mut self) -> usize {
        let now = self.clock.now();
        let mut applied = 0;

        while let Some(timer_id) = self.scheduler.pop_due(now) {
            let Ok(index) = self.index_of(&timer_id) else {
                self.scheduler.cancel(&timer_id);
                continue;
            };

            match self.timers[index].tick() {
                TickOutcome::Ignored => {
                    self.scheduler.cancel(&timer_id);
                }
                TickOutcome::Decremented(remaining) => {
                    applied += 1;
                    self.events.emit_timer(TimerEvent::tick(timer_id, remaining));
                }
                TickOutcome::Completed => {
                    applied += 1;
                    self.scheduler.cancel(&timer_id);
                    self.events.emit_timer(TimerEvent::tick(timer_id, 0));
                    self.on_completed(index);
                }
            }
        }

        applied
    }

    fn on_completed(&mut self, index: usize) {
        let timer = &self.timers[index];
        let name = timer.name.clone();
        let sound = timer.alert_sound;

        tracing::info!("Timer '{}' completed", name);
        self.events.emit_timer(TimerEvent::new(
            TimerEventType::Completed { name: name.clone() },
            timer.id.clone(),
        ));

        if !self.muted {
            self.alerts.player.play(sound);
        }

        let message = format!("{} is complete. Time to take a break!", name);
        self.alerts.notify_if_permitted("Timer Complete!", &message);
        self.events.success("Timer Complete!", &message);

        self.persist();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_show_completed(&mut self, show: bool) {
        self.show_completed = show;
    }

    pub fn timers(&self) -> &[BreakTimer] {
        &self.timers
    }

    /// Timers to display, honouring the show-completed filter.
    pub fn visible_timers(&self) -> Vec<&BreakTimer> {
        self.timers
            .iter()
            .filter(|t| self.show_completed || !t.is_completed())
            .collect()
    }

    pub fn get(&self, timer_id: &str) -> Option<&BreakTimer> {
        self.timers.iter().find(|t| t.id == timer_id)
    }

    pub fn running_count(&self) -> usize {
        self.scheduler.len()
    }

    pub fn next_wakeup(&mut self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    fn index_of(&self, timer_id: &str) -> Result<usize> {
        self.timers
            .iter()
            .position(|t| t.id == timer_id)
            .ok_or_else(|| TimerEngineError::NotFound(timer_id.to_string()))
    }

    fn find_mut(&mut self, timer_id: &str) -> Result<&mut BreakTimer> {
        let index = self.index_of(timer_id)?;
        Ok(&mut self.timers[index])
    }

    /// Wait for every queued save to reach disk.
    pub async fn flush(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!("Timer save task failed: {}", e);
            }
        }
    }

    /// Queue a save of the current timers on the blocking pool.
    fn persist(&mut self) {
        let Some(storage) = self.storage.clone() else {
            return;
        };
        self.generation += 1;
        let generation = self.generation;
        let snapshot = self.timers.clone();
        let written = self.written.clone();

        self.pending.retain(|handle| !handle.is_finished());
        self.pending.push(tokio::task::spawn_blocking(move || {
            let mut last = written.lock().unwrap_or_else(|e| e.into_inner());
            if *last > generation {
                return;
            }
            match storage.save(&snapshot) {
                Ok(()) => *last = generation,
                Err(e) => tracing::error!("Failed to save timers: {}", e),
            }
        }));
    }
}
