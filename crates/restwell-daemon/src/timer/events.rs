//! Timer events

use chrono::{DateTime, Utc};
use restwell_core::models::AlertSound;
use serde::{Deserialize, Serialize};

/// Event emitted by the timer engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerEvent {
    pub event_type: TimerEventType,
    pub timer_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Types of timer events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEventType {
    /// Timer added to the list
    Created {
        name: String,
        duration_seconds: u64,
        alert_sound: AlertSound,
    },
    /// Timer started or resumed
    Started { remaining_seconds: u64 },
    /// Timer paused
    Paused { remaining_seconds: u64 },
    /// Timer put back to its full duration
    Reset,
    /// Timer removed from the list
    Deleted,
    /// One second elapsed
    Tick { remaining_seconds: u64 },
    /// Countdown reached zero
    Completed { name: String },
}

impl TimerEvent {
    pub fn new(event_type: TimerEventType, timer_id: String) -> Self {
        Self {
            event_type,
            timer_id,
            timestamp: Utc::now(),
        }
    }

    pub fn tick(timer_id: String, remaining_seconds: u64) -> Self {
        Self::new(TimerEventType::Tick { remaining_seconds }, timer_id)
    }
}
