//! Session events

use chrono::{DateTime, Utc};
use restwell_core::models::{SessionKind, SessionOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEvent {
    pub event_type: SessionEventType,
    pub kind: SessionKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventType {
    Started {
        planned_duration_seconds: u64,
        task_id: Option<String>,
    },
    Paused {
        interruption_count: u32,
    },
    Resumed,
    Tick {
        remaining_seconds: u64,
    },
    /// Session reached a terminal outcome and left memory
    Ended {
        outcome: SessionOutcome,
        elapsed_seconds: u64,
    },
    /// Store accepted the terminal record
    Saved {
        record_id: String,
    },
    /// Store rejected the terminal record; it is not retried
    SaveFailed {
        error: String,
    },
}

impl SessionEvent {
    pub fn new(event_type: SessionEventType, kind: SessionKind) -> Self {
        Self {
            event_type,
            kind,
            timestamp: Utc::now(),
        }
    }
}
