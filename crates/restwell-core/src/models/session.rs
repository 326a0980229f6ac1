//! Focus and break session data model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Focus,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Completed,
    Interrupted,
}

/// Result of applying one tick to the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTick {
    Ignored,
    Decremented(u64),
    Finished,
}

/// The in-memory session. It has no id until the store accepts its record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveSession {
    pub owner_id: String,
    pub kind: SessionKind,
    pub planned_duration_seconds: u64,
    pub remaining_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub interruption_count: u32,
    pub task_id: Option<String>,
    pub ticking: bool,
}

/// Insert payload for a terminal session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSessionRecord {
    pub owner_id: String,
    pub kind: SessionKind,
    pub planned_duration_seconds: u64,
    pub elapsed_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: SessionOutcome,
    pub interruption_count: u32,
    pub task_id: Option<String>,
}

/// A session row as stored remotely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    #[serde(flatten)]
    pub record: NewSessionRecord,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub total_sessions: usize,
    pub completed_focus_sessions: usize,
    pub interrupted_sessions: usize,
    pub focus_seconds: u64,
    pub break_seconds: u64,
    pub interruptions: u32,
}

impl ActiveSession {
    pub fn new(
        owner_id: String,
        kind: SessionKind,
        duration_seconds: u64,
        task_id: Option<String>,
    ) -> Self {
        // Breaks are never linked to a task.
        let task_id = match kind {
            SessionKind::Focus => task_id,
            SessionKind::Break => None,
        };

        Self {
            owner_id,
            kind,
            planned_duration_seconds: duration_seconds,
            remaining_seconds: duration_seconds,
            started_at: Utc::now(),
            interruption_count: 0,
            task_id,
            ticking: true,
        }
    }

    /// Freeze the countdown. Returns `false` when it was already frozen.
    pub fn pause(&mut self) -> bool {
        if !self.ticking {
            return false;
        }
        self.ticking = false;
        self.interruption_count += 1;
        true
    }

    /// Unfreeze the countdown. Returns `false` when it was already ticking.
    pub fn resume(&mut self) -> bool {
        if self.ticking {
            return false;
        }
        self.ticking = true;
        true
    }

    pub fn tick(&mut self) -> SessionTick {
        if !self.ticking || self.remaining_seconds == 0 {
            return SessionTick::Ignored;
        }

        self.remaining_seconds -= 1;
        if self.remaining_seconds == 0 {
            SessionTick::Finished
        } else {
            SessionTick::Decremented(self.remaining_seconds)
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.planned_duration_seconds
            .saturating_sub(self.remaining_seconds)
    }

    /// Consume the session into its terminal record.
    pub fn finish(self, outcome: SessionOutcome, ended_at: DateTime<Utc>) -> NewSessionRecord {
        NewSessionRecord {
            elapsed_seconds: self.elapsed_seconds(),
            owner_id: self.owner_id,
            kind: self.kind,
            planned_duration_seconds: self.planned_duration_seconds,
            started_at: self.started_at,
            ended_at,
            outcome,
            interruption_count: self.interruption_count,
            task_id: self.task_id,
        }
    }
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Focus => "Focus",
            SessionKind::Break => "Break",
        }
    }
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::Interrupted => "interrupted",
        }
    }
}

impl SessionSummary {
    /// Aggregate the given history, optionally only sessions started on `day` (UTC).
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a SessionRecord>,
        day: Option<NaiveDate>,
    ) -> Self {
        let mut summary = Self::default();

        for SessionRecord { record, .. } in records {
            if let Some(day) = day {
                if record.started_at.date_naive() != day {
                    continue;
                }
            }

            summary.total_sessions += 1;
            summary.interruptions += record.interruption_count;
            match record.kind {
                SessionKind::Focus => summary.focus_seconds += record.elapsed_seconds,
                SessionKind::Break => summary.break_seconds += record.elapsed_seconds,
            }
            match (record.kind, record.outcome) {
                (SessionKind::Focus, SessionOutcome::Completed) => {
                    summary.completed_focus_sessions += 1
                }
                (_, SessionOutcome::Interrupted) => summary.interrupted_sessions += 1,
                _ => {}
            }
        }

        summary
    }

    /// Share of sessions that ran to completion.
    pub fn completion_rate(&self) -> f64 {
        if self.total_sessions == 0 {
            return 0.0;
        }
        (self.total_sessions - self.interrupted_sessions) as f64 / self.total_sessions as f64
    }
}
