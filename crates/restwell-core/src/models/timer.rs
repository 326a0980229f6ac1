use super::config::MAX_DURATION;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakTimer {
    pub id: String,
    pub name: String,
    pub duration_seconds: u64,
    pub remaining_seconds: u64,
    pub alert_sound: AlertSound,
    pub state: TimerState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Built-in alert sounds. The set is fixed; timers refer to them by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertSound {
    #[default]
    Gentle,
    Chime,
    Bell,
    Digital,
    Nature,
}

/// Result of applying one tick to a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer was not running; nothing changed.
    Ignored,
    Decremented(u64),
    Completed,
}

impl BreakTimer {
    /// Fails when the length is zero or longer than [`MAX_DURATION`].
    pub fn new(name: &str, duration_minutes: u64, alert_sound: AlertSound) -> Result<Self> {
        let duration_seconds = Self::duration_from_minutes(duration_minutes)?;
        let name = name.trim();
        let name = if name.is_empty() {
            format!("Break Timer ({}m)", duration_minutes)
        } else {
            name.to_string()
        };

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            duration_seconds,
            remaining_seconds: duration_seconds,
            alert_sound,
            state: TimerState::Idle,
            created_at: Utc::now(),
        })
    }

    pub fn duration_from_minutes(minutes: u64) -> Result<u64> {
        match minutes.checked_mul(60) {
            Some(0) => Err(Error::Validation(
                "Timer length must be greater than 0".to_string(),
            )),
            Some(seconds) if seconds <= MAX_DURATION => Ok(seconds),
            _ => Err(Error::Validation(format!(
                "Timer length too long (max {} minutes)",
                MAX_DURATION / 60
            ))),
        }
    }

    /// Move to `Running`. Starting an already running timer is allowed so the
    /// caller can re-arm its tick stream.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            TimerState::Completed => Err(Error::InvalidData(
                "Timer is completed; reset it first".to_string(),
            )),
            _ if self.remaining_seconds == 0 => {
                Err(Error::InvalidData("Timer has no time left".to_string()))
            }
            _ => {
                self.state = TimerState::Running;
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.state != TimerState::Running {
            return Err(Error::InvalidData("Timer is not running".to_string()));
        }

        self.state = TimerState::Paused;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.remaining_seconds = self.duration_seconds;
        self.state = TimerState::Idle;
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.state != TimerState::Running {
            return TickOutcome::Ignored;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.state = TimerState::Completed;
            TickOutcome::Completed
        } else {
            TickOutcome::Decremented(self.remaining_seconds)
        }
    }

    /// Copy of this timer as it is restored after a restart: progress is
    /// never carried across reloads.
    pub fn rehydrated(mut self) -> Self {
        self.reset();
        self
    }

    /// Fraction of the duration already elapsed, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.duration_seconds == 0 {
            return 1.0;
        }
        let elapsed = self.duration_seconds - self.remaining_seconds.min(self.duration_seconds);
        elapsed as f64 / self.duration_seconds as f64
    }

    pub fn display_remaining(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.remaining_seconds / 60,
            self.remaining_seconds % 60
        )
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_completed(&self) -> bool {
        self.state == TimerState::Completed
    }
}

impl TimerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
            TimerState::Completed => "completed",
        }
    }
}

impl AlertSound {
    pub const ALL: [AlertSound; 5] = [
        AlertSound::Gentle,
        AlertSound::Chime,
        AlertSound::Bell,
        AlertSound::Digital,
        AlertSound::Nature,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AlertSound::Gentle => "gentle",
            AlertSound::Chime => "chime",
            AlertSound::Bell => "bell",
            AlertSound::Digital => "digital",
            AlertSound::Nature => "nature",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertSound::Gentle => "Gentle Alarm",
            AlertSound::Chime => "Soft Chime",
            AlertSound::Bell => "Bell",
            AlertSound::Digital => "Digital Beep",
            AlertSound::Nature => "Nature Sounds",
        }
    }

    /// Asset path relative to the sounds directory.
    pub fn asset_path(&self) -> String {
        format!("sounds/{}.mp3", self.id())
    }
}

impl fmt::Display for AlertSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AlertSound {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AlertSound::ALL
            .into_iter()
            .find(|sound| sound.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Validation(format!("Unknown alert sound '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_bounds() {
        assert!(BreakTimer::new("t", 0, AlertSound::Bell).is_err());
        assert!(BreakTimer::new("t", 121, AlertSound::Bell).is_err());
        assert!(BreakTimer::new("t", 307445734561825861, AlertSound::Bell).is_err());
        assert!(BreakTimer::new("t", u64::MAX, AlertSound::Bell).is_err());

        let longest = BreakTimer::new("t", 120, AlertSound::Bell).unwrap();
        assert_eq!(longest.duration_seconds, MAX_DURATION);
    }

    #[test]
    fn test_new_timer_is_idle_and_full() {
        let timer = BreakTimer::new("Quick Break", 5, AlertSound::Gentle).unwrap();
        assert_eq!(timer.name, "Quick Break");
        assert_eq!(timer.duration_seconds, 300);
        assert_eq!(timer.remaining_seconds, 300);
        assert_eq!(timer.state, TimerState::Idle);
    }

    #[test]
    fn test_blank_name_gets_default() {
        let timer = BreakTimer::new("   ", 15, AlertSound::Bell).unwrap();
        assert_eq!(timer.name, "Break Timer (15m)");
    }

    #[test]
    fn test_tick_only_while_running() {
        let mut timer = BreakTimer::new("t", 1, AlertSound::Chime).unwrap();
        assert_eq!(timer.tick(), TickOutcome::Ignored);
        assert_eq!(timer.remaining_seconds, 60);

        timer.start().unwrap();
        assert_eq!(timer.tick(), TickOutcome::Decremented(59));

        timer.pause().unwrap();
        assert_eq!(timer.tick(), TickOutcome::Ignored);
        assert_eq!(timer.remaining_seconds, 59);
    }

    #[test]
    fn test_tick_to_completion() {
        let mut timer = BreakTimer::new("t", 1, AlertSound::Chime).unwrap();
        timer.start().unwrap();
        for _ in 0..59 {
            timer.tick();
        }
        assert_eq!(timer.tick(), TickOutcome::Completed);
        assert!(timer.is_completed());
        assert_eq!(timer.remaining_seconds, 0);
        assert_eq!(timer.tick(), TickOutcome::Ignored);
        assert_eq!(timer.remaining_seconds, 0);
    }

    #[test]
    fn test_completed_cannot_start_until_reset() {
        let mut timer = BreakTimer::new("t", 1, AlertSound::Chime).unwrap();
        timer.start().unwrap();
        for _ in 0..60 {
            timer.tick();
        }
        assert!(timer.start().is_err());

        timer.reset();
        assert_eq!(timer.state, TimerState::Idle);
        assert_eq!(timer.remaining_seconds, 60);
        assert!(timer.start().is_ok());
    }

    #[test]
    fn test_pause_requires_running() {
        let mut timer = BreakTimer::new("t", 1, AlertSound::Chime).unwrap();
        assert!(timer.pause().is_err());
    }

    #[test]
    fn test_rehydrated_discards_progress() {
        let mut timer = BreakTimer::new("t", 2, AlertSound::Nature).unwrap();
        timer.start().unwrap();
        timer.tick();
        timer.pause().unwrap();

        let restored = timer.rehydrated();
        assert_eq!(restored.state, TimerState::Idle);
        assert_eq!(restored.remaining_seconds, 120);
    }

    #[test]
    fn test_display_and_progress() {
        let mut timer = BreakTimer::new("t", 2, AlertSound::Gentle).unwrap();
        assert_eq!(timer.display_remaining(), "02:00");
        timer.start().unwrap();
        for _ in 0..30 {
            timer.tick();
        }
        assert_eq!(timer.display_remaining(), "01:30");
        assert!((timer.progress() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_alert_sound_parse() {
        assert_eq!("gentle".parse::<AlertSound>().unwrap(), AlertSound::Gentle);
        assert_eq!("Digital".parse::<AlertSound>().unwrap(), AlertSound::Digital);
        assert!("kazoo".parse::<AlertSound>().is_err());
        assert_eq!(AlertSound::Bell.asset_path(), "sounds/bell.mp3");
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&TimerState::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
