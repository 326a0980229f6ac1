//! Application configuration

use super::AlertSound;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    /// Actor sessions are recorded for. Sessions cannot start without one.
    pub owner_id: Option<String>,
    pub daemon: DaemonConfig,
    pub timers: TimerConfig,
    pub sessions: SessionConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerConfig {
    pub muted: bool,
    pub show_completed: bool,
    pub default_minutes: u64,
    /// Directory alert sound assets are resolved against.
    pub sounds_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub focus_duration: u64,
    pub break_duration: u64,
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
    pub completion_sound: AlertSound,
    pub history_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub sessions_collection: String,
}

/// Longest timer or session, in seconds.
pub const MAX_DURATION: u64 = 7200; // 2 hours

impl Config {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref owner) = self.owner_id {
            if owner.trim().is_empty() {
                return Err(Error::Validation("Owner id cannot be empty".to_string()));
            }
        }

        self.daemon.validate()?;
        self.timers.validate()?;
        self.sessions.validate()?;
        self.remote.validate()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            owner_id: None,
            daemon: DaemonConfig::default(),
            timers: TimerConfig::default(),
            sessions: SessionConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(Error::Validation(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            )));
        }

        Ok(())
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl TimerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_minutes == 0 {
            return Err(Error::Validation(
                "Default timer length must be greater than 0".to_string(),
            ));
        }

        let too_long = self
            .default_minutes
            .checked_mul(60)
            .map_or(true, |seconds| seconds > MAX_DURATION);
        if too_long {
            return Err(Error::Validation(format!(
                "Default timer length too long (max {} minutes)",
                MAX_DURATION / 60
            )));
        }

        Ok(())
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            muted: false,
            show_completed: true,
            default_minutes: 5,
            sounds_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.focus_duration == 0 {
            return Err(Error::Validation(
                "Focus duration must be greater than 0".to_string(),
            ));
        }

        if self.break_duration == 0 {
            return Err(Error::Validation(
                "Break duration must be greater than 0".to_string(),
            ));
        }

        if self.focus_duration > MAX_DURATION {
            return Err(Error::Validation(format!(
                "Focus duration too long (max {} seconds)",
                MAX_DURATION
            )));
        }

        if self.break_duration > MAX_DURATION {
            return Err(Error::Validation(format!(
                "Break duration too long (max {} seconds)",
                MAX_DURATION
            )));
        }

        if self.history_limit == 0 {
            return Err(Error::Validation(
                "History limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn focus_minutes(&self) -> u64 {
        self.focus_duration / 60
    }

    pub fn break_minutes(&self) -> u64 {
        self.break_duration / 60
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            focus_duration: 1500, // 25 minutes
            break_duration: 300,  // 5 minutes
            sound_enabled: true,
            notifications_enabled: true,
            completion_sound: AlertSound::Chime,
            history_limit: 10,
        }
    }
}

impl RemoteConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref url) = self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Validation(format!(
                    "Remote URL must start with http:// or https:// (got '{}')",
                    url
                )));
            }
        }

        if self.sessions_collection.trim().is_empty() {
            return Err(Error::Validation(
                "Sessions collection cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            sessions_collection: "focus_sessions".to_string(),
        }
    }
}
