//! Durable local storage for the break timer list

use crate::{models::BreakTimer, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize)]
struct TimersFile {
    timers: Vec<BreakTimer>,
}

/// Whole-collection snapshot store. Every save rewrites the file.
#[derive(Debug, Clone)]
pub struct TimerStorage {
    data_dir: PathBuf,
}

impl TimerStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join("timers.json")
    }

    /// Load every stored timer, reset to idle with a full countdown.
    pub fn load(&self) -> Result<Vec<BreakTimer>> {
        let timers_path = self.path();

        if !timers_path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(timers_path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let timers_file: TimersFile = serde_json::from_str(&content)?;
        Ok(timers_file
            .timers
            .into_iter()
            .map(BreakTimer::rehydrated)
            .collect())
    }

    pub fn save(&self, timers: &[BreakTimer]) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;

        let timers_file = TimersFile {
            timers: timers.to_vec(),
        };
        let content = serde_json::to_string_pretty(&timers_file)?;
        std::fs::write(self.path(), content)?;

        Ok(())
    }
}
