//! Configuration manager

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use restwell_core::{
    models::{AlertSound, Config},
    storage::{init_config_dir, ConfigStorage},
    Result as CoreResult,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] restwell_core::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigManagerError>;

/// Manages application configuration
pub struct ConfigManager {
    storage: ConfigStorage,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    pub fn new() -> CoreResult<Self> {
        Self::with_dir(init_config_dir()?)
    }

    pub fn with_dir(config_dir: PathBuf) -> CoreResult<Self> {
        let storage = ConfigStorage::new(config_dir);
        let config = storage.load()?;

        Ok(Self {
            storage,
            config: Arc::new(RwLock::new(config)),
        })
    }

    pub async fn get(&self) -> Config {
        self.config.read().await.clone()
    }

    pub async fn update(&self, config: Config) -> Result<Config> {
        config
            .validate()
            .map_err(|e| ConfigManagerError::Invalid(e.to_string()))?;

        self.storage.save(&config)?;

        {
            let mut current = self.config.write().await;
            *current = config.clone();
        }

        tracing::debug!("Configuration saved");
        Ok(config)
    }

    pub async fn set_owner(&self, owner_id: Option<String>) -> Result<Config> {
        let mut config = self.get().await;
        config.owner_id = owner_id;
        self.update(config).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<Config> {
        let mut config = self.get().await;
        config.timers.muted = muted;
        self.update(config).await
    }

    pub async fn set_show_completed(&self, show: bool) -> Result<Config> {
        let mut config = self.get().await;
        config.timers.show_completed = show;
        self.update(config).await
    }

    pub async fn update_session_config(
        &self,
        focus_duration: Option<u64>,
        break_duration: Option<u64>,
        sound_enabled: Option<bool>,
        notifications_enabled: Option<bool>,
        completion_sound: Option<AlertSound>,
    ) -> Result<Config> {
        let mut config = self.get().await;

        if let Some(duration) = focus_duration {
            config.sessions.focus_duration = duration;
        }

        if let Some(duration) = break_duration {
            config.sessions.break_duration = duration;
        }

        if let Some(enabled) = sound_enabled {
            config.sessions.sound_enabled = enabled;
        }

        if let Some(enabled) = notifications_enabled {
            config.sessions.notifications_enabled = enabled;
        }

        if let Some(sound) = completion_sound {
            config.sessions.completion_sound = sound;
        }

        self.update(config).await
    }

    pub async fn set_remote(
        &self,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> Result<Config> {
        let mut config = self.get().await;
        config.remote.base_url = base_url;
        config.remote.api_key = api_key;
        self.update(config).await
    }
}
