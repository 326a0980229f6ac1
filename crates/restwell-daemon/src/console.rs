//! Line commands read from stdin while the daemon runs.

use anyhow::{anyhow, bail, Result};
use restwell_core::models::{AlertSound, MAX_DURATION};
use restwell_daemon::{ConfigManager, SessionManager, TimerEngine};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

pub const HELP: &str = "\
Commands:
  timer create [minutes] [sound] [name]   create a break timer
  timer start|pause|resume|reset|delete <id>
  timer list                              list timers
  timer mute [on|off]                     toggle completion sounds
  timer show-completed [on|off]           show or hide finished timers
  focus [minutes] [task]                  start a focus session
  break [minutes]                         start a break session
  pause | resume | stop                   control the active session
  history                                 recent sessions and today's totals
  session [focus|break <minutes>] [sound|notifications on|off] [chime <sound>]
                                          show or change session settings
  owner [<id>|clear]                      show or set who sessions belong to
  remote <url> <api-key> | remote off     remote store, used after restart
  help | quit";

/// Changes requested by `session`. All `None` means show the current values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSettings {
    pub focus_minutes: Option<u64>,
    pub break_minutes: Option<u64>,
    pub sound_enabled: Option<bool>,
    pub notifications_enabled: Option<bool>,
    pub completion_sound: Option<AlertSound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TimerCreate {
        minutes: Option<u64>,
        sound: AlertSound,
        name: String,
    },
    TimerStart(String),
    TimerPause(String),
    TimerResume(String),
    TimerReset(String),
    TimerDelete(String),
    TimerList,
    TimerMute(Option<bool>),
    TimerShowCompleted(Option<bool>),
    Focus {
        minutes: Option<u64>,
        task_id: Option<String>,
    },
    Break {
        minutes: Option<u64>,
    },
    Pause,
    Resume,
    Stop,
    History,
    SessionConfig(SessionSettings),
    ShowOwner,
    SetOwner(Option<String>),
    Remote {
        base_url: Option<String>,
        api_key: Option<String>,
    },
    Help,
    Quit,
}

impl Command {
    /// Blank lines parse to `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match head.to_lowercase().as_str() {
            "timer" => Self::parse_timer(&rest)?,
            "focus" => Command::Focus {
                minutes: rest.first().map(|m| parse_minutes(m)).transpose()?,
                task_id: rest.get(1).map(|t| t.to_string()),
            },
            "break" => Command::Break {
                minutes: rest.first().map(|m| parse_minutes(m)).transpose()?,
            },
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "stop" => Command::Stop,
            "history" => Command::History,
            "session" | "settings" => Command::SessionConfig(parse_settings(&rest)?),
            "owner" => match rest.as_slice() {
                [] => Command::ShowOwner,
                ["clear"] => Command::SetOwner(None),
                [id] => Command::SetOwner(Some(id.to_string())),
                _ => bail!("Usage: owner [<id>|clear]"),
            },
            "remote" => match rest.as_slice() {
                ["off"] => Command::Remote {
                    base_url: None,
                    api_key: None,
                },
                [url, key] => Command::Remote {
                    base_url: Some(url.to_string()),
                    api_key: Some(key.to_string()),
                },
                _ => bail!("Usage: remote <url> <api-key> | remote off"),
            },
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("Unknown command '{}' (try 'help')", other),
        };

        Ok(Some(command))
    }

    fn parse_timer(args: &[&str]) -> Result<Command> {
        let Some((action, rest)) = args.split_first() else {
            bail!("Missing timer action (try 'help')");
        };

        let id = || {
            rest.first()
                .map(|id| id.to_string())
                .ok_or_else(|| anyhow!("Missing timer id"))
        };

        Ok(match *action {
            "create" | "new" => {
                let mut rest = rest;
                let mut minutes = None;
                if let Some(first) = rest.first() {
                    if first.chars().all(|c| c.is_ascii_digit()) {
                        minutes = Some(parse_minutes(first)?);
                        rest = &rest[1..];
                    }
                }

                let mut sound = AlertSound::default();
                if let Some(parsed) = rest.first().and_then(|s| s.parse::<AlertSound>().ok()) {
                    sound = parsed;
                    rest = &rest[1..];
                }

                Command::TimerCreate {
                    minutes,
                    sound,
                    name: rest.join(" "),
                }
            }
            "start" => Command::TimerStart(id()?),
            "pause" => Command::TimerPause(id()?),
            "resume" => Command::TimerResume(id()?),
            "reset" => Command::TimerReset(id()?),
            "delete" | "rm" => Command::TimerDelete(id()?),
            "list" | "ls" => Command::TimerList,
            "mute" => Command::TimerMute(rest.first().map(|v| parse_switch(v)).transpose()?),
            "show-completed" => {
                Command::TimerShowCompleted(rest.first().map(|v| parse_switch(v)).transpose()?)
            }
            other => bail!("Unknown timer action '{}'", other),
        })
    }
}

fn parse_switch(value: &str) -> Result<bool> {
    match value {
        "on" => Ok(true),
        "off" => Ok(false),
        other => bail!("Expected 'on' or 'off', got '{}'", other),
    }
}

/// `key value` pairs, e.g. `focus 50 sound off`.
fn parse_settings(args: &[&str]) -> Result<SessionSettings> {
    let mut settings = SessionSettings::default();

    for pair in args.chunks(2) {
        let [key, value] = pair else {
            bail!("Missing value for '{}'", pair[0]);
        };
        match *key {
            "focus" => settings.focus_minutes = Some(parse_minutes(value)?),
            "break" => settings.break_minutes = Some(parse_minutes(value)?),
            "sound" => settings.sound_enabled = Some(parse_switch(value)?),
            "notifications" => settings.notifications_enabled = Some(parse_switch(value)?),
            "chime" => {
                let sound = value
                    .parse::<AlertSound>()
                    .map_err(|_| anyhow!("Unknown sound '{}'", value))?;
                settings.completion_sound = Some(sound);
            }
            other => bail!("Unknown session setting '{}'", other),
        }
    }

    Ok(settings)
}

fn parse_minutes(value: &str) -> Result<u64> {
    let minutes: u64 = value
        .parse()
        .map_err(|_| anyhow!("'{}' is not a number of minutes", value))?;
    if minutes == 0 {
        bail!("Duration must be at least one minute");
    }
    if minutes > MAX_DURATION / 60 {
        bail!("Duration can be at most {} minutes", MAX_DURATION / 60);
    }
    Ok(minutes)
}

pub struct Console {
    timers: Arc<Mutex<TimerEngine>>,
    sessions: Arc<SessionManager>,
    config: Arc<ConfigManager>,
    waker: Arc<Notify>,
}

impl Console {
    pub fn new(
        timers: Arc<Mutex<TimerEngine>>,
        sessions: Arc<SessionManager>,
        config: Arc<ConfigManager>,
        waker: Arc<Notify>,
    ) -> Self {
        Self {
            timers,
            sessions,
            config,
            waker,
        }
    }

    /// Run one command and return the text to print.
    pub async fn execute(&self, command: Command) -> Result<String> {
        let output = match command {
            Command::TimerCreate {
                minutes,
                sound,
                name,
            } => {
                let minutes = match minutes {
                    Some(minutes) => minutes,
                    None => self.config.get().await.timers.default_minutes,
                };
                let mut timers = self.timers.lock().await;
                let id = timers.create_timer(&name, minutes, sound)?;
                let timer = timers
                    .get(&id)
                    .ok_or_else(|| anyhow!("Timer vanished after create"))?;
                format!("Created {} '{}' ({} min)", short_id(&id), timer.name, minutes)
            }
            Command::TimerStart(prefix) => {
                let mut timers = self.timers.lock().await;
                let id = resolve(&timers, &prefix)?;
                timers.start(&id)?;
                format!("Started {}", short_id(&id))
            }
            Command::TimerPause(prefix) => {
                let mut timers = self.timers.lock().await;
                let id = resolve(&timers, &prefix)?;
                timers.pause(&id)?;
                format!("Paused {}", short_id(&id))
            }
            Command::TimerResume(prefix) => {
                let mut timers = self.timers.lock().await;
                let id = resolve(&timers, &prefix)?;
                timers.resume(&id)?;
                format!("Resumed {}", short_id(&id))
            }
            Command::TimerReset(prefix) => {
                let mut timers = self.timers.lock().await;
                let id = resolve(&timers, &prefix)?;
                timers.reset(&id)?;
                format!("Reset {}", short_id(&id))
            }
            Command::TimerDelete(prefix) => {
                let mut timers = self.timers.lock().await;
                let id = resolve(&timers, &prefix)?;
                let timer = timers.delete(&id)?;
                format!("Deleted '{}'", timer.name)
            }
            Command::TimerList => self.list_timers().await,
            Command::TimerMute(setting) => {
                let mut timers = self.timers.lock().await;
                let muted = setting.unwrap_or(!timers.is_muted());
                timers.set_muted(muted);
                drop(timers);
                self.config.set_muted(muted).await?;
                let status = if muted { "Sounds muted" } else { "Sounds on" };
                status.to_string()
            }
            Command::TimerShowCompleted(setting) => {
                let show = match setting {
                    Some(show) => show,
                    None => !self.config.get().await.timers.show_completed,
                };
                self.config.set_show_completed(show).await?;
                self.timers.lock().await.set_show_completed(show);
                let status = if show {
                    "Showing completed timers"
                } else {
                    "Hiding completed timers"
                };
                status.to_string()
            }
            Command::Focus { minutes, task_id } => {
                let started = self
                    .sessions
                    .start_focus_session(minutes.map(|m| m * 60), task_id)
                    .await?;
                let status = if started { "Focus session started" } else { "No owner set" };
                status.to_string()
            }
            Command::Break { minutes } => {
                let started = self
                    .sessions
                    .start_break_session(minutes.map(|m| m * 60))
                    .await?;
                let status = if started { "Break session started" } else { "No owner set" };
                status.to_string()
            }
            Command::Pause => {
                if self.sessions.pause_session().await {
                    "Session paused".to_string()
                } else {
                    "No running session".to_string()
                }
            }
            Command::Resume => {
                if self.sessions.resume_session().await {
                    "Session resumed".to_string()
                } else {
                    "No paused session".to_string()
                }
            }
            Command::Stop => match self.sessions.active_session().await {
                None => "No active session".to_string(),
                Some(_) => match self.sessions.stop_session().await {
                    Some(row) => format!("Session saved as {}", row.id),
                    None => "Session stopped (not saved)".to_string(),
                },
            },
            Command::History => self.history().await?,
            Command::SessionConfig(settings) => self.session_config(settings).await?,
            Command::ShowOwner => match self.sessions.owner().await {
                Some(owner) => format!("Owner: {}", owner),
                None => "No owner set".to_string(),
            },
            Command::SetOwner(owner) => {
                self.config.set_owner(owner.clone()).await?;
                self.sessions.set_owner(owner.clone()).await;
                match owner {
                    Some(owner) => format!("Sessions now belong to {}", owner),
                    None => "Owner cleared".to_string(),
                }
            }
            Command::Remote { base_url, api_key } => {
                let config = self.config.set_remote(base_url, api_key).await?;
                match config.remote.base_url {
                    Some(url) => format!("Remote store set to {} (restart to apply)", url),
                    None => "Remote store removed (restart to apply)".to_string(),
                }
            }
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
        };

        self.waker.notify_one();
        Ok(output)
    }

    async fn list_timers(&self) -> String {
        let timers = self.timers.lock().await;
        let visible = timers.visible_timers();
        if visible.is_empty() {
            return "No timers".to_string();
        }

        visible
            .iter()
            .map(|timer| {
                format!(
                    "{}  {:<24} {:<9} {}  {:>3.0}%",
                    short_id(&timer.id),
                    timer.name,
                    timer.state.as_str(),
                    timer.display_remaining(),
                    timer.progress() * 100.0
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Apply session settings to both the saved config and the live manager.
    async fn session_config(&self, settings: SessionSettings) -> Result<String> {
        let config = if settings == SessionSettings::default() {
            self.config.get().await
        } else {
            let config = self
                .config
                .update_session_config(
                    settings.focus_minutes.map(|m| m * 60),
                    settings.break_minutes.map(|m| m * 60),
                    settings.sound_enabled,
                    settings.notifications_enabled,
                    settings.completion_sound,
                )
                .await?;
            self.sessions.update_config(config.sessions.clone()).await;
            if settings.notifications_enabled == Some(true) {
                let permission = self.sessions.request_notification_permission();
                tracing::debug!("Notification permission: {:?}", permission);
            }
            config
        };

        let sessions = &config.sessions;
        Ok(format!(
            "focus {} min, break {} min, sound {} ({}), notifications {}",
            sessions.focus_duration / 60,
            sessions.break_duration / 60,
            on_off(sessions.sound_enabled),
            sessions.completion_sound,
            on_off(sessions.notifications_enabled)
        ))
    }

    async fn history(&self) -> Result<String> {
        let rows = self.sessions.load_history(None).await?;
        let summary = self.sessions.summary_today().await;

        let mut lines: Vec<String> = rows
            .iter()
            .map(|row| {
                let record = &row.record;
                format!(
                    "{}  {:<5} {:<11} {:>3} min  {} interruption(s)",
                    record.started_at.format("%Y-%m-%d %H:%M"),
                    record.kind.as_str(),
                    record.outcome.as_str(),
                    record.elapsed_seconds / 60,
                    record.interruption_count
                )
            })
            .collect();

        lines.push(format!(
            "Today: {} sessions, {} focus min, {:.0}% completed",
            summary.total_sessions,
            summary.focus_seconds / 60,
            summary.completion_rate() * 100.0
        ));
        Ok(lines.join("\n"))
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

/// Find the one timer whose id starts with `prefix`.
fn resolve(engine: &TimerEngine, prefix: &str) -> Result<String> {
    let mut matches = engine.timers().iter().filter(|t| t.id.starts_with(prefix));
    match (matches.next(), matches.next()) {
        (Some(timer), None) => Ok(timer.id.clone()),
        (None, _) => bail!("No timer matches '{}'", prefix),
        (Some(_), Some(_)) => bail!("'{}' matches more than one timer", prefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_timer_create() {
        assert_eq!(
            Command::parse("timer create 5 chime Quick Break").unwrap(),
            Some(Command::TimerCreate {
                minutes: Some(5),
                sound: AlertSound::Chime,
                name: "Quick Break".to_string(),
            })
        );

        assert_eq!(
            Command::parse("timer create Stretch").unwrap(),
            Some(Command::TimerCreate {
                minutes: None,
                sound: AlertSound::Gentle,
                name: "Stretch".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_timer_actions() {
        assert_eq!(
            Command::parse("timer start ab12").unwrap(),
            Some(Command::TimerStart("ab12".to_string()))
        );
        assert_eq!(
            Command::parse("timer mute off").unwrap(),
            Some(Command::TimerMute(Some(false)))
        );
        assert_eq!(
            Command::parse("timer mute").unwrap(),
            Some(Command::TimerMute(None))
        );
        assert!(Command::parse("timer start").is_err());
        assert!(Command::parse("timer mute loud").is_err());
    }

    #[test]
    fn test_parse_sessions() {
        assert_eq!(
            Command::parse("focus 25 task-7").unwrap(),
            Some(Command::Focus {
                minutes: Some(25),
                task_id: Some("task-7".to_string()),
            })
        );
        assert_eq!(
            Command::parse("BREAK").unwrap(),
            Some(Command::Break { minutes: None })
        );
        assert!(Command::parse("focus 0").is_err());
        assert!(Command::parse("focus 121").is_err());
        assert!(Command::parse("focus 307445734561825861").is_err());
        assert!(Command::parse("break 99999999999999999999").is_err());
        assert!(Command::parse("timer create 307445734561825861").is_err());
        assert_eq!(
            Command::parse("break 120").unwrap(),
            Some(Command::Break { minutes: Some(120) })
        );
        assert!(Command::parse("focus soon").is_err());
        assert!(Command::parse("dance").is_err());
    }

    #[test]
    fn test_parse_settings_and_owner() {
        assert_eq!(
            Command::parse("session focus 50 sound off chime bell").unwrap(),
            Some(Command::SessionConfig(SessionSettings {
                focus_minutes: Some(50),
                sound_enabled: Some(false),
                completion_sound: Some(AlertSound::Bell),
                ..Default::default()
            }))
        );
        assert_eq!(
            Command::parse("session").unwrap(),
            Some(Command::SessionConfig(SessionSettings::default()))
        );
        assert!(Command::parse("session focus").is_err());
        assert!(Command::parse("session focus 500").is_err());
        assert!(Command::parse("session volume 3").is_err());

        assert_eq!(
            Command::parse("timer show-completed off").unwrap(),
            Some(Command::TimerShowCompleted(Some(false)))
        );
        assert_eq!(Command::parse("owner").unwrap(), Some(Command::ShowOwner));
        assert_eq!(
            Command::parse("owner clear").unwrap(),
            Some(Command::SetOwner(None))
        );
        assert_eq!(
            Command::parse("remote off").unwrap(),
            Some(Command::Remote {
                base_url: None,
                api_key: None,
            })
        );
        assert!(Command::parse("remote https://x.example").is_err());
    }

    mod execute {
        use super::*;
        use restwell_core::models::SessionKind;
        use restwell_core::scheduler::ManualClock;
        use restwell_daemon::alerts::RecordingAlerts;
        use restwell_daemon::{EventManager, MemorySessionStore};
        use tempfile::TempDir;

        struct Fixture {
            console: Console,
            config: Arc<ConfigManager>,
            sessions: Arc<SessionManager>,
            clock: ManualClock,
            _dir: TempDir,
        }

        fn fixture() -> Fixture {
            let dir = TempDir::new().unwrap();
            let config = Arc::new(ConfigManager::with_dir(dir.path().to_path_buf()).unwrap());
            let clock = ManualClock::new();
            let events = Arc::new(EventManager::new());
            let alerts = RecordingAlerts::new().alerts();
            let timers = TimerEngine::new(Arc::new(clock.clone()), events.clone(), alerts.clone());
            let sessions = Arc::new(SessionManager::new(
                Arc::new(clock.clone()),
                Arc::new(MemorySessionStore::new()),
                events,
                alerts,
                Default::default(),
            ));
            let console = Console::new(
                Arc::new(Mutex::new(timers)),
                sessions.clone(),
                config.clone(),
                Arc::new(Notify::new()),
            );
            Fixture {
                console,
                config,
                sessions,
                clock,
                _dir: dir,
            }
        }

        async fn run(console: &Console, line: &str) -> String {
            let command = Command::parse(line).unwrap().unwrap();
            console.execute(command).await.unwrap()
        }

        #[tokio::test]
        async fn test_session_settings_reach_running_manager() {
            let f = fixture();
            run(&f.console, "owner user-9").await;
            assert_eq!(f.sessions.owner().await.as_deref(), Some("user-9"));

            let shown = run(&f.console, "session focus 40 sound off").await;
            assert!(shown.starts_with("focus 40 min"));
            let saved = f.config.get().await;
            assert_eq!(saved.owner_id.as_deref(), Some("user-9"));
            assert_eq!(saved.sessions.focus_duration, 2400);
            assert!(!saved.sessions.sound_enabled);

            run(&f.console, "focus").await;
            let active = f.sessions.active_session().await.unwrap();
            assert_eq!(active.kind, SessionKind::Focus);
            assert_eq!(active.planned_duration_seconds, 2400);
        }

        #[tokio::test]
        async fn test_show_completed_toggle_is_saved() {
            let f = fixture();
            run(&f.console, "timer create 1 Stretch").await;
            let id = f.console.timers.lock().await.timers()[0].id.clone();
            f.console.timers.lock().await.start(&id).unwrap();
            f.clock.advance_secs(60);
            f.console.timers.lock().await.run_due();

            assert!(run(&f.console, "timer list").await.contains("Stretch"));
            assert_eq!(
                run(&f.console, "timer show-completed off").await,
                "Hiding completed timers"
            );
            assert_eq!(run(&f.console, "timer list").await, "No timers");
            assert!(!f.config.get().await.timers.show_completed);
        }

        #[tokio::test]
        async fn test_remote_setting_is_validated() {
            let f = fixture();
            let command = Command::parse("remote example.com key").unwrap().unwrap();
            assert!(f.console.execute(command).await.is_err());

            run(&f.console, "remote https://db.example.co anon").await;
            let remote = f.config.get().await.remote;
            assert_eq!(remote.base_url.as_deref(), Some("https://db.example.co"));
            assert_eq!(remote.api_key.as_deref(), Some("anon"));
        }
    }
}
