//! Restwell Daemon
//!
//! Runs break timers and focus/break sessions, driven by line commands on
//! stdin.

use anyhow::Result;
use clap::Parser;
use restwell_core::models::Config;
use restwell_core::scheduler::{Clock, SystemClock};
use restwell_core::storage::{init_data_dir, TimerStorage};
use restwell_daemon::alerts::AlertPlayer;
use restwell_daemon::events::{DaemonEvent, ToastLevel};
use restwell_daemon::timer::TimerEventType;
use restwell_daemon::{
    Alerts, ConfigManager, DesktopNotifier, Driver, EventManager, MemorySessionStore,
    RestSessionStore, SessionManager, SessionStore, TimerEngine,
};
use restwell_remote::{ApiKeyAuth, RestClient};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch, Mutex};

mod console;

use console::{Command, Console, HELP};

#[derive(Parser, Debug)]
#[command(name = "restwelld")]
#[command(about = "Restwell daemon - break timers and focus sessions", long_about = None)]
struct Args {
    /// Log level (defaults to the configured level)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Owner id sessions are recorded for
    #[arg(short, long)]
    owner: Option<String>,

    /// Directory for config, timers and logs
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (data_dir, config_manager) = match &args.data_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            (dir.clone(), ConfigManager::with_dir(dir.clone())?)
        }
        None => (init_data_dir()?, ConfigManager::new()?),
    };
    let config_manager = Arc::new(config_manager);
    let config = config_manager.get().await;

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.daemon.log_level.clone());
    init_logging(&data_dir, &log_level)?;

    tracing::info!("Restwell daemon starting...");
    tracing::info!("Data directory: {}", data_dir.display());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events = Arc::new(EventManager::new());
    let alerts = build_alerts(&config, &data_dir);

    let mut engine = TimerEngine::new(clock.clone(), events.clone(), alerts.clone())
        .with_storage(TimerStorage::new(data_dir.clone()))?;
    engine.set_muted(config.timers.muted);
    engine.set_show_completed(config.timers.show_completed);
    tracing::info!("Timer engine initialized ({} timers)", engine.timers().len());
    let timers = Arc::new(Mutex::new(engine));

    let store = build_store(&config)?;
    let sessions = Arc::new(SessionManager::new(
        clock.clone(),
        store,
        events.clone(),
        alerts,
        config.sessions.clone(),
    ));

    let owner = args.owner.clone().or(config.owner_id.clone());
    match &owner {
        Some(owner) => tracing::info!("Recording sessions for {}", owner),
        None => tracing::warn!("No owner configured; sessions cannot start"),
    }
    sessions.set_owner(owner).await;

    if config.sessions.notifications_enabled {
        let permission = sessions.request_notification_permission();
        tracing::debug!("Notification permission: {:?}", permission);
    }

    let printer = tokio::spawn(print_events(events.subscribe()));

    let driver = Driver::new(clock, timers.clone(), sessions.clone());
    let console = Console::new(timers, sessions, config_manager, driver.waker());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver_handle = tokio::spawn(driver.run(shutdown_rx));

    tracing::info!("Daemon ready");
    println!("{}", HELP);

    read_commands(&console).await?;
    tracing::info!("Shutting down...");

    let _ = shutdown_tx.send(true);
    if let Err(e) = driver_handle.await {
        tracing::error!("Driver task failed: {}", e);
    }
    printer.abort();

    Ok(())
}

fn init_logging(data_dir: &Path, log_level: &str) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    let log_file_path = data_dir.join("restwelld.log");
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    let stdout_writer = std::io::stdout.with_max_level(tracing::Level::INFO);
    let file_writer = log_file.with_max_level(tracing::Level::DEBUG);

    tracing_subscriber::fmt()
        .with_writer(stdout_writer.and(file_writer))
        .with_env_filter(log_level)
        .with_ansi(false)
        .init();

    Ok(())
}

fn build_alerts(config: &Config, data_dir: &Path) -> Alerts {
    let sounds_dir = config
        .timers
        .sounds_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.to_path_buf());

    #[cfg(feature = "audio")]
    let player: Arc<dyn AlertPlayer> =
        Arc::new(restwell_daemon::alerts::RodioPlayer::new(sounds_dir));
    #[cfg(not(feature = "audio"))]
    let player: Arc<dyn AlertPlayer> = {
        tracing::debug!(
            "Built without audio; assets under {} are unused",
            sounds_dir.display()
        );
        Arc::new(restwell_daemon::BellPlayer)
    };

    let notifier = Arc::new(DesktopNotifier::new(config.sessions.notifications_enabled));
    Alerts::new(player, notifier)
}

fn build_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    let remote = &config.remote;
    match (&remote.base_url, &remote.api_key) {
        (Some(base_url), Some(api_key)) => {
            let client = RestClient::new(base_url, ApiKeyAuth::new(api_key.clone()))?;
            tracing::info!("Sessions are stored at {}", base_url);
            Ok(Arc::new(RestSessionStore::new(
                client,
                remote.sessions_collection.clone(),
            )))
        }
        _ => {
            tracing::warn!("No remote store configured; sessions are kept in memory");
            Ok(Arc::new(MemorySessionStore::new()))
        }
    }
}

/// Read commands until `quit` or ctrl-c. A closed stdin leaves the daemon
/// running until ctrl-c.
async fn read_commands(console: &Console) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed; waiting for ctrl-c");
                    tokio::signal::ctrl_c().await?;
                    return Ok(());
                };

                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => return Ok(()),
                    Ok(Some(command)) => match console.execute(command).await {
                        Ok(output) if !output.is_empty() => println!("{}", output),
                        Ok(_) => {}
                        Err(e) => eprintln!("error: {}", e),
                    },
                    Ok(None) => {}
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn print_events(mut rx: broadcast::Receiver<DaemonEvent>) {
    loop {
        match rx.recv().await {
            Ok(DaemonEvent::Toast(toast)) => {
                let marker = match toast.level {
                    ToastLevel::Info => "info",
                    ToastLevel::Success => "done",
                    ToastLevel::Warning => "warn",
                    ToastLevel::Error => "error",
                };
                println!("[{}] {}: {}", marker, toast.title, toast.message);
            }
            Ok(DaemonEvent::Timer(event)) => {
                if let TimerEventType::Completed { name } = event.event_type {
                    tracing::debug!("Timer {} ({}) completed", event.timer_id, name);
                }
            }
            Ok(DaemonEvent::Session(_)) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Event printer skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
