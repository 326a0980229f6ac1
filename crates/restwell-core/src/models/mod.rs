pub mod config;
pub mod session;
pub mod timer;

pub use config::{Config, MAX_DURATION, DaemonConfig, RemoteConfig, SessionConfig, TimerConfig};
pub use session::{
    ActiveSession, NewSessionRecord, SessionKind, SessionOutcome, SessionRecord, SessionSummary,
    SessionTick,
};
pub use timer::{AlertSound, BreakTimer, TickOutcome, TimerState};
