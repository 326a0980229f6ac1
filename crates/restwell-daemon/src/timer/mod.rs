pub mod engine;
pub mod events;


pub use engine::{TimerEngine, TimerEngineError, TICK_PERIOD};
pub use events::{TimerEvent, TimerEventType};
