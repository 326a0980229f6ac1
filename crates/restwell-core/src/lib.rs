pub mod error;
pub mod models;
pub mod scheduler;
pub mod storage;

pub use error::{Error, Result};
