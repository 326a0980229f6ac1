pub mod events;
pub mod machine;
pub mod manager;
pub mod store;

pub use events::{SessionEvent, SessionEventType};
pub use machine::{SessionError, SessionMachine, SessionProgress};
pub use manager::SessionManager;
pub use store::{MemorySessionStore, RestSessionStore, SessionStore, StoreError};
