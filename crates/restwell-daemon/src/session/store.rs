//! Remote audit trail for terminal sessions

use async_trait::async_trait;
use restwell_core::models::{NewSessionRecord, SessionRecord};
use restwell_remote::{Direction, Query, RestClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Remote store error: {0}")]
    Remote(#[from] restwell_remote::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert one terminal session and return the stored row.
    async fn insert(&self, record: &NewSessionRecord) -> Result<SessionRecord>;

    /// Most recent sessions for `owner_id`, newest first.
    async fn recent(&self, owner_id: &str, limit: usize) -> Result<Vec<SessionRecord>>;
}

/// Sessions kept in a remote collection.
pub struct RestSessionStore {
    client: RestClient,
    collection: String,
}

impl RestSessionStore {
    pub fn new(client: RestClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl SessionStore for RestSessionStore {
    async fn insert(&self, record: &NewSessionRecord) -> Result<SessionRecord> {
        let row: SessionRecord = self.client.insert(&self.collection, record).await?;
        Ok(row)
    }

    async fn recent(&self, owner_id: &str, limit: usize) -> Result<Vec<SessionRecord>> {
        let query = Query::new()
            .eq("owner_id", owner_id)
            .order("started_at", Direction::Desc)
            .limit(limit);
        let rows: Vec<SessionRecord> = self.client.select(&self.collection, &query).await?;
        Ok(rows)
    }
}

/// Process-local store. Used when no remote is configured, and in tests to
/// observe exactly which writes were issued.
#[derive(Default)]
pub struct MemorySessionStore {
    rows: Mutex<Vec<SessionRecord>>,
    inserts: Mutex<Vec<NewSessionRecord>>,
    failing: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following insert fail (it is still recorded as attempted).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every insert attempted so far, in order.
    pub fn inserts(&self) -> Vec<NewSessionRecord> {
        self.inserts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn rows(&self) -> Vec<SessionRecord> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, record: &NewSessionRecord) -> Result<SessionRecord> {
        self.inserts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());

        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert rejected".to_string()));
        }

        let row = SessionRecord {
            id: Uuid::new_v4().to_string(),
            record: record.clone(),
        };
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(row.clone());
        Ok(row)
    }

    async fn recent(&self, owner_id: &str, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut rows: Vec<SessionRecord> = self
            .rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|row| row.record.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.record.started_at.cmp(&a.record.started_at));
        rows.truncate(limit);
        Ok(rows)
    }
}
