//! Outbound DM records and the per-user record store.
//!
//! Each sync fully replaces a user's record set; ids stay stable across
//! syncs because they derive from the conversation id and the provider
//! timestamp rather than any locally generated sequence.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One direct message the tracked user sent, annotated with reply state.
///
/// Field names follow the wire format the dashboard consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmRecord {
    /// `"{channel_id}_{ts}"` — unique per record, stable across syncs.
    pub id: String,
    pub user_id: String,
    pub recipient_id: String,
    pub recipient_name: String,
    pub recipient_avatar: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub has_reply: bool,
    pub reply_timestamp: Option<DateTime<Utc>>,
    /// Deep link back to the message in the provider's web UI.
    pub slack_link: String,
    /// UTC calendar day of `timestamp`, the digest grouping key.
    pub date: NaiveDate,
    pub channel_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("record store backend error: {0}")]
    Backend(String),
}

/// Per-user record storage. Sync replaces a user's set wholesale; there is
/// no merge or append path. Implementations must be safe to share across
/// request handlers and batch jobs.
pub trait RecordStore: Send + Sync {
    /// Current record set for a user, empty if none was ever stored.
    fn get(&self, user_id: &str) -> Result<Vec<DmRecord>, RecordStoreError>;

    /// Atomically swap the stored set for a user.
    fn replace(&self, user_id: &str, records: Vec<DmRecord>) -> Result<(), RecordStoreError>;

    /// Drop a user's records entirely (session revoked).
    fn delete(&self, user_id: &str) -> Result<(), RecordStoreError>;
}

/// The reference in-memory store: a mutex-guarded map keyed by user id.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, Vec<DmRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, user_id: &str) -> Result<Vec<DmRecord>, RecordStoreError> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        Ok(records.get(user_id).cloned().unwrap_or_default())
    }

    fn replace(&self, user_id: &str, new_records: Vec<DmRecord>) -> Result<(), RecordStoreError> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        records.insert(user_id.to_string(), new_records);
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<(), RecordStoreError> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        records.remove(user_id);
        Ok(())
    }
}
