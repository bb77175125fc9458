//! OAuth installation sessions, one per tracked user.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::slack::types::SlackUser;

/// Team identity captured at install time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamProfile {
    pub id: String,
    pub name: String,
    /// Workspace subdomain used for permalinks; "app" when unknown.
    pub domain: String,
}

/// An authenticated installation: user identity plus provider credentials.
///
/// The tracker never refreshes or validates these tokens itself; expiry or
/// revocation surfaces as a fetch failure on the next sync.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: String,
    pub team_id: String,
    pub access_token: String,
    pub bot_token: Option<String>,
    pub user: SlackUser,
    pub team: TeamProfile,
    pub created_at: DateTime<Utc>,
}

/// In-memory session map keyed by user id.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, UserSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save or refresh a user's installation.
    pub fn upsert(&self, session: UserSession) {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        sessions.insert(session.user_id.clone(), session);
    }

    pub fn get(&self, user_id: &str) -> Option<UserSession> {
        let sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        sessions.get(user_id).cloned()
    }

    /// Remove an installation; returns whether one existed.
    pub fn remove(&self, user_id: &str) -> bool {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        sessions.remove(user_id).is_some()
    }

    /// Snapshot of all installed user ids, for the batch jobs.
    pub fn user_ids(&self) -> Vec<String> {
        let sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        sessions.keys().cloned().collect()
    }
}
