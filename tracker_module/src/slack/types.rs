use serde::{Deserialize, Serialize};

pub const API_BASE: &str = "https://slack.com/api";
pub const OAUTH_AUTHORIZE_URL: &str = "https://slack.com/oauth/v2/authorize";

/// Single page of DM conversations per sync.
pub const CONVERSATIONS_PAGE_LIMIT: usize = 100;
/// Messages requested per history page.
pub const HISTORY_PAGE_LIMIT: usize = 100;
/// History pages fetched per conversation before giving up on the cursor.
pub const HISTORY_MAX_PAGES: usize = 2;

/// A conversation as returned by `conversations.list`. Only the fields the
/// tracker reads are modeled; for `types=im` the counterpart sits in `user`.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackConversation {
    pub id: String,
    pub user: Option<String>,
    pub is_im: Option<bool>,
}

/// A raw message from `conversations.history`.
///
/// Genuine user messages carry `type == "message"` and no `subtype`;
/// join/leave/bot noise is distinguished by those two fields.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackMessage {
    /// Provider timestamp, fractional seconds as a string ("1723056789.000200").
    pub ts: String,
    pub user: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub subtype: Option<String>,
}

/// User payload from `users.info`, kept whole so the dashboard receives the
/// same profile shape the provider returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    pub name: Option<String>,
    pub real_name: Option<String>,
    pub profile: Option<SlackUserProfile>,
}

impl SlackUser {
    /// Display name, preferring the full name over the handle.
    pub fn display_name(&self) -> String {
        self.real_name
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| self.id.clone())
    }

    pub fn avatar_url(&self) -> String {
        self.profile
            .as_ref()
            .and_then(|profile| profile.image_48.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackUserProfile {
    pub image_24: Option<String>,
    pub image_32: Option<String>,
    pub image_48: Option<String>,
    pub image_72: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMetadata {
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ConversationsListResponse {
    pub ok: bool,
    pub channels: Option<Vec<SlackConversation>>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ConversationsHistoryResponse {
    pub ok: bool,
    pub messages: Option<Vec<SlackMessage>>,
    pub response_metadata: Option<ResponseMetadata>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UsersInfoResponse {
    pub ok: bool,
    pub user: Option<SlackUser>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PostMessageResponse {
    pub ok: bool,
    pub error: Option<String>,
}

/// Response from `oauth.v2.access`. The top-level `access_token` is the bot
/// credential; the user credential arrives under `authed_user`.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthAccessResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub access_token: Option<String>,
    pub authed_user: Option<OAuthAuthedUser>,
    pub team: Option<OAuthTeam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthAuthedUser {
    pub id: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTeam {
    pub id: Option<String>,
    pub name: Option<String>,
}
