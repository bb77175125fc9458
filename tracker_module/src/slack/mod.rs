//! Minimal Slack Web API client for the DM tracker.
//!
//! One method per endpoint, bearer token supplied per call so a single
//! client serves every installed user. Responses are checked for the
//! envelope `ok` flag and API errors surface as [`SlackError::Api`].

pub mod types;

use tracing::warn;

use types::{
    ConversationsHistoryResponse, ConversationsListResponse, OAuthAccessResponse,
    PostMessageResponse, SlackConversation, SlackMessage, SlackUser, UsersInfoResponse, API_BASE,
    CONVERSATIONS_PAGE_LIMIT, HISTORY_MAX_PAGES, HISTORY_PAGE_LIMIT,
};

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack api error: {0}")]
    Api(String),
}

pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
}

impl SlackClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: API_BASE.to_string(),
        }
    }

    /// Point the client at a different API root (tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// List the direct-message conversations visible to `token`, bounded to
    /// a single page of [`CONVERSATIONS_PAGE_LIMIT`].
    pub async fn list_im_conversations(
        &self,
        token: &str,
    ) -> Result<Vec<SlackConversation>, SlackError> {
        let limit = CONVERSATIONS_PAGE_LIMIT.to_string();
        let resp: ConversationsListResponse = self
            .http
            .get(self.url("conversations.list"))
            .header("Authorization", format!("Bearer {token}"))
            .query(&[("types", "im"), ("limit", limit.as_str())])
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            return Err(api_error("conversations.list", resp.error));
        }
        Ok(resp.channels.unwrap_or_default())
    }

    /// Fetch a conversation's history no older than `oldest` (unix seconds),
    /// following the pagination cursor for at most [`HISTORY_MAX_PAGES`]
    /// pages.
    pub async fn conversation_history(
        &self,
        token: &str,
        channel_id: &str,
        oldest: i64,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        let oldest = oldest.to_string();
        let limit = HISTORY_PAGE_LIMIT.to_string();
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..HISTORY_MAX_PAGES {
            let mut params = vec![
                ("channel", channel_id),
                ("oldest", oldest.as_str()),
                ("limit", limit.as_str()),
            ];
            if let Some(ref c) = cursor {
                params.push(("cursor", c.as_str()));
            }

            let resp: ConversationsHistoryResponse = self
                .http
                .get(self.url("conversations.history"))
                .header("Authorization", format!("Bearer {token}"))
                .query(&params)
                .send()
                .await?
                .json()
                .await?;

            if !resp.ok {
                return Err(api_error("conversations.history", resp.error));
            }

            messages.extend(resp.messages.unwrap_or_default());
            cursor = resp
                .response_metadata
                .and_then(|meta| meta.next_cursor)
                .filter(|cursor| !cursor.is_empty());

            if cursor.is_none() {
                break;
            }
            if page + 1 == HISTORY_MAX_PAGES {
                warn!(
                    "history for {} truncated at {} page(s)",
                    channel_id, HISTORY_MAX_PAGES
                );
            }
        }

        Ok(messages)
    }

    /// Fetch one user's profile via `users.info`.
    pub async fn user_info(&self, token: &str, user_id: &str) -> Result<SlackUser, SlackError> {
        let resp: UsersInfoResponse = self
            .http
            .get(self.url("users.info"))
            .header("Authorization", format!("Bearer {token}"))
            .query(&[("user", user_id)])
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            return Err(api_error("users.info", resp.error));
        }
        resp.user
            .ok_or_else(|| SlackError::Api("users.info returned no user".to_string()))
    }

    /// Exchange an OAuth authorization code for access credentials.
    pub async fn oauth_access(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthAccessResponse, SlackError> {
        let resp: OAuthAccessResponse = self
            .http
            .post(self.url("oauth.v2.access"))
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            return Err(api_error("oauth.v2.access", resp.error));
        }
        Ok(resp)
    }

    /// Send a plain-text message to a channel or user id.
    pub async fn post_message(
        &self,
        token: &str,
        channel: &str,
        text: &str,
    ) -> Result<(), SlackError> {
        let resp: PostMessageResponse = self
            .http
            .post(self.url("chat.postMessage"))
            .header("Authorization", format!("Bearer {token}"))
            .json(&serde_json::json!({ "channel": channel, "text": text }))
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            return Err(api_error("chat.postMessage", resp.error));
        }
        Ok(())
    }
}

impl Default for SlackClient {
    fn default() -> Self {
        Self::new()
    }
}

fn api_error(method: &str, error: Option<String>) -> SlackError {
    SlackError::Api(format!(
        "{} returned ok=false: {}",
        method,
        error.unwrap_or_else(|| "unknown error".to_string())
    ))
}
