//! Per-user DM sync: fetch conversations, resolve reply state, rebuild the
//! record set.
//!
//! Each run recomputes everything within the lookback window and replaces
//! the stored set wholesale. A failure listing conversations aborts the
//! sync; a failure inside one conversation is logged and that conversation
//! is skipped without touching its siblings.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::records::{DmRecord, RecordStore, RecordStoreError};
use crate::reply::resolve_conversation;
use crate::session::UserSession;
use crate::slack::{SlackClient, SlackError};

/// Trailing history window fetched per conversation.
pub const LOOKBACK_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Slack(#[from] SlackError),
    #[error(transparent)]
    Store(#[from] RecordStoreError),
}

/// Re-fetch the user's DM history and rebuild their record set from
/// scratch. Returns the freshly stored records, newest first.
pub async fn sync_user_dms(
    client: &SlackClient,
    session: &UserSession,
    store: &dyn RecordStore,
) -> Result<Vec<DmRecord>, SyncError> {
    let oldest = (Utc::now() - Duration::days(LOOKBACK_DAYS)).timestamp();
    let conversations = client.list_im_conversations(&session.access_token).await?;

    let mut records: Vec<DmRecord> = Vec::new();
    for conversation in &conversations {
        let counterpart = match conversation.user.as_deref() {
            Some(user) => user,
            None => continue,
        };
        match sync_conversation(client, session, &conversation.id, counterpart, oldest).await {
            Ok(mut conversation_records) => records.append(&mut conversation_records),
            Err(err) => {
                warn!("skipping conversation {}: {}", conversation.id, err);
            }
        }
    }

    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    store.replace(&session.user_id, records.clone())?;
    info!(
        "synced {} DM record(s) for user {}",
        records.len(),
        session.user_id
    );
    Ok(records)
}

/// Fetch and resolve one conversation into records.
async fn sync_conversation(
    client: &SlackClient,
    session: &UserSession,
    channel_id: &str,
    counterpart: &str,
    oldest: i64,
) -> Result<Vec<DmRecord>, SlackError> {
    let history = client
        .conversation_history(&session.access_token, channel_id, oldest)
        .await?;
    let profile = client
        .user_info(&session.access_token, counterpart)
        .await?;
    let recipient_name = profile.display_name();
    let recipient_avatar = profile.avatar_url();

    let resolved = resolve_conversation(&history, &session.user_id, counterpart);
    Ok(resolved
        .into_iter()
        .map(|outbound| DmRecord {
            id: format!("{}_{}", channel_id, outbound.ts),
            user_id: session.user_id.clone(),
            recipient_id: counterpart.to_string(),
            recipient_name: recipient_name.clone(),
            recipient_avatar: recipient_avatar.clone(),
            slack_link: permalink(&session.team.domain, channel_id, &outbound.ts),
            date: outbound.sent_at.date_naive(),
            message: outbound.text,
            timestamp: outbound.sent_at,
            has_reply: outbound.has_reply,
            reply_timestamp: outbound.reply_at,
            channel_id: channel_id.to_string(),
        })
        .collect())
}

/// Deep link into the provider's web UI: the archive URL drops the dot
/// from the timestamp.
fn permalink(team_domain: &str, channel_id: &str, ts: &str) -> String {
    let domain = if team_domain.is_empty() {
        "app"
    } else {
        team_domain
    };
    format!(
        "https://{}.slack.com/archives/{}/p{}",
        domain,
        channel_id,
        ts.replace('.', "")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MemoryRecordStore;
    use crate::session::TeamProfile;
    use crate::slack::types::SlackUser;
    use mockito::{Matcher, Server, ServerGuard};

    const ME: &str = "U_ME";

    fn session() -> UserSession {
        UserSession {
            user_id: ME.to_string(),
            team_id: "T1".to_string(),
            access_token: "xoxp-user".to_string(),
            bot_token: Some("xoxb-bot".to_string()),
            user: SlackUser {
                id: ME.to_string(),
                name: Some("me".to_string()),
                real_name: Some("Tracked User".to_string()),
                profile: None,
            },
            team: TeamProfile {
                id: "T1".to_string(),
                name: "Acme".to_string(),
                domain: "acme".to_string(),
            },
            created_at: Utc::now(),
        }
    }

    async fn mock_conversations(server: &mut ServerGuard, body: &str) {
        server
            .mock("GET", "/conversations.list")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;
    }

    async fn mock_history(server: &mut ServerGuard, channel: &str, status: usize, body: &str) {
        server
            .mock("GET", "/conversations.history")
            .match_query(Matcher::UrlEncoded("channel".into(), channel.into()))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;
    }

    async fn mock_user(server: &mut ServerGuard, user: &str, name: &str) {
        let body = format!(
            r#"{{"ok":true,"user":{{"id":"{user}","name":"{name}","real_name":"{name}","profile":{{"image_24":null,"image_32":null,"image_48":"https://avatars.test/{user}_48.png","image_72":null}}}}}}"#
        );
        server
            .mock("GET", "/users.info")
            .match_query(Matcher::UrlEncoded("user".into(), user.into()))
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn sync_builds_records_with_reply_state() {
        let mut server = Server::new_async().await;
        mock_conversations(
            &mut server,
            r#"{"ok":true,"channels":[{"id":"D1","user":"U_A","is_im":true}]}"#,
        )
        .await;
        mock_history(
            &mut server,
            "D1",
            200,
            r#"{"ok":true,"messages":[
                {"ts":"1723056900.000100","user":"U_A","text":"sure","type":"message"},
                {"ts":"1723056800.000100","user":"U_ME","text":"lunch?","type":"message"},
                {"ts":"1723056700.000100","user":"U_ME","text":"hey","type":"message"}
            ]}"#,
        )
        .await;
        mock_user(&mut server, "U_A", "Ada Lovelace").await;

        let client = SlackClient::with_base_url(server.url());
        let store = MemoryRecordStore::new();
        let records = sync_user_dms(&client, &session(), &store).await.unwrap();

        assert_eq!(records.len(), 2);
        // newest first
        assert_eq!(records[0].id, "D1_1723056800.000100");
        assert_eq!(records[1].id, "D1_1723056700.000100");
        assert!(records.iter().all(|r| r.has_reply));
        assert_eq!(records[0].recipient_name, "Ada Lovelace");
        assert_eq!(
            records[0].recipient_avatar,
            "https://avatars.test/U_A_48.png"
        );
        assert_eq!(
            records[0].slack_link,
            "https://acme.slack.com/archives/D1/p1723056800000100"
        );
        assert_eq!(store.get(ME).unwrap(), records);
    }

    #[tokio::test]
    async fn one_failing_conversation_does_not_abort_the_rest() {
        let mut server = Server::new_async().await;
        mock_conversations(
            &mut server,
            r#"{"ok":true,"channels":[
                {"id":"D1","user":"U_A","is_im":true},
                {"id":"D2","user":"U_B","is_im":true},
                {"id":"D3","user":"U_C","is_im":true}
            ]}"#,
        )
        .await;
        mock_history(
            &mut server,
            "D1",
            200,
            r#"{"ok":true,"messages":[{"ts":"1723056700.000100","user":"U_ME","text":"one","type":"message"}]}"#,
        )
        .await;
        mock_history(
            &mut server,
            "D2",
            200,
            r#"{"ok":false,"error":"channel_not_found"}"#,
        )
        .await;
        mock_history(
            &mut server,
            "D3",
            200,
            r#"{"ok":true,"messages":[{"ts":"1723056800.000100","user":"U_ME","text":"three","type":"message"}]}"#,
        )
        .await;
        mock_user(&mut server, "U_A", "Ada").await;
        mock_user(&mut server, "U_C", "Grace").await;

        let client = SlackClient::with_base_url(server.url());
        let store = MemoryRecordStore::new();
        let records = sync_user_dms(&client, &session(), &store).await.unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["D3_1723056800.000100", "D1_1723056700.000100"]);
    }

    #[tokio::test]
    async fn conversations_list_failure_aborts_the_sync() {
        let mut server = Server::new_async().await;
        mock_conversations(&mut server, r#"{"ok":false,"error":"invalid_auth"}"#).await;

        let client = SlackClient::with_base_url(server.url());
        let store = MemoryRecordStore::new();
        let result = sync_user_dms(&client, &session(), &store).await;
        assert!(matches!(result, Err(SyncError::Slack(_))));
        // nothing stored
        assert!(store.get(ME).unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_is_idempotent_for_an_unchanged_upstream() {
        let mut server = Server::new_async().await;
        mock_conversations(
            &mut server,
            r#"{"ok":true,"channels":[{"id":"D1","user":"U_A","is_im":true}]}"#,
        )
        .await;
        mock_history(
            &mut server,
            "D1",
            200,
            r#"{"ok":true,"messages":[
                {"ts":"1723056900.000100","user":"U_A","text":"yes","type":"message"},
                {"ts":"1723056800.000100","user":"U_ME","text":"ping","type":"message"}
            ]}"#,
        )
        .await;
        mock_user(&mut server, "U_A", "Ada").await;

        let client = SlackClient::with_base_url(server.url());
        let store = MemoryRecordStore::new();
        let first = sync_user_dms(&client, &session(), &store).await.unwrap();
        let second = sync_user_dms(&client, &session(), &store).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.get(ME).unwrap(), second);
    }

    #[tokio::test]
    async fn system_messages_produce_no_records() {
        let mut server = Server::new_async().await;
        mock_conversations(
            &mut server,
            r#"{"ok":true,"channels":[{"id":"D1","user":"U_A","is_im":true}]}"#,
        )
        .await;
        mock_history(
            &mut server,
            "D1",
            200,
            r#"{"ok":true,"messages":[
                {"ts":"1723056800.000100","user":"U_ME","text":"left","type":"message","subtype":"channel_leave"}
            ]}"#,
        )
        .await;
        mock_user(&mut server, "U_A", "Ada").await;

        let client = SlackClient::with_base_url(server.url());
        let store = MemoryRecordStore::new();
        let records = sync_user_dms(&client, &session(), &store).await.unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn permalink_falls_back_to_app_domain() {
        assert_eq!(
            permalink("", "D1", "1723056800.000100"),
            "https://app.slack.com/archives/D1/p1723056800000100"
        );
    }
}
