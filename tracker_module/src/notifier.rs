//! Digest delivery back to the tracked user as a Slack DM.

use tracing::info;

use crate::digest::DailyDigest;
use crate::session::UserSession;
use crate::slack::{SlackClient, SlackError};

/// Character cap for message previews inside the digest bullets.
pub const MESSAGE_PREVIEW_CHARS: usize = 50;

/// Render the fixed digest template.
pub fn format_digest_message(digest: &DailyDigest) -> String {
    let conversations = if digest.top_conversations.is_empty() {
        "No messages sent today.".to_string()
    } else {
        let bullets = digest
            .top_conversations
            .iter()
            .map(|dm| {
                let glyph = if dm.has_reply { "✅" } else { "❌" };
                format!(
                    "• {}: \"{}\" {}",
                    dm.recipient_name,
                    truncate_preview(&dm.message),
                    glyph
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("🔥 *Top conversations:*\n{bullets}")
    };

    format!(
        "📊 *Daily DM Digest - {}*\n\n\
         📤 Messages sent: {}\n\
         💬 Replies received: {}\n\
         📈 Reply rate: {}%\n\n\
         {}\n\n\
         Keep up the great communication! 🚀",
        digest.date, digest.total_sent, digest.total_replies, digest.reply_rate, conversations
    )
}

/// Deliver a digest to the user's own DM.
///
/// Uses the bot credential when the installation has one, falling back to
/// the user token. Send failures propagate to the caller; deciding whether
/// a missing session is fatal is the caller's business.
pub async fn send_digest(
    client: &SlackClient,
    session: &UserSession,
    digest: &DailyDigest,
) -> Result<(), SlackError> {
    let token = session
        .bot_token
        .as_deref()
        .unwrap_or(&session.access_token);
    let text = format_digest_message(digest);
    client.post_message(token, &session.user_id, &text).await?;
    info!("digest sent to user {}", session.user_id);
    Ok(())
}

fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= MESSAGE_PREVIEW_CHARS {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(MESSAGE_PREVIEW_CHARS).collect();
        format!("{prefix}...")
    }
}
