//! Reply resolution for a single DM conversation.
//!
//! Given the raw message set of one conversation, every genuine outbound
//! message from the tracked user is annotated with whether the counterpart
//! replied afterwards and, if so, when the earliest such reply landed.

use chrono::{DateTime, Utc};

use crate::slack::types::SlackMessage;

/// Reply state computed for one outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOutbound {
    /// Provider-native timestamp string, kept verbatim for id derivation.
    pub ts: String,
    pub sent_at: DateTime<Utc>,
    pub text: String,
    pub has_reply: bool,
    pub reply_at: Option<DateTime<Utc>>,
}

/// Parse a Slack timestamp ("1723056789.000200") into an instant.
///
/// Seconds and the fractional part are parsed as integers so that two
/// messages within the same second keep their total order; float rounding
/// would collapse them.
pub fn parse_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = match ts.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (ts, ""),
    };
    let secs: i64 = secs.parse().ok()?;
    let micros: u32 = if frac.is_empty() {
        0
    } else {
        let mut digits: String = frac.chars().take(6).collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        while digits.len() < 6 {
            digits.push('0');
        }
        digits.parse().ok()?
    };
    DateTime::from_timestamp(secs, micros * 1_000)
}

/// A genuine user message: plain `message` type, no subtype. Joins, topic
/// changes and other system noise carry a subtype and are excluded.
fn is_genuine(message: &SlackMessage) -> bool {
    message.kind.as_deref() == Some("message") && message.subtype.is_none()
}

/// Annotate every outbound message in `messages` with its reply state.
///
/// A reply is any inbound message with a timestamp strictly greater than
/// the outbound one; `reply_at` is the earliest such timestamp. Inbound
/// timestamps are sorted once so each outbound lookup is a binary search.
/// Conversations with no outbound messages yield an empty vec.
pub fn resolve_conversation(
    messages: &[SlackMessage],
    tracked_user: &str,
    counterpart: &str,
) -> Vec<ResolvedOutbound> {
    let mut inbound: Vec<DateTime<Utc>> = messages
        .iter()
        .filter(|m| is_genuine(m) && m.user.as_deref() == Some(counterpart))
        .filter_map(|m| parse_slack_ts(&m.ts))
        .collect();
    inbound.sort_unstable();

    messages
        .iter()
        .filter(|m| is_genuine(m) && m.user.as_deref() == Some(tracked_user))
        .filter_map(|m| {
            let sent_at = parse_slack_ts(&m.ts)?;
            // first inbound strictly after this outbound message
            let idx = inbound.partition_point(|reply| *reply <= sent_at);
            let reply_at = inbound.get(idx).copied();
            Some(ResolvedOutbound {
                ts: m.ts.clone(),
                sent_at,
                text: m.text.clone().unwrap_or_default(),
                has_reply: reply_at.is_some(),
                reply_at,
            })
        })
        .collect()
}
