//! Daily engagement digest, derived on demand from a user's record set.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::records::DmRecord;

/// Conversations shown in a delivered digest message.
pub const DIGEST_TOP_CONVERSATIONS: usize = 5;
/// Conversations shown in the on-demand preview.
pub const PREVIEW_TOP_CONVERSATIONS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyDigest {
    pub date: NaiveDate,
    pub total_sent: usize,
    pub total_replies: usize,
    /// Rounded percentage in `[0, 100]`; 0 when nothing was sent.
    pub reply_rate: u32,
    pub top_conversations: Vec<DmRecord>,
}

/// Reduce a record set to the digest for one calendar day.
///
/// `records` is expected in store order (newest first); the top
/// conversations are simply the first `top_limit` records of that day, no
/// re-sorting happens here.
pub fn build_digest(records: &[DmRecord], date: NaiveDate, top_limit: usize) -> DailyDigest {
    let day: Vec<&DmRecord> = records.iter().filter(|r| r.date == date).collect();
    let total_sent = day.len();
    let total_replies = day.iter().filter(|r| r.has_reply).count();
    let reply_rate = if total_sent == 0 {
        0
    } else {
        ((total_replies as f64 / total_sent as f64) * 100.0).round() as u32
    };

    DailyDigest {
        date,
        total_sent,
        total_replies,
        reply_rate,
        top_conversations: day.into_iter().take(top_limit).cloned().collect(),
    }
}
