//! Slash record - gates the outbound queue while a slash packet is unresolved

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// State of the slash packet at the head of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SlashRecord {
    /// No slash packet in flight
    #[default]
    Idle,
    /// Handed to the transport, result not yet recorded
    Sending,
    /// Sent, waiting for the provider's acknowledgement
    WaitingForReply { sent_at: DateTime<Utc> },
    /// Provider bounced the packet; resend once the block time passes `backoff_until`
    WaitingForBackoffAfterBounce { backoff_until: DateTime<Utc> },
}

impl SlashRecord {
    /// Whether the queue may send anything in a block at `now`
    pub fn sending_permitted(&self, now: DateTime<Utc>) -> bool {
        match self {
            SlashRecord::Idle => true,
            // A send that never recorded its outcome did not happen
            SlashRecord::Sending => true,
            SlashRecord::WaitingForReply { .. } => false,
            SlashRecord::WaitingForBackoffAfterBounce { backoff_until } => now > *backoff_until,
        }
    }

    pub fn on_send(now: DateTime<Utc>) -> Self {
        SlashRecord::WaitingForReply { sent_at: now }
    }

    /// Transition after a bounce; `None` if nothing was awaiting a reply
    pub fn on_bounce(&self, retry_delay: Duration) -> Option<Self> {
        match self {
            SlashRecord::WaitingForReply { sent_at } => Some(SlashRecord::WaitingForBackoffAfterBounce {
                backoff_until: sent_at
                    .checked_add_signed(retry_delay)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            }),
            _ => None,
        }
    }
}
