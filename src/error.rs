//! Crate-wide error type.

use crate::types::{AccountId, ChannelId};
use thiserror::Error;

/// Errors the coordinator can report to a caller.
///
/// Per-round and per-turn failures (a processor erroring, a timeout) are never surfaced as
/// `CoordinatorError` — they are logged and treated as "no response" so one misbehaving agent
/// never stalls the others. This enum only covers misuse of the public API.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("channel {channel_id} has no registered state")]
    UnknownChannel { channel_id: ChannelId },

    #[error("agent {account_id} has no outstanding response wait on channel {channel_id}")]
    NoOutstandingWait {
        channel_id: ChannelId,
        account_id: AccountId,
    },
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
