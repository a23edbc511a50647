//! The channel state registry: one `ChannelState` per channel, created lazily and kept alive for
//! the process lifetime.

use crate::conversation::ConversationLog;
use crate::registration::PendingRound;
use crate::types::{AccountId, ChannelId};
use crate::DEFAULT_MAX_ROUNDS;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// The mutable fields a round driver mutates as a single unit. Kept separate from
/// `response_callbacks` so a round in progress (holding `inner`'s lock only briefly between
/// awaits) never blocks `notify_fan_out_response`, which only ever touches the callback map.
pub(crate) struct ChannelInner {
    pub current_round: u32,
    pub is_processing: bool,
    pub pending_round: Option<PendingRound>,
    pub previous_round_responders: HashSet<AccountId>,
    pub round_limit: u32,
    pub conversation: ConversationLog,
}

/// Singleton per-channel state. Cheap to clone (it's handed around as `Arc<ChannelState>`).
pub struct ChannelState {
    pub channel_id: ChannelId,
    pub(crate) inner: Mutex<ChannelInner>,
    pub(crate) response_callbacks: Mutex<HashMap<AccountId, oneshot::Sender<Option<String>>>>,
}

impl ChannelState {
    fn new(channel_id: ChannelId, round_limit: u32) -> Self {
        Self {
            channel_id,
            inner: Mutex::new(ChannelInner {
                current_round: 0,
                is_processing: false,
                pending_round: None,
                previous_round_responders: HashSet::new(),
                round_limit,
                conversation: ConversationLog::new(),
            }),
            response_callbacks: Mutex::new(HashMap::new()),
        }
    }

    /// `true` while a round executor owns this channel.
    pub async fn is_processing(&self) -> bool {
        self.inner.lock().await.is_processing
    }

    /// The current round number (`0` when no conversation is in progress).
    pub async fn current_round(&self) -> u32 {
        self.inner.lock().await.current_round
    }
}

impl std::fmt::Debug for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelState")
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}

/// Process-wide map from channel id to its `ChannelState`. Only this registry may create
/// entries; only the executor for a given channel may mutate a state's fields once created.
#[derive(Default)]
pub struct ChannelStateRegistry {
    channels: Mutex<HashMap<ChannelId, Arc<ChannelState>>>,
}

impl ChannelStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds or creates the state for `channel_id`. If `max_rounds` is supplied, it overwrites
    /// the channel's `round_limit` even on an existing entry — the last-seen value wins.
    pub async fn get_or_create(&self, channel_id: ChannelId, max_rounds: Option<u32>) -> Arc<ChannelState> {
        let mut channels = self.channels.lock().await;
        let state = channels
            .entry(channel_id.clone())
            .or_insert_with(|| Arc::new(ChannelState::new(channel_id, DEFAULT_MAX_ROUNDS)))
            .clone();

        if let Some(requested) = max_rounds {
            let clamped = requested.max(1);
            if clamped != requested {
                tracing::warn!(%clamped, requested, "max_rounds override clamped to a minimum of 1");
            }
            state.inner.lock().await.round_limit = clamped;
        }

        state
    }

    /// A non-creating lookup, used by the notifier and by `is_fan_out_round_active` — neither
    /// should conjure up state for a channel nobody has registered for yet.
    pub async fn get(&self, channel_id: &ChannelId) -> Option<Arc<ChannelState>> {
        self.channels.lock().await.get(channel_id).cloned()
    }
}
