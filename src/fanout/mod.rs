//! The Fan-Out Coordinator: a per-channel scheduler that serializes independent chat agents'
//! reactions to shared messages. See `SPEC_FULL.md` for the full component design.

mod executor;
mod intake;
mod notifier;
mod registry;

pub use intake::RegisterFanOutAgentParams;
pub use notifier::NotifyFanOutResponseParams;
pub use registry::{ChannelState, ChannelStateRegistry};

use crate::clock::{Clock, SystemClock};
use crate::random::{RandomSource, StdRandomSource};
use crate::token::{default_silent_reply_predicate, SilentReplyPredicate};
use crate::types::ChannelId;
use std::sync::Arc;
use std::time::Duration;

/// Injected collaborators and tunables shared by every channel a coordinator drives.
pub struct CoordinatorDeps {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rng: Arc<dyn RandomSource>,
    pub(crate) silent_reply_predicate: SilentReplyPredicate,
    pub(crate) collection_window: Duration,
    pub(crate) response_timeout: Duration,
}

impl Default for CoordinatorDeps {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            rng: Arc::new(StdRandomSource::new()),
            silent_reply_predicate: default_silent_reply_predicate(),
            collection_window: crate::AGENT_COLLECTION_WINDOW,
            response_timeout: crate::AGENT_RESPONSE_TIMEOUT,
        }
    }
}

/// Builds a `CoordinatorDeps` with one or more collaborators swapped out, for tests or for a
/// host that wants its own randomness/clock/token-layer wiring.
pub struct CoordinatorDepsBuilder {
    deps: CoordinatorDeps,
}

impl CoordinatorDepsBuilder {
    pub fn new() -> Self {
        Self {
            deps: CoordinatorDeps::default(),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.deps.clock = clock;
        self
    }

    pub fn rng(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.deps.rng = rng;
        self
    }

    pub fn silent_reply_predicate(mut self, predicate: SilentReplyPredicate) -> Self {
        self.deps.silent_reply_predicate = predicate;
        self
    }

    pub fn collection_window(mut self, duration: Duration) -> Self {
        self.deps.collection_window = duration;
        self
    }

    pub fn response_timeout(mut self, duration: Duration) -> Self {
        self.deps.response_timeout = duration;
        self
    }

    pub fn build(self) -> CoordinatorDeps {
        self.deps
    }
}

impl Default for CoordinatorDepsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The coordinator's public handle. A host owns one of these (typically one per process) rather
/// than relying on module-level global state, per DESIGN.md.
pub struct FanOutCoordinator {
    deps: Arc<CoordinatorDeps>,
    registry: ChannelStateRegistry,
}

impl FanOutCoordinator {
    pub fn new(deps: CoordinatorDeps) -> Self {
        Self {
            deps: Arc::new(deps),
            registry: ChannelStateRegistry::new(),
        }
    }

    /// Registers one agent's participation for a message. Always returns `true` — see
    /// `RegisterFanOutAgentParams` and SPEC_FULL.md §4.2.
    pub async fn register_fan_out_agent(&self, params: RegisterFanOutAgentParams) -> bool {
        intake::register_fan_out_agent(&self.deps, &self.registry, params).await
    }

    /// Reports what an agent said (or that it stayed silent) for an outstanding round.
    ///
    /// Errors if `channel_id` has no registered state, or if there is no outstanding response
    /// wait for `account_id` on it (already timed out, already notified, or never invoked this
    /// round). Either case means the notify has no effect on the round in progress; the error is
    /// purely diagnostic for the caller.
    pub async fn notify_fan_out_response(&self, params: NotifyFanOutResponseParams) -> crate::error::Result<()> {
        notifier::notify_fan_out_response(&self.registry, params).await
    }

    /// `true` while a round is executing on `channel_id`. `false` for a channel with no
    /// registered state yet.
    pub async fn is_fan_out_round_active(&self, channel_id: &ChannelId) -> bool {
        match self.registry.get(channel_id).await {
            Some(state) => state.is_processing().await,
            None => false,
        }
    }

    /// The current round number for `channel_id` (`0` if no conversation is in progress, or if
    /// the channel has no registered state).
    pub async fn current_round(&self, channel_id: &ChannelId) -> crate::error::Result<u32> {
        match self.registry.get(channel_id).await {
            Some(state) => Ok(state.current_round().await),
            None => Err(crate::error::CoordinatorError::UnknownChannel {
                channel_id: channel_id.clone(),
            }),
        }
    }
}

impl Default for FanOutCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorDeps::default())
    }
}
