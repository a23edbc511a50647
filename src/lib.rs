//! Fan-out coordination for multi-agent chat channels.
//!
//! Multiple independent chat-agent processes can each receive the same inbound event
//! independently through their own event source. Left uncoordinated, they would all respond in
//! parallel to a stale view of the conversation. [`FanOutCoordinator`] collects those independent
//! registrations inside a short window, then releases the agents one at a time so each sees the
//! responses produced by those that went before it.
//!
//! See `SPEC_FULL.md` for the full component design and `DESIGN.md` for the grounding ledger.

pub mod agent;
pub mod clock;
pub mod conversation;
pub mod error;
pub mod fanout;
pub mod random;
pub mod registration;
pub mod token;
pub mod types;

use std::time::Duration;

pub use conversation::{ConversationLog, ConversationMessage};
pub use fanout::{CoordinatorDeps, CoordinatorDepsBuilder, FanOutCoordinator, NotifyFanOutResponseParams, RegisterFanOutAgentParams};
pub use registration::{get_fan_out_round_info, FanOutContext, FanOutRoundInfo};
pub use types::{AccountId, Author, BotUserId, ChannelId, MessageId};

/// How long a channel collects registrations for a single trigger message before running the
/// round, in milliseconds.
pub const AGENT_COLLECTION_WINDOW_MS: u64 = 1_500;
pub const AGENT_COLLECTION_WINDOW: Duration = Duration::from_millis(AGENT_COLLECTION_WINDOW_MS);

/// How long the executor waits for a registered agent to call `notify_fan_out_response` before
/// treating it as silent, in milliseconds.
pub const AGENT_RESPONSE_TIMEOUT_MS: u64 = 45_000;
pub const AGENT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(AGENT_RESPONSE_TIMEOUT_MS);

/// Default hard ceiling on a conversation's round count, absent a per-registration override.
pub const DEFAULT_MAX_ROUNDS: u32 = 20;

/// Guidance text agents are expected to prepend to their own prompts so they understand why
/// they're being invoked mid-conversation and what `accumulated_responses` means.
pub const FANOUT_GUIDANCE: &str = "\
You are one of several agents sharing this conversation. When you are invoked, you may be seeing \
new messages from the other agents as well as from the human who started the conversation — \
these are listed for you as accumulated responses from the round that just finished. Reply only \
if you have something to add; if you have nothing new to contribute, reply with the exact text \
`[no reply]` so the conversation can converge instead of looping.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_the_documented_values() {
        assert_eq!(AGENT_COLLECTION_WINDOW_MS, 1_500);
        assert_eq!(AGENT_RESPONSE_TIMEOUT_MS, 45_000);
        assert_eq!(DEFAULT_MAX_ROUNDS, 20);
    }
}
