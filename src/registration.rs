//! Agent registrations and the pending-round collection buffer.

use crate::types::{AccountId, BotUserId, MessageId};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The augmented context handed to an agent's `process_message`.
///
/// `round` and `accumulated_responses` are an explicit tagged struct rather than hidden fields on
/// the caller's context object, so the contract is visible in the type rather than in a naming
/// convention.
#[derive(Debug, Clone)]
pub struct FanOutContext {
    pub base_ctx: serde_json::Value,
    pub round: u32,
    pub accumulated_responses: Vec<String>,
}

/// What `get_fan_out_round_info` hands back to a caller holding a `FanOutContext`.
#[derive(Debug, Clone)]
pub struct FanOutRoundInfo {
    pub round: u32,
    pub accumulated_responses: Vec<String>,
}

/// Extracts the round metadata the executor attached to `ctx`.
pub fn get_fan_out_round_info(ctx: &FanOutContext) -> FanOutRoundInfo {
    FanOutRoundInfo {
        round: ctx.round,
        accumulated_responses: ctx.accumulated_responses.clone(),
    }
}

/// A one-argument async function invoked with the augmented context. It should return once the
/// agent has *accepted* the work — the actual reply, if any, arrives later through
/// `notify_fan_out_response`.
pub type ProcessMessageFn =
    Arc<dyn Fn(FanOutContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// One agent's participation in a pending or executing round.
#[derive(Clone)]
pub struct AgentRegistration {
    pub account_id: AccountId,
    pub bot_user_id: BotUserId,
    pub ctx: serde_json::Value,
    pub process_message: ProcessMessageFn,
    /// `true` iff this agent authored the triggering message — it sits out round 1.
    pub skip_first_round: bool,
}

impl std::fmt::Debug for AgentRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistration")
            .field("account_id", &self.account_id)
            .field("bot_user_id", &self.bot_user_id)
            .field("skip_first_round", &self.skip_first_round)
            .finish_non_exhaustive()
    }
}

/// An in-progress collection of registrations for a single trigger message, waiting for its
/// collection window to close (or queued to run once the current round drains).
pub struct PendingRound {
    pub trigger_message_id: MessageId,
    pub registrations: Vec<AgentRegistration>,
    pub collection_timer: Option<JoinHandle<()>>,
    pub mentioned_bot_ids: Vec<BotUserId>,
    seen_accounts: HashSet<AccountId>,
}

impl PendingRound {
    pub fn new(trigger_message_id: MessageId, mentioned_bot_ids: Vec<BotUserId>) -> Self {
        Self {
            trigger_message_id,
            registrations: Vec::new(),
            collection_timer: None,
            mentioned_bot_ids,
            seen_accounts: HashSet::new(),
        }
    }

    /// Adds `registration` unless its `account_id` is already present.
    pub fn add_registration(&mut self, registration: AgentRegistration) {
        if self.seen_accounts.insert(registration.account_id.clone()) {
            self.registrations.push(registration);
        }
    }
}

impl Drop for PendingRound {
    fn drop(&mut self) {
        if let Some(handle) = self.collection_timer.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for PendingRound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRound")
            .field("trigger_message_id", &self.trigger_message_id)
            .field("registrations", &self.registrations.len())
            .field("mentioned_bot_ids", &self.mentioned_bot_ids)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_process_fn() -> ProcessMessageFn {
        Arc::new(|_ctx| Box::pin(async { Ok(()) }))
    }

    fn registration(account: &str) -> AgentRegistration {
        AgentRegistration {
            account_id: AccountId::new(account),
            bot_user_id: BotUserId::new(format!("bot-{account}")),
            ctx: serde_json::json!({}),
            process_message: noop_process_fn(),
            skip_first_round: false,
        }
    }

    #[test]
    fn add_registration_deduplicates_by_account_id() {
        let mut pending = PendingRound::new(MessageId::new("m1"), vec![]);
        pending.add_registration(registration("a"));
        pending.add_registration(registration("a"));
        pending.add_registration(registration("b"));

        assert_eq!(pending.registrations.len(), 2);
    }
}
