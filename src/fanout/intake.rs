//! Registration intake: `register_fan_out_agent`.

use crate::fanout::executor::trigger_round;
use crate::fanout::registry::{ChannelState, ChannelStateRegistry};
use crate::registration::{AgentRegistration, PendingRound, ProcessMessageFn};
use crate::types::{AccountId, BotUserId, ChannelId, MessageId};
use crate::CoordinatorDeps;
use std::sync::Arc;

/// Inputs to `register_fan_out_agent`.
pub struct RegisterFanOutAgentParams {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub account_id: AccountId,
    pub bot_user_id: BotUserId,
    /// The bot identity that authored the triggering message, if any — used to compute
    /// `skip_first_round` by comparing against `bot_user_id`, never `account_id` (see
    /// DESIGN.md's open-question resolution).
    pub trigger_bot_user_id: Option<BotUserId>,
    pub mentioned_user_ids: Vec<BotUserId>,
    pub ctx: serde_json::Value,
    pub process_message: ProcessMessageFn,
    pub max_rounds: Option<u32>,
}

/// Registers one agent's participation for `params.message_id` on `params.channel_id`.
///
/// Always returns `true`: the coordinator owns processing of this event from here on, and the
/// caller must not independently react to it.
pub async fn register_fan_out_agent(
    deps: &Arc<CoordinatorDeps>,
    registry: &ChannelStateRegistry,
    params: RegisterFanOutAgentParams,
) -> bool {
    let state = registry
        .get_or_create(params.channel_id.clone(), params.max_rounds)
        .await;

    let is_trigger_agent = params.trigger_bot_user_id.as_ref() == Some(&params.bot_user_id);
    let registration = AgentRegistration {
        account_id: params.account_id.clone(),
        bot_user_id: params.bot_user_id.clone(),
        ctx: params.ctx,
        process_message: params.process_message,
        skip_first_round: is_trigger_agent,
    };

    let mut inner = state.inner.lock().await;
    match &mut inner.pending_round {
        Some(pending) if pending.trigger_message_id == params.message_id => {
            tracing::debug!(
                channel_id = %params.channel_id,
                account_id = %params.account_id,
                "joined existing pending round"
            );
            pending.add_registration(registration);
        }
        Some(pending) => {
            tracing::debug!(
                channel_id = %params.channel_id,
                old_message_id = %pending.trigger_message_id,
                new_message_id = %params.message_id,
                "discarding stale pending round for a newer message"
            );
            if let Some(handle) = pending.collection_timer.take() {
                handle.abort();
            }
            let mut fresh = PendingRound::new(params.message_id.clone(), params.mentioned_user_ids);
            fresh.add_registration(registration);
            fresh.collection_timer = Some(spawn_collection_timer(
                Arc::clone(deps),
                state.clone(),
                params.message_id,
            ));
            inner.pending_round = Some(fresh);
        }
        None => {
            tracing::debug!(
                channel_id = %params.channel_id,
                message_id = %params.message_id,
                account_id = %params.account_id,
                "opened a new pending round"
            );
            let mut fresh = PendingRound::new(params.message_id.clone(), params.mentioned_user_ids);
            fresh.add_registration(registration);
            fresh.collection_timer = Some(spawn_collection_timer(
                Arc::clone(deps),
                state.clone(),
                params.message_id,
            ));
            inner.pending_round = Some(fresh);
        }
    }

    true
}

/// Spawns the collection-window timer. Its expiry attempts to start the round; if a round is
/// already executing, `trigger_round`'s precondition check defers to whichever driver finishes
/// that round (see `fanout::executor::drive_rounds`).
fn spawn_collection_timer(
    deps: Arc<CoordinatorDeps>,
    state: Arc<ChannelState>,
    message_id: MessageId,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        deps.clock.sleep(deps.collection_window).await;
        tracing::debug!(channel_id = %state.channel_id, %message_id, "collection window closed");
        trigger_round(deps, state).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn noop_process_fn() -> ProcessMessageFn {
        Arc::new(|_ctx| Box::pin(async { Ok(()) }))
    }

    /// A collection window long enough that its timer never fires during a test, so intake
    /// behavior can be observed without any round actually executing.
    fn deps_with_a_long_collection_window() -> Arc<CoordinatorDeps> {
        Arc::new(
            crate::fanout::CoordinatorDepsBuilder::new()
                .collection_window(Duration::from_secs(3600))
                .build(),
        )
    }

    fn params(message_id: &str, account: &str, bot: &str) -> RegisterFanOutAgentParams {
        RegisterFanOutAgentParams {
            channel_id: ChannelId::new("c1"),
            message_id: MessageId::new(message_id),
            account_id: AccountId::new(account),
            bot_user_id: BotUserId::new(bot),
            trigger_bot_user_id: None,
            mentioned_user_ids: vec![],
            ctx: serde_json::json!({}),
            process_message: noop_process_fn(),
            max_rounds: None,
        }
    }

    #[tokio::test]
    async fn joining_the_same_pending_round_adds_a_second_registration() {
        let deps = deps_with_a_long_collection_window();
        let registry = ChannelStateRegistry::new();

        assert!(register_fan_out_agent(&deps, &registry, params("m1", "a", "botA")).await);
        assert!(register_fan_out_agent(&deps, &registry, params("m1", "b", "botB")).await);

        let state = registry.get(&ChannelId::new("c1")).await.unwrap();
        let inner = state.inner.lock().await;
        let pending = inner.pending_round.as_ref().unwrap();
        assert_eq!(pending.trigger_message_id, MessageId::new("m1"));
        assert_eq!(pending.registrations.len(), 2);
    }

    #[tokio::test]
    async fn a_newer_message_id_discards_the_stale_pending_round() {
        let deps = deps_with_a_long_collection_window();
        let registry = ChannelStateRegistry::new();

        assert!(register_fan_out_agent(&deps, &registry, params("m1", "a", "botA")).await);
        assert!(register_fan_out_agent(&deps, &registry, params("m2", "b", "botB")).await);

        let state = registry.get(&ChannelId::new("c1")).await.unwrap();
        let inner = state.inner.lock().await;
        let pending = inner.pending_round.as_ref().unwrap();
        assert_eq!(pending.trigger_message_id, MessageId::new("m2"));
        assert_eq!(pending.registrations.len(), 1);
        assert_eq!(pending.registrations[0].account_id, AccountId::new("b"));
    }

    #[tokio::test]
    async fn registering_while_a_round_is_already_executing_opens_a_fresh_pending_round() {
        let deps = deps_with_a_long_collection_window();
        let registry = ChannelStateRegistry::new();

        // Simulate a round already in flight: no pending round left to join (the executor took
        // it), `is_processing` still set.
        let state = registry.get_or_create(ChannelId::new("c1"), None).await;
        state.inner.lock().await.is_processing = true;

        assert!(register_fan_out_agent(&deps, &registry, params("m2", "b", "botB")).await);

        let inner = state.inner.lock().await;
        assert!(inner.is_processing, "must not touch the in-flight round's state");
        let pending = inner.pending_round.as_ref().unwrap();
        assert_eq!(pending.trigger_message_id, MessageId::new("m2"));
        assert_eq!(pending.registrations.len(), 1);
    }
}
