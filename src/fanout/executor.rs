//! The round executor: orders agents, invokes each one's processor, awaits its response, and
//! decides whether to chain into another round or terminate.

use crate::fanout::registry::ChannelState;
use crate::random::fisher_yates_shuffle;
use crate::registration::{AgentRegistration, FanOutContext, PendingRound};
use crate::types::{AccountId, Author, BotUserId};
use crate::CoordinatorDeps;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;

const TRIGGER_PLACEHOLDER: &str = "(trigger message)";

/// Whether the channel has more work queued immediately after the round that just finished.
enum RoundOutcome {
    Chained,
    Terminated,
}

/// Runs rounds back to back until the conversation terminates. Safe to call redundantly — every
/// invocation defers to whichever call already owns the channel's `is_processing` flag.
pub(crate) async fn drive_rounds(deps: Arc<CoordinatorDeps>, state: Arc<ChannelState>) {
    loop {
        match run_single_round(&deps, &state).await {
            Some(RoundOutcome::Chained) => continue,
            Some(RoundOutcome::Terminated) | None => break,
        }
    }
}

/// Entry point for the collection timer: attempt to drive this channel's rounds. A no-op if
/// another driver already owns the channel, or if the pending round it was arming for was
/// discarded before the timer fired.
pub(crate) async fn trigger_round(deps: Arc<CoordinatorDeps>, state: Arc<ChannelState>) {
    drive_rounds(deps, state).await;
}

/// Runs exactly one round, or returns `None` if there was nothing to do (another driver already
/// owns the channel, or the pending round was drained/discarded already).
async fn run_single_round(deps: &Arc<CoordinatorDeps>, state: &Arc<ChannelState>) -> Option<RoundOutcome> {
    let (round, registrations, mentioned_bot_ids) = {
        let mut inner = state.inner.lock().await;
        if inner.is_processing {
            return None;
        }
        let mut pending = inner.pending_round.take()?;
        inner.is_processing = true;
        inner.current_round += 1;
        let round = inner.current_round;

        if round == 1 {
            inner.conversation.reset();
            let trigger_text = first_registration_trigger_text(&pending.registrations)
                .unwrap_or_else(|| TRIGGER_PLACEHOLDER.to_string());
            inner
                .conversation
                .append(deps.clock.as_ref(), Author::Human, trigger_text);
        }

        let registrations = std::mem::take(&mut pending.registrations);
        let mentioned_bot_ids = std::mem::take(&mut pending.mentioned_bot_ids);
        (round, registrations, mentioned_bot_ids)
    };

    tracing::info!(channel_id = %state.channel_id, round, agents = registrations.len(), "round started");

    let mut has_new = Vec::new();
    let mut skipped: HashSet<AccountId> = HashSet::new();
    let previous_round_responders = {
        let inner = state.inner.lock().await;
        let tail = inner.conversation.tail_index();
        for registration in &registrations {
            let watermark = inner.conversation.watermark_for(&registration.account_id);
            if tail > watermark {
                has_new.push(registration.clone());
            } else {
                skipped.insert(registration.account_id.clone());
            }
        }
        inner.previous_round_responders.clone()
    };

    let ordered = order_agents(round, has_new, &mentioned_bot_ids, &previous_round_responders, deps.rng.as_ref());

    let mut responders_this_round: HashSet<AccountId> = HashSet::new();

    for registration in ordered {
        if registration.skip_first_round && round == 1 {
            skipped.insert(registration.account_id.clone());
            continue;
        }

        let augmented_ctx = {
            let mut inner = state.inner.lock().await;
            let watermark = inner.conversation.watermark_for(&registration.account_id);
            let accumulated_responses = inner.conversation.accumulated_since(watermark);
            // Advance the watermark before invoking so the agent's own forthcoming reply is
            // never re-delivered to it.
            let tail = inner.conversation.tail_index();
            inner.conversation.set_watermark(&registration.account_id, tail);
            FanOutContext {
                base_ctx: registration.ctx.clone(),
                round,
                accumulated_responses,
            }
        };

        let response = invoke_and_await(deps, state, &registration, augmented_ctx).await;

        let responded = response
            .as_deref()
            .map(|text| !text.trim().is_empty() && !(deps.silent_reply_predicate)(text))
            .unwrap_or(false);

        if responded {
            let text = response.expect("responded implies Some");
            let mut inner = state.inner.lock().await;
            inner
                .conversation
                .append(deps.clock.as_ref(), Author::Agent(registration.account_id.clone()), text);
            let new_tail = inner.conversation.tail_index();
            inner.conversation.set_watermark(&registration.account_id, new_tail);
            responders_this_round.insert(registration.account_id.clone());
        }
    }

    let any_responded = !responders_this_round.is_empty();
    tracing::info!(
        channel_id = %state.channel_id,
        round,
        responders = responders_this_round.len(),
        skipped = skipped.len(),
        "round finished"
    );

    finish_round(state, registrations, mentioned_bot_ids, responders_this_round, any_responded).await
}

/// Calls the agent's processor, then awaits (and times out) its response.
async fn invoke_and_await(
    deps: &Arc<CoordinatorDeps>,
    state: &Arc<ChannelState>,
    registration: &AgentRegistration,
    ctx: FanOutContext,
) -> Option<String> {
    let (tx, rx) = oneshot::channel();
    {
        let mut callbacks = state.response_callbacks.lock().await;
        callbacks.insert(registration.account_id.clone(), tx);
    }

    if let Err(error) = (registration.process_message)(ctx).await {
        tracing::error!(
            channel_id = %state.channel_id,
            account_id = %registration.account_id,
            %error,
            "agent processor failed; treating as no response"
        );
    }

    tokio::select! {
        result = rx => result.unwrap_or(None),
        _ = deps.clock.sleep(deps.response_timeout) => {
            let mut callbacks = state.response_callbacks.lock().await;
            if callbacks.remove(&registration.account_id).is_some() {
                tracing::warn!(
                    channel_id = %state.channel_id,
                    account_id = %registration.account_id,
                    "agent response timed out"
                );
            }
            None
        }
    }
}

/// Round chaining and termination (spec §4.5). Runs under the channel's lock so a
/// concurrently-arriving registration cannot interleave mid-decision.
async fn finish_round(
    state: &Arc<ChannelState>,
    registrations: Vec<AgentRegistration>,
    mentioned_bot_ids: Vec<BotUserId>,
    responders_this_round: HashSet<AccountId>,
    any_responded: bool,
) -> Option<RoundOutcome> {
    let mut inner = state.inner.lock().await;
    inner.is_processing = false;

    if inner.current_round >= inner.round_limit || !any_responded {
        tracing::info!(
            channel_id = %state.channel_id,
            round = inner.current_round,
            round_limit = inner.round_limit,
            any_responded,
            "conversation terminated"
        );
        inner.current_round = 0;
        inner.previous_round_responders.clear();
        return if inner.pending_round.is_some() {
            Some(RoundOutcome::Chained)
        } else {
            Some(RoundOutcome::Terminated)
        };
    }

    inner.previous_round_responders = responders_this_round;

    if inner.pending_round.is_some() {
        // A new external message arrived mid-round; it keeps the in-progress current_round
        // counter rather than starting a fresh conversation (see DESIGN.md).
        return Some(RoundOutcome::Chained);
    }

    let tail = inner.conversation.tail_index();
    let has_unseen = registrations
        .iter()
        .any(|r| inner.conversation.watermark_for(&r.account_id) < tail);

    if has_unseen {
        let mut chained = PendingRound::new(
            crate::types::MessageId::new(format!("chained-round-{}", inner.current_round + 1)),
            mentioned_bot_ids,
        );
        for registration in registrations {
            chained.add_registration(registration);
        }
        inner.pending_round = Some(chained);
        Some(RoundOutcome::Chained)
    } else {
        inner.current_round = 0;
        inner.previous_round_responders.clear();
        Some(RoundOutcome::Terminated)
    }
}

/// Reads the trigger text from the first registration's context (`ctx["text"]`).
fn first_registration_trigger_text(registrations: &[AgentRegistration]) -> Option<String> {
    registrations
        .first()?
        .ctx
        .get("text")?
        .as_str()
        .map(str::to_string)
}

/// First-round agents are ordered mentioned-first (in mention order), then the rest shuffled.
/// Chained rounds put the previous round's responders first (shuffled among themselves), then
/// the rest shuffled.
fn order_agents(
    round: u32,
    has_new: Vec<AgentRegistration>,
    mentioned_bot_ids: &[BotUserId],
    previous_round_responders: &HashSet<AccountId>,
    rng: &dyn crate::random::RandomSource,
) -> Vec<AgentRegistration> {
    if round == 1 {
        let mut mentioned = Vec::new();
        let mut rest = has_new;
        for bot_id in mentioned_bot_ids {
            if let Some(pos) = rest.iter().position(|r| &r.bot_user_id == bot_id) {
                mentioned.push(rest.remove(pos));
            }
        }
        fisher_yates_shuffle(&mut rest, rng);
        mentioned.into_iter().chain(rest).collect()
    } else {
        let mut prioritized = Vec::new();
        let mut rest = Vec::new();
        for registration in has_new {
            if previous_round_responders.contains(&registration.account_id) {
                prioritized.push(registration);
            } else {
                rest.push(registration);
            }
        }
        fisher_yates_shuffle(&mut prioritized, rng);
        fisher_yates_shuffle(&mut rest, rng);
        prioritized.into_iter().chain(rest).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::testing::IdentitySource;
    use crate::types::AccountId;

    fn registration(account: &str, bot: &str) -> AgentRegistration {
        AgentRegistration {
            account_id: AccountId::new(account),
            bot_user_id: BotUserId::new(bot),
            ctx: serde_json::json!({}),
            process_message: std::sync::Arc::new(|_ctx| Box::pin(async { Ok(()) })),
            skip_first_round: false,
        }
    }

    #[test]
    fn first_round_orders_mentioned_agents_first_in_mention_order() {
        let a = registration("a", "botA");
        let b = registration("b", "botB");
        let c = registration("c", "botC");
        let mentioned = vec![BotUserId::new("botB"), BotUserId::new("botA")];

        let ordered = order_agents(1, vec![a, b, c], &mentioned, &HashSet::new(), &IdentitySource);

        assert_eq!(ordered[0].bot_user_id, BotUserId::new("botB"));
        assert_eq!(ordered[1].bot_user_id, BotUserId::new("botA"));
        assert_eq!(ordered[2].bot_user_id, BotUserId::new("botC"));
    }

    #[test]
    fn chained_round_orders_previous_responders_first() {
        let a = registration("a", "botA");
        let b = registration("b", "botB");
        let mut previous = HashSet::new();
        previous.insert(AccountId::new("b"));

        let ordered = order_agents(2, vec![a, b], &[], &previous, &IdentitySource);

        assert_eq!(ordered[0].account_id, AccountId::new("b"));
        assert_eq!(ordered[1].account_id, AccountId::new("a"));
    }

    #[test]
    fn trigger_text_falls_back_to_placeholder_when_missing() {
        let registrations = vec![registration("a", "botA")];
        assert_eq!(first_registration_trigger_text(&registrations), None);
    }

    #[test]
    fn trigger_text_reads_from_first_registration_ctx() {
        let mut reg = registration("a", "botA");
        reg.ctx = serde_json::json!({"text": "Hello team"});
        assert_eq!(
            first_registration_trigger_text(&[reg]),
            Some("Hello team".to_string())
        );
    }
}
