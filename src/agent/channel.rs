//! Channel: one agent's registered presence in a fan-out conversation.
//!
//! A persistent per-bot LLM conversation loop (message history, branch/worker spawning, a model
//! call) is out of scope for this crate. `Channel` instead wires a small injected
//! [`ReplyProducer`] into the coordinator's `process_message` callback, leaving reply production
//! itself to whatever a host plugs in.

use crate::fanout::{FanOutCoordinator, NotifyFanOutResponseParams, RegisterFanOutAgentParams};
use crate::registration::{FanOutContext, ProcessMessageFn};
use crate::types::{AccountId, BotUserId, ChannelId, MessageId};
use async_trait::async_trait;
use std::sync::Arc;

/// Stand-in for the external preflight/LLM pipeline. `Channel` calls this once per round it is
/// invoked for; the coordinator core never calls an LLM directly.
#[async_trait]
pub trait ReplyProducer: Send + Sync {
    /// Produces a reply given the augmented round context and the raw inbound text.
    /// `Ok(None)` means the agent decided to stay silent this round.
    async fn produce_reply(&self, ctx: &FanOutContext, user_text: &str) -> anyhow::Result<Option<String>>;
}

/// Per-agent configuration.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    /// Per-registration override of the channel's round ceiling; `None` keeps the coordinator's
    /// default (or whatever a sibling agent already set for this channel).
    pub max_rounds: Option<u32>,
}

/// One agent's registered presence in a fan-out channel.
#[derive(Clone)]
pub struct Channel {
    pub channel_id: ChannelId,
    pub account_id: AccountId,
    pub bot_user_id: BotUserId,
    config: ChannelConfig,
    coordinator: Arc<FanOutCoordinator>,
    reply_producer: Arc<dyn ReplyProducer>,
}

impl Channel {
    pub fn new(
        channel_id: ChannelId,
        account_id: AccountId,
        bot_user_id: BotUserId,
        config: ChannelConfig,
        coordinator: Arc<FanOutCoordinator>,
        reply_producer: Arc<dyn ReplyProducer>,
    ) -> Self {
        Self {
            channel_id,
            account_id,
            bot_user_id,
            config,
            coordinator,
            reply_producer,
        }
    }

    /// Registers this agent for an inbound message.
    ///
    /// One call per inbound event; delegates the actual turn-taking to the coordinator instead
    /// of running an LLM loop inline. Always returns `true`: the caller must not independently
    /// process this message.
    pub async fn handle_message(
        &self,
        message_id: MessageId,
        trigger_bot_user_id: Option<BotUserId>,
        mentioned_user_ids: Vec<BotUserId>,
        user_text: String,
    ) -> bool {
        let process_message = self.build_process_message_fn(user_text.clone());

        self.coordinator
            .register_fan_out_agent(RegisterFanOutAgentParams {
                channel_id: self.channel_id.clone(),
                message_id,
                account_id: self.account_id.clone(),
                bot_user_id: self.bot_user_id.clone(),
                trigger_bot_user_id,
                mentioned_user_ids,
                ctx: serde_json::json!({ "text": user_text }),
                process_message,
                max_rounds: self.config.max_rounds,
            })
            .await
    }

    /// Builds the closure the executor invokes once per round this agent is scheduled for. It
    /// accepts the work immediately (spawning the actual reply production as a background task)
    /// and reports the outcome later through `notify_fan_out_response` — exactly the two-step
    /// "accept, then separately deliver" shape an independently-scheduled LLM call has in
    /// production.
    fn build_process_message_fn(&self, user_text: String) -> ProcessMessageFn {
        let reply_producer = self.reply_producer.clone();
        let coordinator = self.coordinator.clone();
        let channel_id = self.channel_id.clone();
        let account_id = self.account_id.clone();

        Arc::new(move |ctx: FanOutContext| {
            let reply_producer = reply_producer.clone();
            let coordinator = coordinator.clone();
            let channel_id = channel_id.clone();
            let account_id = account_id.clone();
            let user_text = user_text.clone();

            Box::pin(async move {
                tokio::spawn(async move {
                    let response_text = match reply_producer.produce_reply(&ctx, &user_text).await {
                        Ok(text) => text,
                        Err(error) => {
                            tracing::error!(%error, %account_id, round = ctx.round, "reply producer failed");
                            None
                        }
                    };

                    if let Err(error) = coordinator
                        .notify_fan_out_response(NotifyFanOutResponseParams {
                            channel_id,
                            account_id: account_id.clone(),
                            response_text,
                        })
                        .await
                    {
                        tracing::debug!(%error, %account_id, round = ctx.round, "notify had no effect");
                    }
                });

                Ok(())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{CoordinatorDeps, CoordinatorDepsBuilder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct EchoReplyProducer {
        reply: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReplyProducer for EchoReplyProducer {
        async fn produce_reply(&self, _ctx: &FanOutContext, _user_text: &str) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn fast_test_deps() -> CoordinatorDeps {
        CoordinatorDepsBuilder::new()
            .clock(Arc::new(crate::clock::testing::InstantClock))
            .rng(Arc::new(crate::random::testing::IdentitySource))
            .collection_window(Duration::from_millis(1))
            .response_timeout(Duration::from_millis(50))
            .build()
    }

    #[tokio::test]
    async fn a_single_agent_registers_and_eventually_replies() {
        let coordinator = Arc::new(FanOutCoordinator::new(fast_test_deps()));
        let calls = Arc::new(AtomicUsize::new(0));
        let producer = Arc::new(EchoReplyProducer {
            reply: Some("ack".to_string()),
            calls: calls.clone(),
        });

        let channel = Channel::new(
            ChannelId::new("c1"),
            AccountId::new("a"),
            BotUserId::new("botA"),
            ChannelConfig::default(),
            coordinator.clone(),
            producer,
        );

        let accepted = channel
            .handle_message(MessageId::new("m1"), None, vec![], "Hello team".to_string())
            .await;
        assert!(accepted);

        // Give the collection window + spawned reply task a few scheduler turns to finish.
        for _ in 0..50 {
            tokio::task::yield_now().await;
            if calls.load(Ordering::SeqCst) > 0 && !coordinator.is_fan_out_round_active(&ChannelId::new("c1")).await {
                break;
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
