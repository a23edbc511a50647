//! The response notifier: the sole path by which external reply delivery tells the coordinator
//! what an agent said.

use crate::fanout::registry::ChannelStateRegistry;
use crate::types::{AccountId, ChannelId};

/// Inputs to `notify_fan_out_response`.
pub struct NotifyFanOutResponseParams {
    pub channel_id: ChannelId,
    pub account_id: AccountId,
    /// `None` signals explicit silence; distinct from the reply text merely matching the
    /// silent-reply sentinel (both are treated the same by the executor, but the notifier
    /// itself does not judge the text — that's the executor's job).
    pub response_text: Option<String>,
}

/// Resolves the outstanding response wait for `account_id` on `channel_id`, if any.
///
/// Late arrivals (the wait already timed out) and notifies for an unregistered channel never
/// panic or stall the round driver — the round already moved on without this agent — but they
/// are reported back to the caller as errors rather than swallowed, since a host that always gets
/// `Err(NoOutstandingWait { .. })` for a given agent likely has a bug worth surfacing.
pub async fn notify_fan_out_response(
    registry: &ChannelStateRegistry,
    params: NotifyFanOutResponseParams,
) -> crate::error::Result<()> {
    let Some(state) = registry.get(&params.channel_id).await else {
        tracing::debug!(
            channel_id = %params.channel_id,
            account_id = %params.account_id,
            "notify for unknown channel; dropped"
        );
        return Err(crate::error::CoordinatorError::UnknownChannel {
            channel_id: params.channel_id,
        });
    };

    let sender = {
        let mut callbacks = state.response_callbacks.lock().await;
        callbacks.remove(&params.account_id)
    };

    match sender {
        Some(tx) => {
            let _ = tx.send(params.response_text);
            Ok(())
        }
        None => {
            tracing::debug!(
                channel_id = %params.channel_id,
                account_id = %params.account_id,
                "late or unexpected notify; dropped"
            );
            Err(crate::error::CoordinatorError::NoOutstandingWait {
                channel_id: params.channel_id,
                account_id: params.account_id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_for_unknown_channel_is_reported_as_an_error() {
        let registry = ChannelStateRegistry::new();
        let result = notify_fan_out_response(
            &registry,
            NotifyFanOutResponseParams {
                channel_id: ChannelId::new("ghost"),
                account_id: AccountId::new("a"),
                response_text: Some("hi".into()),
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(crate::error::CoordinatorError::UnknownChannel { .. })
        ));
        // No panic, no state created.
        assert!(registry.get(&ChannelId::new("ghost")).await.is_none());
    }

    #[tokio::test]
    async fn notify_without_an_outstanding_wait_is_reported_as_an_error() {
        let registry = ChannelStateRegistry::new();
        let _state = registry.get_or_create(ChannelId::new("c1"), None).await;

        let result = notify_fan_out_response(
            &registry,
            NotifyFanOutResponseParams {
                channel_id: ChannelId::new("c1"),
                account_id: AccountId::new("a"),
                response_text: Some("hi".into()),
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(crate::error::CoordinatorError::NoOutstandingWait { .. })
        ));
    }

    #[tokio::test]
    async fn notify_resolves_an_outstanding_wait() {
        let registry = ChannelStateRegistry::new();
        let state = registry.get_or_create(ChannelId::new("c1"), None).await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        state
            .response_callbacks
            .lock()
            .await
            .insert(AccountId::new("a"), tx);

        let result = notify_fan_out_response(
            &registry,
            NotifyFanOutResponseParams {
                channel_id: ChannelId::new("c1"),
                account_id: AccountId::new("a"),
                response_text: Some("hi".into()),
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(rx.await.unwrap(), Some("hi".to_string()));
    }
}
