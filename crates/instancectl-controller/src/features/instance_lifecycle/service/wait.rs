//! Bounded wait for a provider-side state transition.
//!
//! Polls `describe_instance` on a fixed interval until the target state is
//! observed, the ceiling is reached, or the caller's context ends. The ceiling
//! is a hard failure; the loop never keeps polling past it.

use super::context::OperationContext;
use crate::features::instance_lifecycle::repo::ComputeProvider;
use crate::shared::error::{ControllerError, ControllerResult};
use crate::shared::types::InstanceState;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Upper bound on any wait ceiling.
pub const MAX_WAIT: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl WaitConfig {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Block until `instance_id` is observed in `target`.
///
/// Returns the number of describe calls it took.
pub async fn wait_for_state(
    provider: &dyn ComputeProvider,
    ctx: &OperationContext,
    instance_id: &str,
    target: InstanceState,
    config: &WaitConfig,
) -> ControllerResult<u32> {
    let limit = config.timeout.min(MAX_WAIT);
    let ceiling = Instant::now() + limit;
    let mut polls: u32 = 0;

    loop {
        ctx.ensure_active(instance_id)?;

        let description = ctx
            .run(instance_id, provider.describe_instance(instance_id))
            .await?
            .map_err(|e| ControllerError::Provider {
                operation: "describe",
                instance_id: instance_id.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| ControllerError::InstanceNotFound(instance_id.to_string()))?;
        polls += 1;

        let state = description.state;
        if state == target {
            debug!(instance_id, %state, polls, "Target state reached");
            return Ok(polls);
        }
        if state.is_terminal() && !target.is_terminal() {
            return Err(ControllerError::UnexpectedState {
                instance_id: instance_id.to_string(),
                state,
                target,
            });
        }

        let now = Instant::now();
        if now >= ceiling {
            return Err(ControllerError::Timeout {
                instance_id: instance_id.to_string(),
                target,
                timeout: limit,
            });
        }

        debug!(instance_id, %state, %target, polls, "Still waiting for state change");

        let next_poll = (now + config.poll_interval).min(ceiling);
        tokio::select! {
            biased;
            reason = ctx.done() => {
                return Err(ControllerError::Cancelled {
                    instance_id: instance_id.to_string(),
                    reason,
                });
            }
            _ = sleep_until(next_poll) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::instance_lifecycle::repo::{MockComputeProvider, ProviderError};
    use crate::shared::error::CancelReason;
    use crate::shared::types::{InstanceDescription, StateChange};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Provider whose describe call hangs far longer than any test deadline.
    struct HangingDescribe;

    #[async_trait]
    impl ComputeProvider for HangingDescribe {
        async fn start_instance(&self, _: &str) -> Result<Option<StateChange>, ProviderError> {
            Ok(None)
        }

        async fn stop_instance(&self, _: &str) -> Result<Option<StateChange>, ProviderError> {
            Ok(None)
        }

        async fn describe_instance(
            &self,
            _: &str,
        ) -> Result<Option<InstanceDescription>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        async fn modify_instance_class(&self, _: &str, _: &str) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn described(state: InstanceState) -> Option<InstanceDescription> {
        Some(InstanceDescription {
            instance_id: "i-1".to_string(),
            state,
            instance_class: None,
        })
    }

    fn config() -> WaitConfig {
        WaitConfig::new(Duration::from_secs(5), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_once_target_observed() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut provider = MockComputeProvider::new();
        provider.expect_describe_instance().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(described(if n < 3 {
                InstanceState::Stopping
            } else {
                InstanceState::Stopped
            }))
        });

        let polls = wait_for_state(
            &provider,
            &OperationContext::new(),
            "i-1",
            InstanceState::Stopped,
            &config(),
        )
        .await
        .unwrap();

        assert_eq!(polls, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_ceiling() {
        let mut provider = MockComputeProvider::new();
        provider
            .expect_describe_instance()
            .returning(|_| Ok(described(InstanceState::Stopping)));

        let started = Instant::now();
        let err = wait_for_state(
            &provider,
            &OperationContext::new(),
            "i-1",
            InstanceState::Stopped,
            &config(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ControllerError::Timeout { timeout, .. } if timeout == Duration::from_secs(60)));
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_fixed_interval() {
        let mut provider = MockComputeProvider::new();
        provider
            .expect_describe_instance()
            .times(13)
            .returning(|_| Ok(described(InstanceState::Stopping)));

        // 60s ceiling at a 5s interval: t=0,5,...,60
        let result = wait_for_state(
            &provider,
            &OperationContext::new(),
            "i-1",
            InstanceState::Stopped,
            &config(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_instance_is_not_found() {
        let mut provider = MockComputeProvider::new();
        provider.expect_describe_instance().returning(|_| Ok(None));

        let err = wait_for_state(
            &provider,
            &OperationContext::new(),
            "i-1",
            InstanceState::Stopped,
            &config(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ControllerError::InstanceNotFound(id) if id == "i-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_describe_failure_is_wrapped() {
        let mut provider = MockComputeProvider::new();
        provider
            .expect_describe_instance()
            .returning(|_| Err(ProviderError::Api("RequestLimitExceeded".to_string())));

        let err = wait_for_state(
            &provider,
            &OperationContext::new(),
            "i-1",
            InstanceState::Stopped,
            &config(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to describe instance i-1: RequestLimitExceeded"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminated_instance_fails_fast() {
        let mut provider = MockComputeProvider::new();
        provider
            .expect_describe_instance()
            .times(1)
            .returning(|_| Ok(described(InstanceState::Terminated)));

        let err = wait_for_state(
            &provider,
            &OperationContext::new(),
            "i-1",
            InstanceState::Stopped,
            &config(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), "UNEXPECTED_STATE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_promptly() {
        let mut provider = MockComputeProvider::new();
        provider
            .expect_describe_instance()
            .returning(|_| Ok(described(InstanceState::Stopping)));

        let ctx = OperationContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = wait_for_state(&provider, &ctx, "i-1", InstanceState::Stopped, &config())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControllerError::Cancelled {
                reason: CancelReason::Cancelled,
                ..
            }
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_shorter_than_ceiling() {
        let mut provider = MockComputeProvider::new();
        provider
            .expect_describe_instance()
            .returning(|_| Ok(described(InstanceState::Stopping)));

        let ctx = OperationContext::new().with_timeout(Duration::from_secs(12));
        let err = wait_for_state(&provider, &ctx, "i-1", InstanceState::Stopped, &config())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControllerError::Cancelled {
                reason: CancelReason::DeadlineExceeded,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_context_never_polls() {
        let provider = MockComputeProvider::new();
        let ctx = OperationContext::new();
        ctx.cancel();

        let err = wait_for_state(&provider, &ctx, "i-1", InstanceState::Stopped, &config())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CANCELLED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_hanging_describe() {
        let ctx = OperationContext::new().with_timeout(Duration::from_secs(10));
        let started = Instant::now();

        let err = wait_for_state(&HangingDescribe, &ctx, "i-1", InstanceState::Stopped, &config())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControllerError::Cancelled {
                reason: CancelReason::DeadlineExceeded,
                ..
            }
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_hanging_describe() {
        let ctx = OperationContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = wait_for_state(&HangingDescribe, &ctx, "i-1", InstanceState::Stopped, &config())
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "CANCELLED");
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_timeout_is_clamped() {
        let mut provider = MockComputeProvider::new();
        provider
            .expect_describe_instance()
            .returning(|_| Ok(described(InstanceState::Stopping)));
        let config = WaitConfig::new(Duration::from_secs(3600), Duration::from_secs(u64::MAX));

        let started = Instant::now();
        let err = wait_for_state(&provider, &OperationContext::new(), "i-1", InstanceState::Stopped, &config)
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "TIMEOUT");
        assert_eq!(started.elapsed(), MAX_WAIT);
    }
}
