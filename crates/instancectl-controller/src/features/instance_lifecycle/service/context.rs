use crate::shared::error::{CancelReason, ControllerError, ControllerResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Caller-owned scope of a single invocation: a cancellation token and an
/// optional deadline. Every provider call and every wait checks it.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A timeout too large to represent as an instant leaves no deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Reason the context is no longer usable, if it has ended.
    pub fn end_reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn ensure_active(&self, instance_id: &str) -> ControllerResult<()> {
        match self.end_reason() {
            Some(reason) => Err(ControllerError::Cancelled {
                instance_id: instance_id.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the context ends first, in which
    /// case `fut` is dropped mid-flight.
    pub async fn run<F>(&self, instance_id: &str, fut: F) -> ControllerResult<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            reason = self.done() => Err(ControllerError::Cancelled {
                instance_id: instance_id.to_string(),
                reason,
            }),
            output = fut => Ok(output),
        }
    }

    /// Resolves once the token is cancelled or the deadline passes.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}
