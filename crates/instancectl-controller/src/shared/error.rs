use crate::shared::types::InstanceState;
use instancectl_core::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while handling a lifecycle request
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("failed to {operation} instance {instance_id}: {message}")]
    Provider {
        operation: &'static str,
        instance_id: String,
        message: String,
    },
    #[error("instance {0} not found")]
    InstanceNotFound(String),
    #[error("timed out after {}s waiting for instance {instance_id} to become {target}", timeout.as_secs())]
    Timeout {
        instance_id: String,
        target: InstanceState,
        timeout: Duration,
    },
    #[error("operation on instance {instance_id} cancelled: {reason}")]
    Cancelled {
        instance_id: String,
        reason: CancelReason,
    },
    #[error("instance {instance_id} entered {state} while waiting for it to become {target}")]
    UnexpectedState {
        instance_id: String,
        state: InstanceState,
        target: InstanceState,
    },
}

/// Why a caller context stopped an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelReason {
    #[error("caller cancelled the request")]
    Cancelled,
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

impl ControllerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ControllerError::Validation(_) => "VALIDATION_ERROR",
            ControllerError::Provider { .. } => "PROVIDER_ERROR",
            ControllerError::InstanceNotFound(_) => "INSTANCE_NOT_FOUND",
            ControllerError::Timeout { .. } => "TIMEOUT",
            ControllerError::Cancelled { .. } => "CANCELLED",
            ControllerError::UnexpectedState { .. } => "UNEXPECTED_STATE",
        }
    }
}

pub type ControllerResult<T> = std::result::Result<T, ControllerError>;
