pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use validation::{validate, Operation, ValidatedOperation, ValidationError};

/// Lifecycle actions accepted at the invocation boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Stop,
    Restart,
    #[serde(alias = "change_type")]
    ChangeClass,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Start,
        Action::Stop,
        Action::Restart,
        Action::ChangeClass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::ChangeClass => "change_class",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "restart" => Ok(Action::Restart),
            // Older callers still send the pre-rename spelling.
            "change_class" | "change_type" => Ok(Action::ChangeClass),
            other => Err(ValidationError::UnknownAction(other.to_string())),
        }
    }
}

/// Lifecycle phase reported by the compute provider.
///
/// Only ever observed, never derived locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
        }
    }

    /// States from which the instance can never come back.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceState::ShuttingDown | InstanceState::Terminated)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(InstanceState::Pending),
            "running" => Ok(InstanceState::Running),
            "stopping" => Ok(InstanceState::Stopping),
            "stopped" => Ok(InstanceState::Stopped),
            "shutting-down" => Ok(InstanceState::ShuttingDown),
            "terminated" => Ok(InstanceState::Terminated),
            other => Err(format!("unknown instance state: {other}")),
        }
    }
}

/// Transition reported by a start or stop call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub previous: InstanceState,
    pub current: InstanceState,
}

impl StateChange {
    pub fn new(previous: InstanceState, current: InstanceState) -> Self {
        Self { previous, current }
    }
}

/// Snapshot returned by a describe call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub instance_id: String,
    pub state: InstanceState,
    pub instance_class: Option<String>,
}

/// Request payload as it arrives from the invoking layer.
///
/// Every key is optional on the wire so that a missing field is reported by
/// [`validate`] rather than by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
}

impl OperationRequest {
    pub fn new(action: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            instance_id: instance_id.into(),
            instance_type: None,
        }
    }

    pub fn with_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = Some(instance_type.into());
        self
    }
}

/// Response payload handed back to the invoking layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub error: String,
}

impl OperationResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: String::new(),
        }
    }

    /// A failure always carries a non-empty error; the message stands in when
    /// the caller has no separate detail.
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        let message = message.into();
        let mut error = error.into();
        if error.is_empty() {
            error = message.clone();
        }
        Self {
            success: false,
            message,
            error,
        }
    }
}
