//! Request validation.
//!
//! Runs before any provider call. Rules are checked in a fixed order and the
//! first failure is returned.

use crate::{Action, OperationRequest};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("unknown action: {0}. Valid actions are: start, stop, restart, change_class")]
    UnknownAction(String),
}

/// A request that passed validation, with the action resolved to what it
/// needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Restart,
    ChangeClass { target_class: String },
}

impl Operation {
    pub fn action(&self) -> Action {
        match self {
            Operation::Start => Action::Start,
            Operation::Stop => Action::Stop,
            Operation::Restart => Action::Restart,
            Operation::ChangeClass { .. } => Action::ChangeClass,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ChangeClass { target_class } => {
                write!(f, "change_class({target_class})")
            }
            other => f.write_str(other.action().as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOperation {
    pub instance_id: String,
    pub operation: Operation,
}

pub fn validate(request: &OperationRequest) -> Result<ValidatedOperation, ValidationError> {
    let instance_id = request.instance_id.trim();
    if instance_id.is_empty() {
        return Err(ValidationError::MissingField("instance_id"));
    }

    let action = request.action.trim();
    if action.is_empty() {
        return Err(ValidationError::MissingField("action"));
    }

    let operation = match action.parse::<Action>()? {
        Action::Start => Operation::Start,
        Action::Stop => Operation::Stop,
        Action::Restart => Operation::Restart,
        Action::ChangeClass => {
            let target_class = request
                .instance_type
                .as_deref()
                .map(str::trim)
                .filter(|class| !class.is_empty())
                .ok_or(ValidationError::MissingField("instance_type"))?;
            Operation::ChangeClass {
                target_class: target_class.to_string(),
            }
        }
    };

    Ok(ValidatedOperation {
        instance_id: instance_id.to_string(),
        operation,
    })
}
