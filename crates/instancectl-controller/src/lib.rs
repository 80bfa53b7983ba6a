//! Lifecycle controller for a single compute instance.
//!
//! Requests are validated, run against a [`ComputeProvider`] by the
//! [`InstanceOrchestrator`], and answered with an [`OperationResult`].
//! Long transitions are bounded by a poll-wait that honours cancellation,
//! a caller deadline and a hard ceiling.
//!
//! [`ComputeProvider`]: features::instance_lifecycle::repo::ComputeProvider
//! [`InstanceOrchestrator`]: features::instance_lifecycle::service::InstanceOrchestrator
//! [`OperationResult`]: shared::types::OperationResult

pub mod features;
pub mod server;
pub mod shared;

pub use shared::config::ControllerConfig;
pub use shared::error::{ControllerError, ControllerResult};
