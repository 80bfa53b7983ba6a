pub mod in_memory;

use crate::shared::types::{InstanceDescription, InstanceState, StateChange};
use async_trait::async_trait;
use thiserror::Error;

pub use in_memory::InMemoryComputeProvider;

/// Failure reported by the compute provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("instance {0} does not exist")]
    NotFound(String),
    #[error("instance {instance_id} is in state {state} and cannot accept this request")]
    IncorrectState {
        instance_id: String,
        state: InstanceState,
    },
    #[error("{0}")]
    Api(String),
}

/// Control API of the compute provider.
///
/// The orchestrator talks to the provider only through this trait; building
/// a concrete client (credentials, region, endpoint) happens outside.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Request a start. Returns the reported transition when the provider has one.
    async fn start_instance(&self, instance_id: &str)
        -> Result<Option<StateChange>, ProviderError>;

    /// Request a stop. Returns the reported transition when the provider has one.
    async fn stop_instance(&self, instance_id: &str) -> Result<Option<StateChange>, ProviderError>;

    /// Current observed state, or `None` when the provider knows no such instance.
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescription>, ProviderError>;

    /// Change the machine class. Providers require the instance to be stopped.
    async fn modify_instance_class(
        &self,
        instance_id: &str,
        instance_class: &str,
    ) -> Result<(), ProviderError>;
}
