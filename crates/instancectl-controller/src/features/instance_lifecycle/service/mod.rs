pub mod context;
pub mod wait;

use crate::features::instance_lifecycle::repo::{ComputeProvider, ProviderError};
use crate::shared::error::{ControllerError, ControllerResult};
use crate::shared::types::{InstanceState, Operation, StateChange};
use std::sync::Arc;
use tracing::info;

pub use context::OperationContext;
pub use wait::{wait_for_state, WaitConfig};

/// Drives a single instance through provider-observed lifecycle states
pub struct InstanceOrchestrator {
    provider: Arc<dyn ComputeProvider>,
    wait: WaitConfig,
}

impl InstanceOrchestrator {
    pub fn new(provider: Arc<dyn ComputeProvider>, wait: WaitConfig) -> Self {
        Self { provider, wait }
    }

    /// Run a validated operation
    pub async fn execute(
        &self,
        ctx: &OperationContext,
        instance_id: &str,
        operation: &Operation,
    ) -> ControllerResult<()> {
        match operation {
            Operation::Start => self.start(ctx, instance_id).await,
            Operation::Stop => self.stop(ctx, instance_id).await,
            Operation::Restart => self.restart(ctx, instance_id).await,
            Operation::ChangeClass { target_class } => {
                self.change_class(ctx, instance_id, target_class).await
            }
        }
    }

    /// Start an instance. A provider-side no-op counts as success.
    pub async fn start(&self, ctx: &OperationContext, instance_id: &str) -> ControllerResult<()> {
        ctx.ensure_active(instance_id)?;

        let change = ctx
            .run(instance_id, self.provider.start_instance(instance_id))
            .await?
            .map_err(|e| provider_failure("start", instance_id, e))?;
        log_transition(instance_id, change);

        Ok(())
    }

    /// Stop an instance. A provider-side no-op counts as success.
    pub async fn stop(&self, ctx: &OperationContext, instance_id: &str) -> ControllerResult<()> {
        ctx.ensure_active(instance_id)?;

        let change = ctx
            .run(instance_id, self.provider.stop_instance(instance_id))
            .await?
            .map_err(|e| provider_failure("stop", instance_id, e))?;
        log_transition(instance_id, change);

        Ok(())
    }

    /// Stop, wait for `stopped`, then start.
    ///
    /// Never starts the instance if the stop or the wait failed.
    pub async fn restart(&self, ctx: &OperationContext, instance_id: &str) -> ControllerResult<()> {
        self.stop_and_wait(ctx, instance_id).await?;

        info!(instance_id, "Starting instance");
        self.start(ctx, instance_id).await
    }

    /// Change the machine class, stopping the instance first if needed.
    ///
    /// The instance is left stopped afterwards.
    pub async fn change_class(
        &self,
        ctx: &OperationContext,
        instance_id: &str,
        target_class: &str,
    ) -> ControllerResult<()> {
        ctx.ensure_active(instance_id)?;

        let description = ctx
            .run(instance_id, self.provider.describe_instance(instance_id))
            .await?
            .map_err(|e| provider_failure("describe", instance_id, e))?
            .ok_or_else(|| ControllerError::InstanceNotFound(instance_id.to_string()))?;

        if description.state != InstanceState::Stopped {
            info!(
                instance_id,
                state = %description.state,
                "Instance must be stopped before its class can change, stopping it first"
            );
            self.stop_and_wait(ctx, instance_id).await?;
        }

        ctx.ensure_active(instance_id)?;
        ctx.run(
            instance_id,
            self.provider.modify_instance_class(instance_id, target_class),
        )
        .await?
        .map_err(|e| provider_failure("modify class of", instance_id, e))?;

        info!(
            instance_id,
            from = description.instance_class.as_deref().unwrap_or("unknown"),
            to = target_class,
            "Instance class changed"
        );

        Ok(())
    }

    async fn stop_and_wait(&self, ctx: &OperationContext, instance_id: &str) -> ControllerResult<()> {
        self.stop(ctx, instance_id).await?;

        info!(
            instance_id,
            timeout_secs = self.wait.timeout.as_secs(),
            "Waiting for instance to stop"
        );
        wait_for_state(
            self.provider.as_ref(),
            ctx,
            instance_id,
            InstanceState::Stopped,
            &self.wait,
        )
        .await?;

        Ok(())
    }
}

fn provider_failure(
    operation: &'static str,
    instance_id: &str,
    error: ProviderError,
) -> ControllerError {
    match error {
        ProviderError::NotFound(_) => ControllerError::InstanceNotFound(instance_id.to_string()),
        other => ControllerError::Provider {
            operation,
            instance_id: instance_id.to_string(),
            message: other.to_string(),
        },
    }
}

fn log_transition(instance_id: &str, change: Option<StateChange>) {
    if let Some(change) = change {
        info!(
            instance_id,
            previous = %change.previous,
            current = %change.current,
            "Instance state changing"
        );
    }
}
