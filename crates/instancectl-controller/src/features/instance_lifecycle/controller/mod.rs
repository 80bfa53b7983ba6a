use crate::features::instance_lifecycle::service::{InstanceOrchestrator, OperationContext};
use crate::features::observability::controller::ObservabilityController;
use crate::shared::types::{Operation, OperationRequest, OperationResult, ValidatedOperation};
use instancectl_core::validate;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

const VALIDATION_LABEL: &str = "invalid";

/// Entry point for one lifecycle request: validate, run, shape the result.
///
/// Never fails; every error ends up in the returned [`OperationResult`].
pub struct LifecycleController {
    orchestrator: Arc<InstanceOrchestrator>,
    observability: Arc<ObservabilityController>,
}

impl LifecycleController {
    pub fn new(
        orchestrator: Arc<InstanceOrchestrator>,
        observability: Arc<ObservabilityController>,
    ) -> Self {
        Self {
            orchestrator,
            observability,
        }
    }

    pub async fn handle(&self, ctx: &OperationContext, request: OperationRequest) -> OperationResult {
        let span = info_span!(
            "invocation",
            invocation_id = %Uuid::new_v4(),
            action = %request.action,
            instance_id = %request.instance_id,
        );
        self.handle_request(ctx, request).instrument(span).await
    }

    async fn handle_request(&self, ctx: &OperationContext, request: OperationRequest) -> OperationResult {
        info!(
            instance_type = request.instance_type.as_deref().unwrap_or(""),
            "Received lifecycle request"
        );

        let validated = match validate(&request) {
            Ok(validated) => validated,
            Err(error) => {
                warn!(%error, "Request rejected");
                self.observability
                    .record_operation(VALIDATION_LABEL, "VALIDATION_ERROR", 0.0);
                let text = error.to_string();
                return OperationResult::failure(text.clone(), text);
            }
        };

        let action = validated.operation.action();
        let started = Instant::now();
        let outcome = {
            let _active = ActiveOperation::begin(&self.observability);
            self.orchestrator
                .execute(ctx, &validated.instance_id, &validated.operation)
                .await
        };
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(()) => {
                self.observability
                    .record_operation(action.as_str(), "success", elapsed);
                let message = success_message(&validated);
                info!(elapsed_secs = elapsed, "{message}");
                OperationResult::success(message)
            }
            Err(error) => {
                self.observability
                    .record_operation(action.as_str(), error.error_code(), elapsed);
                warn!(
                    %error,
                    error_code = error.error_code(),
                    elapsed_secs = elapsed,
                    "Lifecycle operation failed"
                );
                OperationResult::failure(
                    format!("Failed to execute action: {action}"),
                    error.to_string(),
                )
            }
        }
    }
}

/// Keeps the in-flight gauge accurate even if the request future is dropped.
struct ActiveOperation<'a> {
    observability: &'a ObservabilityController,
}

impl<'a> ActiveOperation<'a> {
    fn begin(observability: &'a ObservabilityController) -> Self {
        observability.operation_started();
        Self { observability }
    }
}

impl Drop for ActiveOperation<'_> {
    fn drop(&mut self) {
        self.observability.operation_finished();
    }
}

fn success_message(validated: &ValidatedOperation) -> String {
    let id = &validated.instance_id;
    match &validated.operation {
        Operation::Start => format!("Instance {id} started successfully"),
        Operation::Stop => format!("Instance {id} stopped successfully"),
        Operation::Restart => format!("Instance {id} restarted successfully"),
        Operation::ChangeClass { target_class } => {
            format!("Instance {id} class changed to {target_class} successfully")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::instance_lifecycle::repo::{
        ComputeProvider, InMemoryComputeProvider, MockComputeProvider, ProviderError,
    };
    use crate::features::instance_lifecycle::service::WaitConfig;
    use crate::shared::types::{InstanceDescription, InstanceState, StateChange};
    use std::time::Duration;

    const INSTANCE: &str = "i-1234567890abcdef0";

    fn build(provider: Arc<dyn ComputeProvider>) -> (LifecycleController, Arc<ObservabilityController>) {
        let observability = Arc::new(ObservabilityController::try_default().unwrap());
        let orchestrator = Arc::new(InstanceOrchestrator::new(
            provider,
            WaitConfig::new(Duration::from_secs(5), Duration::from_secs(300)),
        ));
        (
            LifecycleController::new(orchestrator, observability.clone()),
            observability,
        )
    }

    fn simulated(state: InstanceState) -> Arc<dyn ComputeProvider> {
        let provider = InMemoryComputeProvider::new(Duration::from_secs(8));
        provider.insert(INSTANCE, state, Some("t3.micro")).unwrap();
        Arc::new(provider)
    }

    async fn handle(controller: &LifecycleController, request: OperationRequest) -> OperationResult {
        controller.handle(&OperationContext::new(), request).await
    }

    #[tokio::test]
    async fn test_missing_instance_id() {
        // No expectations: any provider call would panic.
        let (controller, _) = build(Arc::new(MockComputeProvider::new()));

        let result = handle(&controller, OperationRequest::new("start", "")).await;
        assert!(!result.success);
        assert_eq!(result.message, "instance_id is required");
        assert_eq!(result.error, "instance_id is required");
    }

    #[tokio::test]
    async fn test_missing_action() {
        let (controller, _) = build(Arc::new(MockComputeProvider::new()));

        let result = handle(&controller, OperationRequest::new("", INSTANCE)).await;
        assert!(!result.success);
        assert_eq!(result.message, "action is required");
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let (controller, observability) = build(Arc::new(MockComputeProvider::new()));

        let result = handle(&controller, OperationRequest::new("reboot", INSTANCE)).await;
        assert!(!result.success);
        assert!(result.message.contains("unknown action"));
        assert!(result.error.starts_with("unknown action: reboot"));
        assert_eq!(
            observability.operation_count(VALIDATION_LABEL, "VALIDATION_ERROR"),
            1
        );
    }

    #[tokio::test]
    async fn test_change_class_without_instance_type() {
        let (controller, _) = build(Arc::new(MockComputeProvider::new()));

        let result = handle(&controller, OperationRequest::new("change_class", INSTANCE)).await;
        assert!(!result.success);
        assert!(result.error.contains("instance_type is required"));
    }

    #[tokio::test]
    async fn test_start_success_message() {
        let (controller, observability) = build(simulated(InstanceState::Stopped));

        let result = handle(&controller, OperationRequest::new("start", INSTANCE)).await;
        assert!(result.success, "{result:?}");
        assert_eq!(
            result.message,
            format!("Instance {INSTANCE} started successfully")
        );
        assert!(result.error.is_empty());
        assert_eq!(observability.operation_count("start", "success"), 1);
    }

    #[tokio::test]
    async fn test_start_already_running_is_success() {
        let (controller, _) = build(simulated(InstanceState::Running));

        let result = handle(&controller, OperationRequest::new("start", INSTANCE)).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_stop_success_message() {
        let (controller, _) = build(simulated(InstanceState::Running));

        let result = handle(&controller, OperationRequest::new("stop", INSTANCE)).await;
        assert!(result.success);
        assert!(result.message.contains(INSTANCE));
        assert!(result.message.contains("stopped"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_success_message() {
        let (controller, _) = build(simulated(InstanceState::Running));

        let result = handle(&controller, OperationRequest::new("restart", INSTANCE)).await;
        assert!(result.success, "{result:?}");
        assert_eq!(
            result.message,
            format!("Instance {INSTANCE} restarted successfully")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_class_success_message() {
        let (controller, _) = build(simulated(InstanceState::Running));

        let request = OperationRequest::new("change_class", INSTANCE).with_instance_type("t3.large");
        let result = handle(&controller, request).await;
        assert!(result.success, "{result:?}");
        assert_eq!(
            result.message,
            format!("Instance {INSTANCE} class changed to t3.large successfully")
        );
    }

    #[tokio::test]
    async fn test_provider_failure_shapes_result() {
        let mut provider = MockComputeProvider::new();
        provider
            .expect_stop_instance()
            .returning(|_| Err(ProviderError::Api("RequestLimitExceeded".to_string())));
        let (controller, observability) = build(Arc::new(provider));

        let result = handle(&controller, OperationRequest::new("stop", INSTANCE)).await;
        assert!(!result.success);
        assert_eq!(result.message, "Failed to execute action: stop");
        assert_eq!(
            result.error,
            format!("failed to stop instance {INSTANCE}: RequestLimitExceeded")
        );
        assert_eq!(observability.operation_count("stop", "PROVIDER_ERROR"), 1);
    }

    #[tokio::test]
    async fn test_not_found_shapes_result() {
        let (controller, _) = build(simulated(InstanceState::Running));

        let result = handle(&controller, OperationRequest::new("stop", "i-0missing")).await;
        assert!(!result.success);
        assert_eq!(result.error, "instance i-0missing not found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_timeout_reports_bound_and_never_starts() {
        let mut provider = MockComputeProvider::new();
        provider
            .expect_stop_instance()
            .times(1)
            .returning(|_| Ok(Some(StateChange::new(InstanceState::Running, InstanceState::Stopping))));
        provider.expect_describe_instance().returning(|id| {
            Ok(Some(InstanceDescription {
                instance_id: id.to_string(),
                state: InstanceState::Stopping,
                instance_class: None,
            }))
        });
        provider.expect_start_instance().never();
        let (controller, observability) = build(Arc::new(provider));

        let result = handle(&controller, OperationRequest::new("restart", INSTANCE)).await;
        assert!(!result.success);
        assert_eq!(result.message, "Failed to execute action: restart");
        assert!(result.error.contains("timed out after 300s"));
        assert_eq!(observability.operation_count("restart", "TIMEOUT"), 1);
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let (controller, _) = build(Arc::new(MockComputeProvider::new()));
        let ctx = OperationContext::new();
        ctx.cancel();

        let result = controller
            .handle(&ctx, OperationRequest::new("start", INSTANCE))
            .await;
        assert!(!result.success);
        assert!(result.error.contains("cancelled"));
    }

    #[tokio::test]
    async fn test_active_gauge_returns_to_zero() {
        let (controller, observability) = build(simulated(InstanceState::Stopped));
        handle(&controller, OperationRequest::new("start", INSTANCE)).await;

        let rendered = observability.render_metrics().unwrap();
        assert!(rendered.contains("instancectl_active_operations 0"));
    }
}
