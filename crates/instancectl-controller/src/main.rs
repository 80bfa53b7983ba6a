use instancectl_controller::features::instance_lifecycle::controller::LifecycleController;
use instancectl_controller::features::instance_lifecycle::repo::InMemoryComputeProvider;
use instancectl_controller::features::instance_lifecycle::service::InstanceOrchestrator;
use instancectl_controller::features::observability::controller::ObservabilityController;
use instancectl_controller::server::{self, AppState};
use instancectl_controller::ControllerConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ControllerConfig::from_env()?;

    info!(
        poll_interval_secs = config.wait.poll_interval.as_secs_f64(),
        wait_timeout_secs = config.wait.timeout.as_secs_f64(),
        request_timeout_secs = config.request_timeout.map(|t| t.as_secs_f64()),
        "Starting instancectl controller"
    );

    let provider = Arc::new(InMemoryComputeProvider::with_seeds(
        config.transition_delay,
        &config.seed_instances,
    )?);
    if config.seed_instances.is_empty() {
        warn!("INSTANCECTL_SEED_INSTANCES is empty; every request will report instance not found");
    }
    for seed in &config.seed_instances {
        info!(
            instance_id = %seed.instance_id,
            state = %seed.state,
            instance_class = seed.instance_class.as_deref().unwrap_or(""),
            "Registered simulated instance"
        );
    }

    let observability = Arc::new(ObservabilityController::try_default()?);
    let orchestrator = Arc::new(InstanceOrchestrator::new(provider, config.wait));
    let lifecycle = Arc::new(LifecycleController::new(
        orchestrator,
        observability.clone(),
    ));

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        lifecycle,
        observability,
        shutdown.clone(),
        config.request_timeout,
    );

    let listener = TcpListener::bind(config.listen_addr).await?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, cancelling in-flight operations");
                shutdown.cancel();
            }
            Err(error) => warn!(%error, "Failed to listen for shutdown signal"),
        }
    });

    server::serve(listener, state).await?;

    info!("instancectl controller stopped");
    Ok(())
}
