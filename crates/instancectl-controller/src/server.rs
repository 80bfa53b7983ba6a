//! HTTP invocation boundary.
//!
//! `POST /invoke` takes an operation request and always answers 200 with an
//! operation result; success or failure is carried in the body.

use crate::features::instance_lifecycle::controller::LifecycleController;
use crate::features::instance_lifecycle::service::OperationContext;
use crate::features::observability::controller::ObservabilityController;
use crate::shared::types::{OperationRequest, OperationResult};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    lifecycle: Arc<LifecycleController>,
    observability: Arc<ObservabilityController>,
    shutdown: CancellationToken,
    request_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(
        lifecycle: Arc<LifecycleController>,
        observability: Arc<ObservabilityController>,
        shutdown: CancellationToken,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            lifecycle,
            observability,
            shutdown,
            request_timeout,
        }
    }

    /// Fresh context per invocation, cancelled when the server shuts down.
    fn operation_context(&self) -> OperationContext {
        let ctx = OperationContext::with_token(self.shutdown.child_token());
        match self.request_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/invoke", post(invoke_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the shutdown token is cancelled.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Accepting lifecycle requests");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn invoke_handler(State(state): State<AppState>, body: Bytes) -> Json<OperationResult> {
    let request = match serde_json::from_slice::<OperationRequest>(&body) {
        Ok(request) => request,
        Err(error) => {
            warn!(%error, "Malformed invocation payload");
            return Json(OperationResult::failure(
                "Invalid request payload",
                error.to_string(),
            ));
        }
    };

    let ctx = state.operation_context();
    Json(state.lifecycle.handle(&ctx, request).await)
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.observability.render_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(error) => (StatusCode::INTERNAL_SERVER_ERROR, error).into_response(),
    }
}
