//! DesignBridge API /v1: REST endpoints
pub mod handlers;
pub mod metrics;
pub mod middleware;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use designbridge_core::WorkflowRunner;

use crate::metrics::Metrics;

/// Shared by every request. The runner is built outside the async runtime
/// because its HTTP clients are blocking.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<WorkflowRunner>,
    pub artifacts_dir: Arc<PathBuf>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(runner: WorkflowRunner, artifacts_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self {
            runner: Arc::new(runner),
            artifacts_dir: Arc::new(artifacts_dir.into()),
            metrics: Arc::new(Metrics::new()?),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/run", post(handlers::run_workflow))
        .route("/v1/graph", get(handlers::graph))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::cors())
        .layer(middleware::trace())
        .with_state(state)
}

pub async fn run(addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("DesignBridge API listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
