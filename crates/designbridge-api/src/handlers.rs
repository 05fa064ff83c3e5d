//! API Handlers
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use designbridge_core::{ExecutionContext, UserInput, WorkflowState, DESIGNBRIDGE_VERSION};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::AppState;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// POST /v1/run
///
/// Runs one workflow on the blocking pool and returns the merged state,
/// the stage trace and the executed path.
pub async fn run_workflow(
    State(app): State<AppState>,
    Json(input): Json<UserInput>,
) -> Result<Json<Value>, ApiError> {
    let runner = app.runner.clone();
    let ctx = ExecutionContext::new(app.artifacts_dir.as_path());
    let started = Instant::now();
    let joined =
        tokio::task::spawn_blocking(move || runner.invoke(WorkflowState::from_input(input), &ctx))
            .await;

    let outcome = match joined {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!(error = %e, "workflow run failed");
            app.metrics.observe_failure("graph");
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
        Err(e) => {
            error!(error = %e, "workflow task panicked");
            app.metrics.observe_failure("panic");
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "workflow task aborted"));
        }
    };

    let decision = outcome.state.routing_decision.map(|d| d.as_str());
    let backend = outcome
        .state
        .render_result
        .as_ref()
        .and_then(|r| r.backend());
    app.metrics
        .observe_run(decision, backend, started.elapsed().as_secs_f64());
    info!(
        trace_id = %outcome.trace_id,
        task_id = outcome.state.task_id().unwrap_or("-"),
        decision = decision.unwrap_or("-"),
        "run complete"
    );

    serde_json::to_value(&outcome)
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /v1/graph
pub async fn graph(State(app): State<AppState>) -> Json<Value> {
    let topology = app.runner.graph().topology();
    let mermaid = topology.to_mermaid();
    Json(json!({ "topology": topology, "mermaid": mermaid }))
}

/// GET /metrics
pub async fn metrics(State(app): State<AppState>) -> Response {
    match app.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": DESIGNBRIDGE_VERSION })),
    )
}
