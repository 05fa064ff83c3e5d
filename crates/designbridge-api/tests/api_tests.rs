//! Router tests against an offline workflow.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use designbridge_api::{create_app, AppState};
use designbridge_core::config::VisionConfig;
use designbridge_core::{DesignBridgeError, Result};
use designbridge_in::RequirementInterpreter;
use designbridge_render::RenderChain;
use designbridge_stages::{build_workflow_with, Components};
use designbridge_vision::{DepthEstimator, Segmenter, VisionAdapter, VisionBackend};
use serde_json::{json, Value};
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

struct NoModels;

impl VisionBackend for NoModels {
    fn depth_estimator(&self, model: &str) -> Result<Arc<dyn DepthEstimator>> {
        Err(DesignBridgeError::Inference(format!("{} not installed", model)))
    }

    fn segmenter(&self, model: &str) -> Result<Arc<dyn Segmenter>> {
        Err(DesignBridgeError::Inference(format!("{} not installed", model)))
    }
}

fn app(root: &std::path::Path) -> Router {
    let runner = build_workflow_with(Components {
        interpreter: RequirementInterpreter::rules_only(),
        vision: VisionAdapter::new(Arc::new(NoModels), VisionConfig::default()),
        render: Some(RenderChain::builder().build()),
    })
    .unwrap();
    create_app(AppState::new(runner, root).unwrap())
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_run(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/run")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// Endpoints
// ============================================================================

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::get("/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_run_returns_state_trace_and_path() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(post_run(json!({
            "text_prompt": "只想調整沙發位置和顏色",
            "edit_scope": 0.2
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["state"]["routing_decision"], "design_adjuster");
    assert_eq!(body["state"]["render_result"]["generation_params"]["backend"], "placeholder");
    assert_eq!(body["path"].as_array().unwrap().len(), 4);
    assert_eq!(body["trace"].as_array().unwrap().len(), 4);
    assert_eq!(body["path"][3], "adjuster_handler");
    assert!(!body["trace_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreadable_photo_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.jpg");
    let response = app(dir.path())
        .oneshot(post_run(json!({
            "text_prompt": "客廳",
            "edit_scope": 0.5,
            "initial_image": missing.to_string_lossy()
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["state"]["vision_features"], json!({ "geometry_constraints": {} }));
}

#[tokio::test]
async fn test_run_rejects_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(post_run(json!({ "text_prompt": "客廳" })))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_graph_exposes_topology_and_mermaid() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::get("/v1/graph").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;

    let nodes = body["topology"]["nodes"].as_array().unwrap();
    assert_eq!(nodes.first().unwrap(), "entry");
    assert_eq!(nodes.last().unwrap(), "exit");
    assert_eq!(nodes.len(), 9);
    assert!(body["mermaid"].as_str().unwrap().starts_with("graph TD;"));
}

#[tokio::test]
async fn test_metrics_count_runs() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let response = app
        .clone()
        .oneshot(post_run(json!({ "text_prompt": "", "edit_scope": 0.6 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("designbridge_runs_total{decision=\"layout_and_style\"} 1"));
    assert!(text.contains("designbridge_renders_total{backend=\"placeholder\"} 1"));
}
