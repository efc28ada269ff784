//! HTTP routes for starting workflows and reading their progress.

use crate::config::{describe_duration, ServerConfig};
use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shiori::{
    ResultsSummary, RunState, WorkflowError, WorkflowService, WorkflowStatus, WORKFLOW_CATEGORY,
};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// State shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub service: WorkflowService,
    /// Pause configured for each step, used for remaining-time hints.
    pub step_delay: Duration,
}

#[derive(Debug, Deserialize)]
pub struct StartWorkflowRequest {
    #[serde(default, alias = "segmento")]
    pub segment: String,
    #[serde(default = "empty_object")]
    pub context: Value,
}

fn empty_object() -> Value {
    json!({})
}

#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    pub category: Option<String>,
}

/// Status document with a remaining-time hint.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: WorkflowStatus,
    pub estimated_remaining: String,
}

fn estimated_remaining(status: &WorkflowStatus, step_delay: Duration) -> String {
    match status.state {
        RunState::Completed => "done".to_string(),
        RunState::Failed => "stopped".to_string(),
        RunState::NotStarted | RunState::Running => {
            let remaining = status.total_steps.saturating_sub(status.current_step_index);
            describe_duration(
                step_delay.saturating_mul(u32::try_from(remaining).unwrap_or(u32::MAX)),
            )
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /workflow/start, also served as /workflow/full_workflow/start
async fn start_workflow(
    State(state): State<AppState>,
    Json(req): Json<StartWorkflowRequest>,
) -> Response {
    match state.service.start(&req.segment, req.context).await {
        Ok(ack) => {
            info!(session_id = %ack.session_id, segment = %req.segment.trim(), "Workflow started");
            Json(json!({
                "success": true,
                "session_id": ack.session_id,
                "message": ack.message,
                "estimated_total_duration": ack.estimated_duration,
                "status_endpoint": ack.status_endpoint,
            }))
            .into_response()
        }
        Err(WorkflowError::Validation(message)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": message })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to start workflow");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// GET /workflow/status/:session_id
async fn workflow_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state
        .service
        .status(&session_id)
        .await
        .map_err(|e| ApiError::for_session(e, session_id))?;
    Ok(Json(StatusResponse {
        estimated_remaining: estimated_remaining(&status, state.step_delay),
        status,
    }))
}

/// GET /workflow/results/:session_id
async fn workflow_results(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ResultsSummary>, ApiError> {
    state
        .service
        .results(&session_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::for_session(e, session_id))
}

/// GET /workflow/results/:session_id/:artifact?category=
async fn workflow_result(
    State(state): State<AppState>,
    Path((session_id, artifact)): Path<(String, String)>,
    Query(query): Query<ResultQuery>,
) -> Result<Json<Value>, ApiError> {
    let category = query.category.as_deref().unwrap_or(WORKFLOW_CATEGORY);
    state
        .service
        .result(&session_id, category, &artifact)
        .await
        .map(Json)
        .map_err(|e| ApiError::for_session(e, session_id))
}

/// GET /workflow/results/synthesis/:session_id
async fn synthesis_result(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .result(&session_id, WORKFLOW_CATEGORY, SYNTHESIS_ARTIFACT)
        .await
        .map(Json)
        .map_err(|e| ApiError::for_session(e, session_id))
}

const SYNTHESIS_ARTIFACT: &str = "synthesis";

/// Workflow routes and health, relative to the API prefix.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/workflow/start", post(start_workflow))
        .route("/workflow/full_workflow/start", post(start_workflow))
        .route("/workflow/status/:session_id", get(workflow_status))
        .route("/workflow/results/:session_id", get(workflow_results))
        .route("/workflow/results/synthesis/:session_id", get(synthesis_result))
        .route("/workflow/results/:session_id/:artifact", get(workflow_result))
        .with_state(state)
}

/// Nests `api_routes` under `api_prefix` unless the prefix is empty.
fn build_router_with_prefix(api_routes: Router, api_prefix: &str) -> Router {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
}

/// The complete application: health check, prefixed API, CORS and tracing.
///
/// `/health` answers both at the root and under the API prefix.
pub fn router(service: WorkflowService, config: &ServerConfig) -> Router {
    let state = AppState {
        service,
        step_delay: config.step_delay,
    };
    let api = build_router_with_prefix(api_routes(state), &config.api_prefix);
    let app = if config.api_prefix.is_empty() {
        api
    } else {
        Router::new().route("/health", get(health)).merge(api)
    };
    app.layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analysis_pipeline;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use shiori::{MemoryCheckpointStore, ServiceConfig};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn instant_config() -> ServerConfig {
        ServerConfig {
            step_delay: Duration::ZERO,
            ..ServerConfig::default()
        }
    }

    fn app_with(config: ServerConfig) -> Router {
        let pipeline = analysis_pipeline(config.step_delay).unwrap();
        let service_config = config.service_config(pipeline.len());
        let service = WorkflowService::new(
            Arc::new(MemoryCheckpointStore::new()),
            pipeline,
            service_config,
        );
        router(service, &config)
    }

    fn app() -> Router {
        app_with(instant_config())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn start_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/workflow/start")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn wait_until_completed(app: &Router, session_id: &str) -> Value {
        let uri = format!("/api/workflow/status/{session_id}");
        let mut last = Value::Null;
        for _ in 0..200 {
            let (status, body) = send(app, get_request(&uri)).await;
            assert_eq!(status, StatusCode::OK);
            last = body;
            if last["state"] == "completed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(last["state"], "completed", "workflow {session_id} did not complete");
        last
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_start_then_poll_to_completion() {
        let app = app();
        let (status, body) = send(
            &app,
            start_request(json!({ "segment": "sample", "context": { "competitor": "rival" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["estimated_total_duration"], "under a second");
        let session_id = body["session_id"].as_str().unwrap().to_string();
        assert_eq!(
            body["status_endpoint"],
            format!("/api/workflow/status/{session_id}")
        );

        let status = wait_until_completed(&app, &session_id).await;
        assert_eq!(status["progress_percentage"], 100);
        assert_eq!(status["current_step_index"], 5);
        assert_eq!(status["estimated_remaining"], "done");

        let (code, synthesis) = send(
            &app,
            get_request(&format!("/api/workflow/results/{session_id}/synthesis")),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(synthesis["key_insights"][1], "Pricing pressure from rival");

        let (code, summary) = send(
            &app,
            get_request(&format!("/api/workflow/results/{session_id}")),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(summary["completed"], true);
        assert_eq!(summary["available"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_start_accepts_legacy_segment_field() {
        let (status, body) = send(&app(), start_request(json!({ "segmento": "sample" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_start_rejects_blank_segment() {
        let (status, body) = send(&app(), start_request(json!({ "segment": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "success": false, "error": "segment required" }));
    }

    #[tokio::test]
    async fn test_unknown_session_reports_not_started() {
        let (status, body) = send(
            &app(),
            get_request("/api/workflow/status/session_1_deadbeef"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "not_started");
        assert_eq!(body["progress_percentage"], 0);
    }

    #[tokio::test]
    async fn test_strict_mode_returns_not_found() {
        let app = app_with(ServerConfig {
            reject_unknown_sessions: true,
            ..instant_config()
        });
        let (status, body) = send(&app, get_request("/api/workflow/status/session_1_deadbeef")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["session_id"], "session_1_deadbeef");
    }

    #[tokio::test]
    async fn test_malformed_session_id_is_bad_request() {
        let (status, _) = send(&app(), get_request("/api/workflow/status/bad%20id")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_result_is_not_found() {
        let (status, body) = send(
            &app(),
            get_request("/api/workflow/results/session_1_deadbeef/synthesis?category=workflow"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Result not found");
    }

    #[tokio::test]
    async fn test_empty_prefix_serves_routes_at_root() {
        let app = app_with(ServerConfig {
            api_prefix: String::new(),
            ..instant_config()
        });
        let (status, _) = send(&app, get_request("/workflow/status/session_1_deadbeef")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, get_request("/api/workflow/status/session_1_deadbeef")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin_by_default() {
        let request = Request::builder()
            .uri("/health")
            .header("origin", "https://ui.example")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("*"))
        );
    }

    #[test]
    fn test_service_config_follows_prefix() {
        let config = ServerConfig {
            api_prefix: "/v1".into(),
            ..ServerConfig::default()
        };
        let service_config: ServiceConfig = config.service_config(5);
        assert_eq!(service_config.status_path_prefix, "/v1/workflow/status/");
    }

    #[tokio::test]
    async fn test_health_is_served_under_prefix() {
        let (status, body) = send(&app(), get_request("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_full_workflow_start_alias() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/workflow/full_workflow/start")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "segmento": "sample" }).to_string()))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let session_id = body["session_id"].as_str().unwrap().to_string();

        wait_until_completed(&app, &session_id).await;
        let (status, synthesis) = send(
            &app,
            get_request(&format!("/api/workflow/results/synthesis/{session_id}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(synthesis["segment"], "sample");
    }

    #[tokio::test]
    async fn test_synthesis_route_before_completion_is_not_found() {
        let (status, body) = send(
            &app(),
            get_request("/api/workflow/results/synthesis/session_1_deadbeef"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["session_id"], "session_1_deadbeef");
    }

    #[tokio::test]
    async fn test_status_estimates_remaining_time() {
        let app = app_with(ServerConfig {
            step_delay: Duration::from_secs(3),
            ..ServerConfig::default()
        });
        let (status, body) = send(&app, get_request("/api/workflow/status/session_1_deadbeef")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "not_started");
        assert_eq!(body["estimated_remaining"], "about 15 seconds");
    }
}
