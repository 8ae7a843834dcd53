//! HTTP JSON API
//!
//! Stateless: every session round-trip carries its own [`SessionToken`], so
//! handlers share nothing but the read-only pipeline.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::domain::{ClarificationSet, InformationRecord, Proposal};
use crate::pipeline::{Outcome, PipelineController, PipelineError, SessionToken};

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineController>,
}

impl AppState {
    pub fn new(pipeline: Arc<PipelineController>) -> Self {
        Self { pipeline }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub user_input: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionsRequest {
    pub extracted_info: InformationRecord,
}

#[derive(Debug, Deserialize)]
pub struct ProposalRequest {
    pub all_info: InformationRecord,
}

#[derive(Debug, Deserialize)]
pub struct AnswersRequest {
    pub session: SessionToken,
    #[serde(default)]
    pub answers: HashMap<String, String>,
}

/// Error responses
#[derive(Debug)]
pub enum ApiError {
    /// Missing, unparseable or wrongly shaped request body
    InvalidInput(JsonRejection),
    Pipeline(PipelineError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidInput(rejection) => {
                debug!(reason = %rejection.body_text(), "Rejected request body");
                (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid input data"}))).into_response()
            }
            ApiError::Pipeline(err) => {
                let status = match &err {
                    PipelineError::EmptyInput => StatusCode::BAD_REQUEST,
                    PipelineError::CompletionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    PipelineError::ExtractionFailed(_) | PipelineError::ProposalFailed(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status.is_server_error() {
                    error!(error = %err, "Pipeline request failed");
                } else {
                    warn!(error = %err, "Pipeline request rejected");
                }
                let body = json!({"error": err.user_message(), "detail": err.to_string()});
                (status, Json(body)).into_response()
            }
        }
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/extract", post(extract_handler))
        .route("/api/generate_questions", post(questions_handler))
        .route("/api/generate_proposal", post(proposal_handler))
        .route("/api/session", post(start_session_handler))
        .route("/api/session/answers", post(answers_handler))
        .with_state(state)
}

/// Bind and serve until Ctrl+C
pub async fn serve(bind: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context(format!("Failed to bind HTTP listener on {}", bind))?;
    info!("Serving HTTP API on {}", bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("HTTP API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

async fn health_handler() -> impl IntoResponse {
    "ok"
}

async fn extract_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<ExtractRequest>, JsonRejection>,
) -> ApiResult<InformationRecord> {
    let Json(req) = body?;
    debug!(input_len = req.user_input.len(), "extract_handler: called");
    let record = state.pipeline.extraction().extract(&req.user_input).await?;
    Ok(Json(record))
}

async fn questions_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<QuestionsRequest>, JsonRejection>,
) -> ApiResult<ClarificationSet> {
    let Json(req) = body?;
    debug!(field_count = req.extracted_info.len(), "questions_handler: called");
    Ok(Json(state.pipeline.questions().ask(&req.extracted_info).await))
}

async fn proposal_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<ProposalRequest>, JsonRejection>,
) -> ApiResult<Proposal> {
    let Json(req) = body?;
    debug!(field_count = req.all_info.len(), "proposal_handler: called");
    let proposal = state.pipeline.proposal().propose(&req.all_info).await?;
    Ok(Json(proposal))
}

async fn start_session_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<ExtractRequest>, JsonRejection>,
) -> ApiResult<Outcome> {
    let Json(req) = body?;
    debug!(input_len = req.user_input.len(), "start_session_handler: called");
    Ok(Json(state.pipeline.start(&req.user_input).await?))
}

async fn answers_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<AnswersRequest>, JsonRejection>,
) -> ApiResult<Outcome> {
    let Json(req) = body?;
    debug!(session_id = %req.session.id, answer_count = req.answers.len(), "answers_handler: called");
    Ok(Json(state.pipeline.resume(req.session, &req.answers).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldConfig, PipelineConfig};
    use crate::llm::client::mock::{MockLlmClient, MockReply};
    use crate::pipeline::test_support::services;
    use crate::reference::ReferenceData;
    use axum::body::Body;
    use axum::http::{Request, header};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(mock: Arc<MockLlmClient>) -> Router {
        app_with_timeout(mock, Duration::from_secs(5))
    }

    fn app_with_timeout(mock: Arc<MockLlmClient>, timeout: Duration) -> Router {
        let config = PipelineConfig {
            fields: vec![FieldConfig::new("a", None), FieldConfig::new("b", None)],
            ..PipelineConfig::default()
        };
        let mut svc = services(mock);
        svc.timeout = timeout;
        let reference = Arc::new(ReferenceData::new(vec!["Rust".to_string()], None));
        let pipeline = PipelineController::from_config(svc, reference, &config);
        router(AppState::new(Arc::new(pipeline)))
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(Arc::new(MockLlmClient::texts(&[])))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_extract_returns_record() {
        let mock = Arc::new(MockLlmClient::texts(&["{\"a\": \"foo\", \"b\": \"Not provided\"}"]));
        let (status, body) = post_json(app(mock), "/api/extract", r#"{"user_input": "foo"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"a": "foo", "b": "Not provided"}));
    }

    #[tokio::test]
    async fn test_missing_field_is_invalid_input() {
        let mock = Arc::new(MockLlmClient::texts(&[]));
        let (status, body) = post_json(app(mock.clone()), "/api/extract", r#"{"text": "foo"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"error": "Invalid input data"}));

        let (status, _) = post_json(app(mock.clone()), "/api/generate_questions", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_input_is_bad_request() {
        let (status, body) = post_json(
            app(Arc::new(MockLlmClient::texts(&[]))),
            "/api/extract",
            r#"{"user_input": "  "}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("No project description"));
    }

    #[tokio::test]
    async fn test_generate_questions_falls_back() {
        let mock = Arc::new(MockLlmClient::texts(&["no json"]));
        let (status, body) = post_json(
            app(mock),
            "/api/generate_questions",
            r#"{"extracted_info": {"a": "Not provided", "b": "bar"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"a": "Please provide information for: a"}));
    }

    #[tokio::test]
    async fn test_generate_proposal_accepts_numbers_and_lists() {
        let mock = Arc::new(MockLlmClient::texts(&["# ShopFast"]));
        let (status, _) = post_json(
            app(mock.clone()),
            "/api/generate_proposal",
            r#"{"all_info": {"budget": 5000, "features": ["cart", "payments"]}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let prompt = &mock.prompts()[0];
        assert!(prompt.contains("5000"));
        assert!(prompt.contains("cart, payments"));
    }

    #[tokio::test]
    async fn test_generate_proposal_failure_is_500() {
        let mock = Arc::new(MockLlmClient::new(vec![MockReply::Fail(502)]));
        let (status, body) = post_json(app(mock), "/api/generate_proposal", r#"{"all_info": {"a": "foo"}}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("rephrasing"));
    }

    #[tokio::test]
    async fn test_timeout_is_504() {
        let mock = Arc::new(MockLlmClient::new(vec![MockReply::Hang(Duration::from_millis(500))]));
        let (status, _) = post_json(
            app_with_timeout(mock, Duration::from_millis(20)),
            "/api/extract",
            r#"{"user_input": "foo"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let mock = Arc::new(MockLlmClient::texts(&[
            "{\"a\": \"Not provided\", \"b\": \"bar\"}",
            "{\"a\": \"What should it do?\"}",
            "{\"result\": \"No additional questions needed.\"}",
            "# Proposal",
        ]));
        let (status, first) = post_json(app(mock.clone()), "/api/session", r#"{"user_input": "bar"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["status"], "needs_clarification");
        assert_eq!(first["questions"], serde_json::json!({"a": "What should it do?"}));

        let answers = serde_json::json!({"session": first["session"], "answers": {"a": "sell books"}});
        let (status, second) = post_json(app(mock), "/api/session/answers", &answers.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["status"], "proposal");
        assert_eq!(second["record"], serde_json::json!({"a": "sell books", "b": "bar"}));
        assert_eq!(second["audit"], serde_json::json!([{"question": "a", "answer": "sell books"}]));
        assert_eq!(second["proposal"], serde_json::json!({"format": "text", "content": "# Proposal"}));
        assert_eq!(second["session_id"], first["session"]["id"]);
    }
}
