use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use triage_common::{AssessmentQuery, Transcript, VerificationRequest};
use uuid::Uuid;

use crate::conversation::{PersistenceStatus, TurnOrchestrator, TurnRequest};
use crate::errors::{BackendError, TurnError};
use crate::store::AssessmentStore;
use crate::verify::VerificationEnsemble;

/// Header carrying the id of the assessment a final turn was stored as.
pub const ASSESSMENT_ID_HEADER: &str = "x-assessment-id";

const MISSING_HISTORY: &str = "Invalid request. 'history' is required.";

/// Shared application state.
pub struct AppState {
    pub orchestrator: TurnOrchestrator,
    pub ensemble: VerificationEnsemble,
    pub store: Arc<dyn AssessmentStore>,
}

pub type SharedState = Arc<AppState>;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SymptomCheckRequest {
    #[serde(default)]
    pub history: Option<Transcript>,
    #[serde(default, rename = "userId", alias = "user_id")]
    pub user_id: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Turn(TurnError),
}

/// HTTP status for a failed turn.
pub fn turn_error_status(err: &TurnError) -> StatusCode {
    match err {
        TurnError::Backend(BackendError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        TurnError::Backend(BackendError::Configuration { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        TurnError::Backend(_) | TurnError::Contract(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": msg}))).into_response()
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": msg}))).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": msg})),
            )
                .into_response(),
            ApiError::Turn(err) => (
                turn_error_status(&err),
                Json(serde_json::json!({"error": err.to_string(), "kind": err.kind()})),
            )
                .into_response(),
        }
    }
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        ApiError::Turn(err)
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/symptom-checker", post(symptom_check))
        .route("/api/symptom-tracker", post(symptom_check))
        .route("/api/verify", post(verify))
        .route("/api/assessments", get(list_assessments))
        .route("/api/assessments/{id}", get(get_assessment))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn symptom_check(
    State(state): State<SharedState>,
    body: Result<Json<SymptomCheckRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|_| ApiError::BadRequest(MISSING_HISTORY.into()))?;
    let transcript = body
        .history
        .ok_or_else(|| ApiError::BadRequest(MISSING_HISTORY.into()))?;

    let request = TurnRequest {
        transcript,
        user_id: body.user_id.filter(|u| !u.trim().is_empty()),
    };
    let outcome = state.orchestrator.take_turn(request).await?;

    let mut response = Json(&outcome.response).into_response();
    if let PersistenceStatus::Saved(id) = outcome.persistence
        && let Ok(value) = HeaderValue::from_str(&id.to_string())
    {
        response.headers_mut().insert(ASSESSMENT_ID_HEADER, value);
    }
    Ok(response)
}

async fn verify(
    State(state): State<SharedState>,
    body: Result<Json<VerificationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(|e| {
        ApiError::BadRequest(format!("Invalid verification request: {}", e.body_text()))
    })?;
    let report = state.ensemble.verify(&request).await;
    Ok(Json(report))
}

async fn list_assessments(
    State(state): State<SharedState>,
    query: Result<Query<AssessmentQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) =
        query.map_err(|e| ApiError::BadRequest(format!("Invalid query: {}", e.body_text())))?;
    let page = state
        .store
        .list(&query)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(page))
}

async fn get_assessment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let uuid = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid assessment id '{}'", id)))?;
    match state
        .store
        .get(uuid)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
    {
        Some(assessment) => Ok(Json(assessment)),
        None => Err(ApiError::NotFound(format!("Assessment {} not found", id))),
    }
}
