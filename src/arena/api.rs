use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use super::models::{JobHandle, JobOutcome, SessionState, Vote};
use super::ranking::RankingQuery;
use super::service::ArenaService;
use crate::errors::{ArenaError, ErrorKind};
use crate::schema::SchemaConfig;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub service: Arc<ArenaService>,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub project_id: i64,
    pub schema_a: SchemaConfig,
    pub schema_b: SchemaConfig,
}

#[derive(Deserialize)]
pub struct ListSessionsParams {
    pub project_id: Option<i64>,
    pub state: Option<String>,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub vote: String,
}

#[derive(Deserialize)]
pub struct RankingsParams {
    pub min_games: Option<u32>,
    pub limit: Option<usize>,
    pub provider: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    Arena(ArenaError),
    BadRequest(String),
}

impl From<ArenaError> for ApiError {
    fn from(err: ArenaError) -> Self {
        Self::Arena(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorKind::Validation, msg),
            ApiError::Arena(err) => {
                let kind = err.kind();
                let status = match kind {
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::ExecutionFailure => StatusCode::BAD_GATEWAY,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Persistence => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, kind, format!("{:#}", anyhow::Error::new(err)))
            }
        };
        (
            status,
            Json(serde_json::json!({"error": message, "kind": kind.as_str()})),
        )
            .into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/arena/sessions", get(list_sessions).post(create_session))
        .route("/api/arena/sessions/expire", post(expire_sessions))
        .route("/api/arena/sessions/{id}", get(get_session))
        .route("/api/arena/sessions/{id}/vote", post(cast_vote))
        .route("/api/arena/jobs/{handle}/complete", post(complete_job))
        .route("/api/arena/rankings", get(list_rankings))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn create_session(
    State(state): State<SharedState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .service
        .create_session(req.project_id, req.schema_a, req.schema_b)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn list_sessions(
    State(state): State<SharedState>,
    Query(params): Query<ListSessionsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let session_state = params
        .state
        .as_deref()
        .map(SessionState::from_str)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let sessions = state
        .service
        .list_sessions(params.project_id, session_state)
        .await?;
    Ok(Json(sessions))
}

async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.get_session(id).await?))
}

async fn cast_vote(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let vote = Vote::from_str(&req.vote).map_err(ApiError::BadRequest)?;
    Ok(Json(state.service.cast_vote(id, vote).await?))
}

async fn complete_job(
    State(state): State<SharedState>,
    Path(handle): Path<String>,
    Json(outcome): Json<JobOutcome>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .service
        .record_job_result(JobHandle::new(handle), outcome)
        .await?;
    Ok(Json(session))
}

async fn expire_sessions(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let expired = state.service.expire_abandoned(Utc::now()).await?;
    let ids: Vec<i64> = expired.iter().map(|s| s.id).collect();
    Ok(Json(serde_json::json!({ "expired": ids })))
}

async fn list_rankings(
    State(state): State<SharedState>,
    Query(params): Query<RankingsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = RankingQuery {
        min_games: params.min_games.unwrap_or(0),
        limit: params.limit,
        provider: params.provider.filter(|p| !p.is_empty()),
    };
    Ok(Json(state.service.list_rankings(query).await?))
}
