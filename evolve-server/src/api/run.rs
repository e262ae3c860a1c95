//! Run API Handlers
//!
//! HTTP endpoints for run metadata. All of them require an authenticated
//! caller.

use axum::{Json, extract::State};
use evolve_core::domain::run::Run;
use evolve_core::dto::run::{RunDataRequest, RunSummary, ShareRunRequest};

use crate::api::error::{ApiError, ApiResult};
use crate::auth::Authenticated;
use crate::service::run_service::{self, RunError};
use crate::state::AppState;

const RUN_NOT_FOUND: &str = "run does not exist";

/// GET /api/runs
/// List the runs the caller created or was given access to
pub async fn list_runs(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<Json<Vec<RunSummary>>> {
    tracing::debug!("Listing runs for user {}", user.id);

    let runs = run_service::list_runs(&state.pool, &user.id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(runs))
}

/// POST /api/runs/get
/// Get a single run the caller has access to
pub async fn get_run(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(req): Json<RunDataRequest>,
) -> ApiResult<Json<Run>> {
    tracing::debug!("Getting run {} for user {}", req.run_id, user.id);

    let run = run_service::get_run(&state.pool, &user.id, &req.run_id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(run))
}

/// POST /api/runs/share
/// Grant read access on a run to other users
pub async fn share_run(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(req): Json<ShareRunRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    tracing::info!("User {} sharing run {}", user.id, req.run_id);

    run_service::share_run(&state.pool, &user.id, req)
        .await
        .map_err(|e| match e {
            RunError::NotFound => ApiError::BadRequest(RUN_NOT_FOUND.to_string()),
            other => ApiError::from(other),
        })?;

    Ok(Json(serde_json::json!({ "message": "Run shared." })))
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::NotFound => ApiError::NotFound(RUN_NOT_FOUND.to_string()),
            RunError::ValidationError(msg) => ApiError::BadRequest(msg),
            RunError::UnknownUsers => ApiError::BadRequest(
                "please check the emails again, some of them do not exist".to_string(),
            ),
            RunError::AlreadyShared => ApiError::BadRequest(
                "make sure the run is not already shared with the user".to_string(),
            ),
            RunError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}
