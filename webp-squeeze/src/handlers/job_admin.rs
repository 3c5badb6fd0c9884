//! Optimization job admin handlers
//!
//! JSON endpoints driving the batch engine. Callers are trusted: these
//! handlers perform no authorization of their own. Every handler runs the
//! recovery monitor before doing its own work.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use axum::{routing::{get, post}, Router};
//! use webp_squeeze::handlers::job_admin;
//!
//! let routes = Router::new()
//!     .route("/jobs", post(job_admin::create_job))
//!     .route("/jobs/batch", post(job_admin::process_batch));
//! ```

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::jobs::{HistoryFilter, JobType};
use crate::state::SqueezeState;

/// Default page size for history listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Body of `POST /jobs`
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateJobRequest {
    /// `full` or `retry`
    #[serde(alias = "type")]
    pub job_type: String,
}

/// Query of `POST /jobs/batch`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchParams {
    /// Items to process (clamped to 1..=50; configured default if absent)
    pub batch_size: Option<i64>,
}

/// Query of `GET /history`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HistoryParams {
    /// Page number (1-indexed)
    pub page: Option<usize>,
    /// Entries per page
    pub page_size: Option<usize>,
    /// Only runs of this type
    pub job_type: Option<String>,
    /// Only entries logged at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Only entries logged at or before this instant
    pub until: Option<DateTime<Utc>>,
}

/// Create an optimization job
///
/// # Errors
///
/// Returns 400 for an unknown job type, 404 if nothing needs work, 409 if a
/// job is already running.
///
/// ```bash
/// POST /jobs
/// {"job_type": "full"}
/// ```
pub async fn create_job(
    State(state): State<SqueezeState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<Response, ApiError> {
    let engine = state.engine();
    engine.recover_if_needed().await?;

    let job = engine.create_job(&request.job_type).await?;
    tracing::info!(job_id = %job.id, total = job.total, "Job created via API");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "job": job,
            "message": format!("{} images queued for optimization", job.total),
        })),
    )
        .into_response())
}

/// Progress of the current job
///
/// # Errors
///
/// Returns 404 if no job occupies the slot.
pub async fn job_progress(State(state): State<SqueezeState>) -> Result<Response, ApiError> {
    let engine = state.engine();
    engine.recover_if_needed().await?;

    let progress = engine.progress().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "percent": progress.percent(),
        "progress": progress,
    }))
    .into_response())
}

/// Process one batch of the current job
///
/// # Errors
///
/// Returns 404 if no job is in progress.
///
/// ```bash
/// POST /jobs/batch?batch_size=10
/// ```
pub async fn process_batch(
    State(state): State<SqueezeState>,
    Query(params): Query<BatchParams>,
) -> Result<Response, ApiError> {
    let engine = state.engine();
    engine.recover_if_needed().await?;

    let report = engine.process_batch(params.batch_size).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "batch": report,
    }))
    .into_response())
}

/// Cancel the current job
///
/// # Errors
///
/// Returns 404 if no job is in progress.
pub async fn cancel_job(State(state): State<SqueezeState>) -> Result<Response, ApiError> {
    let engine = state.engine();
    engine.recover_if_needed().await?;

    let job = engine.cancel_job().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "job": job,
        "message": "Optimization job cancelled",
    }))
    .into_response())
}

/// Paginated run history
///
/// # Errors
///
/// Returns 400 for an unknown `job_type` filter.
///
/// ```bash
/// GET /history?page=1&page_size=10&job_type=retry
/// ```
pub async fn history(
    State(state): State<SqueezeState>,
    Query(params): Query<HistoryParams>,
) -> Result<Response, ApiError> {
    let engine = state.engine();
    engine.recover_if_needed().await?;

    let job_type = params
        .job_type
        .as_deref()
        .map(str::parse::<JobType>)
        .transpose()?;
    let filter = HistoryFilter {
        job_type,
        since: params.since,
        until: params.until,
    };

    let page = engine
        .history(
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            &filter,
        )
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "history": page,
    }))
    .into_response())
}

/// Delete the rolling history log
///
/// # Errors
///
/// Returns 503 if the store is unavailable.
pub async fn clear_history(State(state): State<SqueezeState>) -> Result<Response, ApiError> {
    let engine = state.engine();
    engine.recover_if_needed().await?;

    engine.clear_history().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Optimization history cleared",
    }))
    .into_response())
}

/// Dashboard figures
///
/// # Errors
///
/// Returns 503 if the store or catalog is unavailable.
pub async fn dashboard_stats(State(state): State<SqueezeState>) -> Result<Response, ApiError> {
    let engine = state.engine();
    engine.recover_if_needed().await?;

    let stats = engine.dashboard_stats().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "stats": stats,
    }))
    .into_response())
}
