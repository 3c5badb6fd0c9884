//! HTTP binding of the batch engine
//!
//! | Method   | Path             | Handler                       |
//! |----------|------------------|-------------------------------|
//! | `POST`   | `/jobs`          | [`job_admin::create_job`]     |
//! | `GET`    | `/jobs/progress` | [`job_admin::job_progress`]   |
//! | `POST`   | `/jobs/batch`    | [`job_admin::process_batch`]  |
//! | `POST`   | `/jobs/cancel`   | [`job_admin::cancel_job`]     |
//! | `GET`    | `/history`       | [`job_admin::history`]        |
//! | `DELETE` | `/history`       | [`job_admin::clear_history`]  |
//! | `GET`    | `/stats`         | [`job_admin::dashboard_stats`]|

pub mod job_admin;

use crate::error::SqueezeError;
use crate::state::SqueezeState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Build the API router with tracing and request timeouts.
#[allow(deprecated)]
pub fn router(state: SqueezeState) -> Router {
    let timeout = state.config().server.request_timeout();

    Router::new()
        .route("/jobs", post(job_admin::create_job))
        .route("/jobs/progress", get(job_admin::job_progress))
        .route("/jobs/batch", post(job_admin::process_batch))
        .route("/jobs/cancel", post(job_admin::cancel_job))
        .route(
            "/history",
            get(job_admin::history).delete(job_admin::clear_history),
        )
        .route("/stats", get(job_admin::dashboard_stats))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}

/// Serve the API on the configured address until Ctrl-C.
///
/// # Errors
///
/// Returns error if the address cannot be bound or the server fails.
pub async fn serve(state: SqueezeState) -> Result<(), SqueezeError> {
    let addr = state.config().server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
