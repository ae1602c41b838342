//! Batch operation handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{ApiResponse, BatchRestartRequest};
use crate::app_state::AppState;
use crate::error::GatewayError;

/// `POST /batch/restart` — Restart several instances.
///
/// Per-instance failures are reported in the payload; every connected
/// client receives an `instances_restarted` event.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an empty list or a blank
/// name.
pub async fn batch_restart(
    State(state): State<AppState>,
    payload: Result<Json<BatchRestartRequest>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let Json(req) = payload?;
    let outcome = state
        .instance_service
        .batch_restart(&req.instances)
        .await?;
    Ok(Json(ApiResponse::success("batch restart finished", outcome)))
}

/// Batch routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/batch/restart", post(batch_restart))
}
