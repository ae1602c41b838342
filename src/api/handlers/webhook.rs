//! Webhook handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ApiResponse, SetWebhookRequest};
use crate::app_state::AppState;
use crate::error::GatewayError;

/// `POST /webhook/set/{instance}` — Configure an instance's webhook.
///
/// Clients on the instance's channel receive a `webhook_updated` event.
///
/// # Errors
///
/// Returns [`GatewayError`] on a blank URL or an instance API failure.
pub async fn set_webhook(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    payload: Result<Json<SetWebhookRequest>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let Json(req) = payload?;
    let response = state.instance_service.set_webhook(&instance, &req).await?;
    Ok(Json(ApiResponse::success("webhook configured", response)))
}

/// `GET /webhook/find/{instance}` — Read an instance's webhook.
///
/// # Errors
///
/// Returns [`GatewayError`] on an instance API failure.
pub async fn find_webhook(
    State(state): State<AppState>,
    Path(instance): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let response = state.instance_service.find_webhook(&instance).await?;
    Ok(Json(ApiResponse::success("webhook found", response)))
}

/// Webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhook/set/{instance}", post(set_webhook))
        .route("/webhook/find/{instance}", get(find_webhook))
}
