//! Connection registry introspection.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ApiResponse, HubStatsResponse};
use crate::app_state::AppState;

/// `GET /hub/stats` — Registered WebSocket connections, total and per
/// channel.
pub async fn hub_stats(State(state): State<AppState>) -> impl IntoResponse {
    let channels = state.hub.channel_counts().await;
    let stats = HubStatsResponse {
        connections: channels.values().sum(),
        channels,
    };
    Json(ApiResponse::success("hub stats", stats))
}

/// Hub routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/hub/stats", get(hub_stats))
}
