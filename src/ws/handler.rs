//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::ChannelTag;
use crate::error::GatewayError;

/// `GET /ws/{instance}` — Upgrade to WebSocket and join the `instance`
/// channel.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the instance name is blank.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(instance): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let instance = instance.trim();
    if instance.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "instance must not be empty".to_string(),
        ));
    }
    let tag = ChannelTag::new(instance);
    let hub = state.hub.clone();

    Ok(ws.on_upgrade(move |socket| run_connection(socket, hub, tag)))
}
