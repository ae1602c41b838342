//! Instance handlers: create, delete, list.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::dto::{ApiResponse, CreateInstanceRequest, InstanceResponse};
use crate::app_state::AppState;
use crate::error::GatewayError;

/// `POST /instance/create` — Create an instance.
///
/// Connected clients on the `global` channel are notified with an
/// `instance_created` event.
///
/// # Errors
///
/// Returns [`GatewayError`] on a malformed body, a blank name or an
/// instance API failure.
pub async fn create_instance(
    State(state): State<AppState>,
    payload: Result<Json<CreateInstanceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let Json(req) = payload?;
    let api_response = state
        .instance_service
        .create_instance(&req.instance_name)
        .await?;

    Ok(Json(ApiResponse::success(
        "instance created",
        InstanceResponse {
            instance_name: req.instance_name.trim().to_string(),
            api_response,
        },
    )))
}

/// `DELETE /instance/{id}` — Delete an instance.
///
/// # Errors
///
/// Returns [`GatewayError`] on an instance API failure.
pub async fn delete_instance(
    State(state): State<AppState>,
    Path(instance_name): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let api_response = state
        .instance_service
        .delete_instance(&instance_name)
        .await?;

    Ok(Json(ApiResponse::success(
        "instance deleted",
        InstanceResponse {
            instance_name,
            api_response,
        },
    )))
}

/// `GET /instance/fetchInstances` — List instances.
///
/// # Errors
///
/// Returns [`GatewayError`] on an instance API failure.
pub async fn fetch_instances(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let instances = state.instance_service.fetch_instances().await?;
    Ok(Json(ApiResponse::success("instances fetched", instances)))
}

/// Instance management routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/instance/create", post(create_instance))
        .route("/instance/fetchInstances", get(fetch_instances))
        .route("/instance/{id}", delete(delete_instance))
}
