//! # evo-gateway
//!
//! REST and WebSocket gateway in front of an instance-management API.
//!
//! REST calls are proxied to the instance API; every successful mutation
//! is announced to connected WebSocket clients. Clients join one channel
//! (an instance name, or `global`) when they connect, and the hub fans
//! events out either to a single channel or to everyone.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── InstanceService (service/) ──► instance API (reqwest)
//!     │
//!     └── Hub: dispatch loop + membership (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::domain::HubHandle;
use crate::service::{EvolutionClient, InstanceService};
use crate::ws::handler::ws_handler;

/// Builds the full application router (REST + WebSocket) over a running
/// hub.
pub fn build_app(client: EvolutionClient, hub: HubHandle) -> Router {
    let instance_service = Arc::new(InstanceService::new(client, hub.clone()));
    let app_state = AppState {
        instance_service,
        hub,
    };

    Router::new()
        .merge(api::build_router())
        .route("/ws/{instance}", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}
