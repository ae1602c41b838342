//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::HubHandle;
use crate::service::InstanceService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Instance service for all REST operations.
    pub instance_service: Arc<InstanceService>,
    /// Connection registry for WebSocket clients.
    pub hub: HubHandle,
}
