//! REST endpoint handlers organized by resource.

pub mod batch;
pub mod hub;
pub mod instance;
pub mod system;
pub mod webhook;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(instance::routes())
        .merge(webhook::routes())
        .merge(batch::routes())
        .merge(hub::routes())
}
