//! Batch operation DTOs.

use serde::{Deserialize, Serialize};

/// Request body for `POST /api/batch/restart`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRestartRequest {
    /// Instances to restart.
    pub instances: Vec<String>,
}

/// One instance a batch operation could not handle.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    /// Instance name.
    pub instance: String,
    /// Why it failed.
    pub error: String,
}

/// Response payload for `POST /api/batch/restart`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchRestartResponse {
    /// Instances restarted successfully, in request order.
    pub restarted: Vec<String>,
    /// Instances whose restart failed, in request order.
    pub failed: Vec<BatchFailure>,
}
