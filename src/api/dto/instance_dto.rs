//! Instance request/response DTOs.

use serde::{Deserialize, Serialize};

/// Request body for `POST /api/instance/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInstanceRequest {
    /// Name of the instance to create; also the channel its clients join.
    pub instance_name: String,
}

/// Response payload for instance creation and deletion.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceResponse {
    /// Instance the operation applied to.
    pub instance_name: String,
    /// Body returned by the instance API.
    pub api_response: serde_json::Value,
}
