//! Webhook configuration DTOs.

use serde::{Deserialize, Serialize};

/// Request body for `POST /api/webhook/set/{instance}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetWebhookRequest {
    /// URL the instance API should call.
    pub url: String,
    /// Upstream event names to forward. Empty means the API default.
    #[serde(default)]
    pub events: Vec<String>,
    /// Whether the webhook is active. Defaults to `true`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
