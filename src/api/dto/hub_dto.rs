//! Connection registry statistics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::ChannelTag;

/// Response payload for `GET /api/hub/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct HubStatsResponse {
    /// Total registered connections.
    pub connections: usize,
    /// Registered connections per channel.
    pub channels: BTreeMap<ChannelTag, usize>,
}
