//! Messages the WebSocket layer sends on its own behalf.
//!
//! Hub broadcasts already arrive serialized; only the connection greeting
//! is built here. It uses the same `{"event", "data"}` shape as
//! [`crate::domain::InstanceEvent`] so clients parse one format.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ChannelTag, ConnectionId};

/// Server → client notices about the connection itself.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ConnectionNotice {
    /// Sent once, right after registration.
    Connected {
        /// Identity assigned by the hub.
        connection_id: ConnectionId,
        /// Channel the connection joined.
        instance: ChannelTag,
        /// Registration time.
        timestamp: DateTime<Utc>,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn connected_notice_shape() {
        let id = ConnectionId::new();
        let notice = ConnectionNotice::Connected {
            connection_id: id,
            instance: ChannelTag::new("sales"),
            timestamp: Utc::now(),
        };
        let Ok(value) = serde_json::to_value(&notice) else {
            panic!("serialization failed");
        };
        assert_eq!(value["event"], "connected");
        assert_eq!(value["data"]["instance"], "sales");
        assert_eq!(value["data"]["connection_id"], id.to_string());
    }
}
