//! Events pushed to WebSocket clients after instance operations.
//!
//! Serialized as `{"event": "<name>", "data": {...}}`. Each event knows which
//! audience it is meant for; see [`InstanceEvent::audience`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ChannelTag;

/// Who should receive an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every connected client.
    Everyone,
    /// Clients registered on any of these channels.
    Channels(Vec<ChannelTag>),
}

/// Notification emitted after a successful call to the instance API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InstanceEvent {
    /// A new instance was created upstream.
    InstanceCreated {
        /// Name of the new instance.
        instance_name: String,
        /// When the gateway observed the creation.
        timestamp: DateTime<Utc>,
    },

    /// An instance was deleted upstream.
    InstanceDeleted {
        /// Name of the deleted instance.
        instance_name: String,
        /// When the gateway observed the deletion.
        timestamp: DateTime<Utc>,
    },

    /// The webhook configuration of an instance changed.
    WebhookUpdated {
        /// Instance whose webhook changed.
        instance_name: String,
        /// Target URL now configured.
        url: String,
        /// Whether the webhook is enabled.
        enabled: bool,
        /// When the gateway observed the change.
        timestamp: DateTime<Utc>,
    },

    /// A batch restart finished.
    InstancesRestarted {
        /// Instances restarted successfully.
        restarted: Vec<String>,
        /// Instances whose restart failed.
        failed: Vec<String>,
        /// When the batch finished.
        timestamp: DateTime<Utc>,
    },
}

impl InstanceEvent {
    /// Returns the wire name of the event (the `event` field).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InstanceCreated { .. } => "instance_created",
            Self::InstanceDeleted { .. } => "instance_deleted",
            Self::WebhookUpdated { .. } => "webhook_updated",
            Self::InstancesRestarted { .. } => "instances_restarted",
        }
    }

    /// Returns the clients this event is addressed to.
    ///
    /// Creation goes to the global channel, deletion to both the global
    /// channel and the instance's own channel, webhook changes only to the
    /// instance's channel, and batch restarts to everyone. A channel is never
    /// listed twice.
    #[must_use]
    pub fn audience(&self) -> Audience {
        match self {
            Self::InstanceCreated { .. } => Audience::Channels(vec![ChannelTag::global()]),
            Self::InstanceDeleted { instance_name, .. } => {
                let own = ChannelTag::new(instance_name);
                if own.is_global() {
                    Audience::Channels(vec![own])
                } else {
                    Audience::Channels(vec![ChannelTag::global(), own])
                }
            }
            Self::WebhookUpdated { instance_name, .. } => {
                Audience::Channels(vec![ChannelTag::new(instance_name)])
            }
            Self::InstancesRestarted { .. } => Audience::Everyone,
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::InstanceCreated { timestamp, .. }
            | Self::InstanceDeleted { timestamp, .. }
            | Self::WebhookUpdated { timestamp, .. }
            | Self::InstancesRestarted { timestamp, .. } => *timestamp,
        }
    }
}
