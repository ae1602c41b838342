//! Domain layer: connection registry, fan-out, and instance events.
//!
//! The [`Hub`] tracks every live client connection together with the
//! channel ("instance") it subscribed to, and fans serialized [`Frame`]s out
//! either to everyone or to a single channel. [`InstanceEvent`]s describe
//! what the REST layer announces through it.

pub mod channel_tag;
pub mod connection;
pub mod connection_id;
pub mod delivery;
pub mod frame;
pub mod hub;
pub mod instance_event;

pub use channel_tag::ChannelTag;
pub use connection::{ConnectionHandle, ConnectionLink, ConnectionState};
pub use connection_id::ConnectionId;
pub use delivery::{BroadcastReport, ChannelReport, DeliveryFailure, DeliveryFailureReason};
pub use frame::Frame;
pub use hub::{Hub, HubConfig, HubHandle, WeakHubHandle};
pub use instance_event::{Audience, InstanceEvent};
