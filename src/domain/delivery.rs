//! Outcome summaries returned by hub broadcasts.

use serde::Serialize;

use super::ConnectionId;

/// Result of a broadcast to every connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Connections whose queue accepted the frame.
    pub delivered: usize,
    /// Connections removed because their queue was full or closed.
    pub evicted: usize,
}

/// Why a channel delivery did not reach one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFailureReason {
    /// The queue stayed full for the whole send timeout.
    TimedOut,
    /// The connection's writer already stopped reading.
    Closed,
}

/// One connection a channel broadcast could not reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    /// Connection that missed the frame.
    pub connection_id: ConnectionId,
    /// What went wrong.
    pub reason: DeliveryFailureReason,
}

/// Result of a broadcast to a single channel.
///
/// Failures are per connection; the call itself still succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    /// Matching connections whose queue accepted the frame.
    pub delivered: usize,
    /// Matching connections that did not get the frame.
    pub failed: Vec<DeliveryFailure>,
}

impl ChannelReport {
    /// Number of connections the broadcast targeted.
    #[must_use]
    pub fn targeted(&self) -> usize {
        self.delivered + self.failed.len()
    }

    /// Returns `true` if every targeted connection got the frame.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
