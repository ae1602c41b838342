//! Per-connection membership record and outbound queue.
//!
//! Registration produces two halves that share a `Liveness` flag:
//!
//! - `ConnectionRecord` lives in the hub's membership map and holds the
//!   only sending side of the outbound queue. Dropping it closes the queue.
//! - [`ConnectionHandle`] goes to the transport's writer task, which drains
//!   the queue and reports back through a weak hub reference when it is done.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use super::hub::WeakHubHandle;
use super::{ChannelTag, ConnectionId, Frame};

/// Lifecycle of a connection as seen by the hub and its writer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Member of the hub; broadcasts may enqueue frames.
    Active,
    /// Removed from membership (evicted or unregistered); the writer is
    /// draining what was already enqueued.
    Closing,
    /// Writer finished its teardown.
    Closed,
}

impl ConnectionState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Closing => 1,
            Self::Closed => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Active,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Shared lifecycle flag. Transitions only move forward.
#[derive(Debug)]
pub(crate) struct Liveness(AtomicU8);

impl Liveness {
    fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Active.as_u8()))
    }

    fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Active → Closing`. Returns `false` if the connection already left
    /// the active state.
    fn begin_closing(&self) -> bool {
        self.0
            .compare_exchange(
                ConnectionState::Active.as_u8(),
                ConnectionState::Closing.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn close(&self) {
        self.0.store(ConnectionState::Closed.as_u8(), Ordering::Release);
    }
}

/// Hub-side membership record.
#[derive(Debug)]
pub(crate) struct ConnectionRecord {
    pub(crate) id: ConnectionId,
    pub(crate) tag: ChannelTag,
    pub(crate) sender: mpsc::Sender<Frame>,
    liveness: Arc<Liveness>,
}

impl ConnectionRecord {
    /// Marks the connection as leaving membership. Called right before the
    /// record is dropped from the map, which closes the queue.
    ///
    /// A writer that already finished keeps its `Closed` state.
    pub(crate) fn mark_closing(&self) {
        let _ = self.liveness.begin_closing();
    }
}

/// Transport-side half of a registered connection.
///
/// Owned by the connection's writer task. Frames come out in the order the
/// hub enqueued them; [`ConnectionHandle::recv`] yields `None` once the hub
/// has closed the queue and every pending frame has been drained.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tag: ChannelTag,
    pub(super) receiver: mpsc::Receiver<Frame>,
    liveness: Arc<Liveness>,
    link: ConnectionLink,
}

impl ConnectionHandle {
    /// Builds both halves of a new connection with a queue of `capacity`
    /// frames (at least one).
    pub(crate) fn pair(
        tag: ChannelTag,
        capacity: usize,
        hub: WeakHubHandle,
    ) -> (ConnectionRecord, Self) {
        let id = ConnectionId::new();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let liveness = Arc::new(Liveness::new());
        let record = ConnectionRecord {
            id,
            tag: tag.clone(),
            sender,
            liveness: Arc::clone(&liveness),
        };
        let handle = Self {
            id,
            tag,
            receiver,
            liveness,
            link: ConnectionLink { id, hub },
        };
        (record, handle)
    }

    /// Identity assigned by the hub.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Channel the connection subscribed to at registration.
    #[must_use]
    pub const fn tag(&self) -> &ChannelTag {
        &self.tag
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.liveness.get()
    }

    /// Returns a cloneable link that can unregister this connection from
    /// another task (e.g. the transport's reader loop).
    #[must_use]
    pub fn link(&self) -> ConnectionLink {
        self.link.clone()
    }

    /// Waits for the next outbound frame.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Returns the next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }

    /// Number of frames waiting in the queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Completes teardown after the transport has been closed.
    ///
    /// Stops accepting frames, marks the connection [`ConnectionState::Closed`]
    /// and asks the hub to drop the membership record if it still holds one.
    /// Safe to call whether the connection was evicted, unregistered, or
    /// is still registered.
    pub async fn finish(mut self) {
        self.receiver.close();
        self.liveness.close();
        let removed = self.link.unregister().await;
        tracing::debug!(connection_id = %self.id, tag = %self.tag, removed, "connection finished");
    }
}

/// Non-owning path from a connection back to the hub.
///
/// Holds a weak reference, so live connections never keep the dispatch loop
/// alive on their own.
#[derive(Debug, Clone)]
pub struct ConnectionLink {
    id: ConnectionId,
    hub: WeakHubHandle,
}

impl ConnectionLink {
    /// Identity of the linked connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Unregisters the linked connection.
    ///
    /// Returns `true` if this call removed it. Unknown connections and a
    /// stopped hub both yield `false`.
    pub async fn unregister(&self) -> bool {
        self.hub.unregister(self.id).await
    }
}
