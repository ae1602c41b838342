//! Connection registry with a single dispatch loop.
//!
//! [`Hub`] owns the membership map and is driven by [`Hub::run`], a task
//! that applies register, unregister and broadcast-all commands one at a
//! time. Callers talk to it through a cloneable [`HubHandle`].
//!
//! # Concurrency
//!
//! - Only the dispatch loop mutates membership, under the write half of a
//!   [`RwLock`].
//! - Channel broadcasts run in the caller's task. They take the read half
//!   only long enough to pick their targets and enqueue without it, so a
//!   full queue never delays the dispatch loop.
//! - Every command is acknowledged after it has been applied. Once
//!   [`HubHandle::register`] returns, later broadcasts reach the new
//!   connection; once [`HubHandle::unregister`] returns, they never do.
//!
//! # Backpressure
//!
//! Broadcast-all uses a non-blocking enqueue and evicts any connection whose
//! queue is full. Channel broadcasts wait for queue space, bounded by
//! [`HubConfig::channel_send_timeout`] per connection.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, oneshot};

use super::connection::{ConnectionHandle, ConnectionRecord};
use super::delivery::{
    BroadcastReport, ChannelReport, DeliveryFailure, DeliveryFailureReason,
};
use super::{ChannelTag, ConnectionId, Frame};
use crate::error::HubError;

/// Default outbound queue capacity per connection, in frames.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Default capacity of the dispatch loop's command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

/// Default per-connection wait for queue space during a channel broadcast.
pub const DEFAULT_CHANNEL_SEND_TIMEOUT: Duration = Duration::from_secs(5);

type Members = HashMap<ConnectionId, ConnectionRecord>;

/// Tuning knobs for the hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Outbound queue capacity for connections registered without an
    /// explicit capacity.
    pub queue_capacity: usize,
    /// Number of commands that may wait for the dispatch loop.
    pub command_capacity: usize,
    /// How long a channel broadcast waits on one full queue before it
    /// reports that connection as failed.
    pub channel_send_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            channel_send_timeout: DEFAULT_CHANNEL_SEND_TIMEOUT,
        }
    }
}

/// Requests consumed by the dispatch loop.
#[derive(Debug)]
enum HubCommand {
    Register {
        record: ConnectionRecord,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        id: ConnectionId,
        ack: oneshot::Sender<bool>,
    },
    BroadcastAll {
        frame: Frame,
        ack: oneshot::Sender<BroadcastReport>,
    },
}

/// The registry and its dispatch loop.
///
/// Created once at startup. Run it with [`Hub::run`] (or use
/// [`Hub::spawn`]); it stops when every [`HubHandle`] has been dropped and
/// closes all remaining queues on the way out.
#[derive(Debug)]
pub struct Hub {
    commands: mpsc::Receiver<HubCommand>,
    members: Arc<RwLock<Members>>,
}

impl Hub {
    /// Creates the hub and the first handle to it.
    #[must_use]
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let members = Arc::new(RwLock::new(HashMap::new()));
        let hub = Self {
            commands: rx,
            members: Arc::clone(&members),
        };
        let handle = HubHandle {
            commands: tx,
            members,
            config,
        };
        (hub, handle)
    }

    /// Creates the hub and runs its dispatch loop on the current Tokio
    /// runtime.
    #[must_use]
    pub fn spawn(config: HubConfig) -> HubHandle {
        let (hub, handle) = Self::new(config);
        tokio::spawn(hub.run());
        handle
    }

    /// Processes commands until every [`HubHandle`] is dropped.
    pub async fn run(mut self) {
        tracing::info!("hub dispatch loop started");

        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Register { record, ack } => {
                    self.register(record).await;
                    let _ = ack.send(());
                }
                HubCommand::Unregister { id, ack } => {
                    let removed = self.unregister(id).await;
                    let _ = ack.send(removed);
                }
                HubCommand::BroadcastAll { frame, ack } => {
                    let report = self.broadcast_all(&frame).await;
                    let _ = ack.send(report);
                }
            }
        }

        let mut members = self.members.write().await;
        for record in members.values() {
            record.mark_closing();
        }
        let remaining = members.len();
        members.clear();
        tracing::info!(remaining, "hub dispatch loop stopped");
    }

    async fn register(&self, record: ConnectionRecord) {
        let mut members = self.members.write().await;
        if members.contains_key(&record.id) {
            tracing::warn!(connection_id = %record.id, "duplicate registration ignored");
            return;
        }
        tracing::debug!(
            connection_id = %record.id,
            tag = %record.tag,
            members = members.len() + 1,
            "connection registered"
        );
        members.insert(record.id, record);
    }

    async fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.members.write().await.remove(&id);
        match removed {
            Some(record) => {
                record.mark_closing();
                tracing::debug!(connection_id = %id, tag = %record.tag, "connection unregistered");
                true
            }
            None => false,
        }
    }

    async fn broadcast_all(&self, frame: &Frame) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut members = self.members.write().await;

        members.retain(|id, record| match record.sender.try_send(frame.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %id, tag = %record.tag, "outbound queue full, evicting connection");
                record.mark_closing();
                report.evicted += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %id, tag = %record.tag, "outbound queue closed, evicting connection");
                record.mark_closing();
                report.evicted += 1;
                false
            }
        });

        report
    }
}

/// Cloneable entry point to a running [`Hub`].
///
/// Safe to share between any number of request-handling tasks.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    members: Arc<RwLock<Members>>,
    config: HubConfig,
}

impl HubHandle {
    /// Configuration the hub was created with.
    #[must_use]
    pub const fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Registers a connection on `tag` with the default queue capacity.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the dispatch loop has stopped.
    pub async fn register(&self, tag: ChannelTag) -> Result<ConnectionHandle, HubError> {
        self.register_with_capacity(tag, self.config.queue_capacity)
            .await
    }

    /// Registers a connection on `tag` whose queue holds `capacity` frames.
    ///
    /// The connection receives every broadcast issued after this returns.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the dispatch loop has stopped.
    pub async fn register_with_capacity(
        &self,
        tag: ChannelTag,
        capacity: usize,
    ) -> Result<ConnectionHandle, HubError> {
        let (record, handle) = ConnectionHandle::pair(tag, capacity, self.downgrade());
        self.request(|ack| HubCommand::Register { record, ack })
            .await?;
        Ok(handle)
    }

    /// Removes a connection and closes its queue.
    ///
    /// Returns `true` if the connection was a member. Unknown or
    /// already-removed connections are a no-op returning `false`. Does not
    /// wait for the connection's writer task.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the dispatch loop has stopped.
    pub async fn unregister(&self, id: ConnectionId) -> Result<bool, HubError> {
        self.request(|ack| HubCommand::Unregister { id, ack }).await
    }

    /// Sends `payload` to every registered connection.
    ///
    /// The payload is serialized once. Connections whose queue is full are
    /// evicted instead of slowing the broadcast down.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Serialization`] before anything is enqueued if
    /// the payload cannot be serialized, or [`HubError::Closed`] if the
    /// dispatch loop has stopped.
    pub async fn broadcast_all<T: Serialize + ?Sized>(
        &self,
        payload: &T,
    ) -> Result<BroadcastReport, HubError> {
        let frame = Frame::encode(payload)?;
        self.broadcast_frame(frame).await
    }

    /// Sends an already-serialized frame to every registered connection.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the dispatch loop has stopped.
    pub async fn broadcast_frame(&self, frame: Frame) -> Result<BroadcastReport, HubError> {
        let report = self
            .request(|ack| HubCommand::BroadcastAll { frame, ack })
            .await?;
        if report.evicted > 0 {
            tracing::info!(delivered = report.delivered, evicted = report.evicted, "broadcast evicted slow connections");
        }
        Ok(report)
    }

    /// Sends `payload` to every connection registered on exactly `tag`.
    ///
    /// The payload is serialized once. Targets are the members on `tag` when
    /// the call starts; one removed before its turn is skipped. Each enqueue
    /// waits for queue space, up to [`HubConfig::channel_send_timeout`];
    /// connections that time out or stopped reading are listed in
    /// [`ChannelReport::failed`] and stay registered.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Serialization`] before anything is enqueued if
    /// the payload cannot be serialized.
    pub async fn broadcast_to_channel<T: Serialize + ?Sized>(
        &self,
        tag: &ChannelTag,
        payload: &T,
    ) -> Result<ChannelReport, HubError> {
        let frame = Frame::encode(payload)?;
        let timeout = self.config.channel_send_timeout;
        let mut report = ChannelReport::default();

        // Snapshot the targets and release the lock before waiting, so a
        // stalled consumer never holds up the dispatch loop.
        let targets: Vec<(ConnectionId, mpsc::WeakSender<Frame>)> = {
            let members = self.members.read().await;
            members
                .values()
                .filter(|record| record.tag == *tag)
                .map(|record| (record.id, record.sender.downgrade()))
                .collect()
        };

        for (id, weak) in targets {
            // Removed since the snapshot: its queue is already closed.
            let Some(sender) = weak.upgrade() else {
                continue;
            };
            let reason = match tokio::time::timeout(timeout, sender.send(frame.clone())).await {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(_)) => DeliveryFailureReason::Closed,
                Err(_) => DeliveryFailureReason::TimedOut,
            };
            tracing::warn!(connection_id = %id, %tag, ?reason, "channel delivery failed");
            report.failed.push(DeliveryFailure {
                connection_id: id,
                reason,
            });
        }

        Ok(report)
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    /// Returns `true` if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    /// Returns `true` if `id` is currently registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.read().await.contains_key(&id)
    }

    /// Number of registered connections per channel tag.
    pub async fn channel_counts(&self) -> BTreeMap<ChannelTag, usize> {
        let members = self.members.read().await;
        let mut counts = BTreeMap::new();
        for record in members.values() {
            *counts.entry(record.tag.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Returns a weak handle that does not keep the dispatch loop alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakHubHandle {
        WeakHubHandle {
            commands: self.commands.downgrade(),
        }
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> HubCommand,
    ) -> Result<R, HubError> {
        let (ack, rx) = oneshot::channel();
        self.commands
            .send(command(ack))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

/// Weak counterpart of [`HubHandle`], held by connections.
#[derive(Clone)]
pub struct WeakHubHandle {
    commands: mpsc::WeakSender<HubCommand>,
}

impl WeakHubHandle {
    /// Unregisters `id` if the hub is still running.
    ///
    /// Returns `true` if this call removed the connection.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let Some(commands) = self.commands.upgrade() else {
            return false;
        };
        let (ack, rx) = oneshot::channel();
        if commands
            .send(HubCommand::Unregister { id, ack })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

impl fmt::Debug for WeakHubHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHubHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::ConnectionState;

    const WAIT: Duration = Duration::from_secs(2);

    fn hub() -> HubHandle {
        Hub::spawn(HubConfig::default())
    }

    fn hub_with_timeout(timeout: Duration) -> HubHandle {
        Hub::spawn(HubConfig {
            channel_send_timeout: timeout,
            ..HubConfig::default()
        })
    }

    async fn register(hub: &HubHandle, tag: &str) -> ConnectionHandle {
        let Ok(conn) = hub.register(ChannelTag::new(tag)).await else {
            panic!("register failed");
        };
        conn
    }

    fn next_text(conn: &mut ConnectionHandle) -> Option<String> {
        conn.try_recv().map(|frame| frame.as_str().to_string())
    }

    #[tokio::test]
    async fn register_then_broadcast_all_delivers() {
        let hub = hub();
        let mut conn = register(&hub, "x").await;

        let Ok(report) = hub.broadcast_all(&serde_json::json!({"n": 1})).await else {
            panic!("broadcast failed");
        };

        assert_eq!(report, BroadcastReport { delivered: 1, evicted: 0 });
        assert_eq!(next_text(&mut conn).as_deref(), Some(r#"{"n":1}"#));
        assert_eq!(conn.state(), ConnectionState::Active);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unregistered_connection_never_receives() {
        let hub = hub();
        for _ in 0..50 {
            let mut conn = register(&hub, "x").await;
            let id = conn.id();
            let (unregistered_tx, unregistered_rx) = oneshot::channel();

            let unregister_hub = hub.clone();
            let unregister = tokio::spawn(async move {
                let removed = unregister_hub.unregister(id).await;
                let _ = unregistered_tx.send(());
                removed
            });
            let broadcast_hub = hub.clone();
            let broadcast = tokio::spawn(async move {
                let _ = unregistered_rx.await;
                broadcast_hub.broadcast_all("after").await
            });

            let (Ok(Ok(removed)), Ok(Ok(report))) = tokio::join!(unregister, broadcast) else {
                panic!("task failed");
            };
            assert!(removed);
            assert_eq!(report.delivered, 0);
            assert_eq!(conn.recv().await, None);
            assert_eq!(conn.state(), ConnectionState::Closing);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_unregister_and_broadcast_agree() {
        let hub = hub();
        for _ in 0..50 {
            let mut conn = register(&hub, "x").await;
            let id = conn.id();

            let unregister_hub = hub.clone();
            let unregister = tokio::spawn(async move { unregister_hub.unregister(id).await });
            let broadcast_hub = hub.clone();
            let broadcast = tokio::spawn(async move { broadcast_hub.broadcast_all("raced").await });

            let (Ok(Ok(removed)), Ok(Ok(report))) = tokio::join!(unregister, broadcast) else {
                panic!("task failed");
            };
            assert!(removed);
            assert_eq!(report.evicted, 0);

            // Whichever command the loop applied first decides the outcome;
            // the report and the queue must tell the same story.
            let mut received = 0;
            while let Some(frame) = conn.recv().await {
                assert_eq!(frame.as_str(), "\"raced\"");
                received += 1;
            }
            assert_eq!(received, report.delivered);
        }
    }

    #[tokio::test]
    async fn unregister_drains_already_enqueued_frames() {
        let hub = hub();
        let mut conn = register(&hub, "x").await;

        let _ = hub.broadcast_all("before").await;
        let _ = hub.unregister(conn.id()).await;

        assert_eq!(next_text(&mut conn).as_deref(), Some("\"before\""));
        assert_eq!(conn.recv().await, None);
    }

    #[tokio::test]
    async fn channel_broadcast_matches_tag_exactly() {
        let hub = hub();
        let mut matching = register(&hub, "sales").await;
        let mut other = register(&hub, "Sales").await;
        let mut empty = register(&hub, "").await;

        let Ok(report) = hub
            .broadcast_to_channel(&ChannelTag::new("sales"), "hello")
            .await
        else {
            panic!("channel broadcast failed");
        };

        assert_eq!(report.delivered, 1);
        assert!(report.is_complete());
        assert!(next_text(&mut matching).is_some());
        assert!(next_text(&mut other).is_none());
        assert!(next_text(&mut empty).is_none());
    }

    #[tokio::test]
    async fn saturated_queue_is_evicted_without_blocking() {
        let hub = hub();
        let Ok(mut slow) = hub.register_with_capacity(ChannelTag::new("x"), 2).await else {
            panic!("register failed");
        };
        let mut fast = register(&hub, "x").await;

        for n in 0..2 {
            let _ = hub.broadcast_all(&n).await;
            let _ = fast.try_recv();
        }

        let Ok(Ok(report)) = tokio::time::timeout(WAIT, hub.broadcast_all(&2)).await else {
            panic!("broadcast blocked or failed");
        };

        assert_eq!(report, BroadcastReport { delivered: 1, evicted: 1 });
        assert!(!hub.contains(slow.id()).await);
        assert!(hub.contains(fast.id()).await);
        assert_eq!(slow.state(), ConnectionState::Closing);
        assert_eq!(slow.pending(), 2);
        assert_eq!(next_text(&mut slow).as_deref(), Some("0"));
        assert_eq!(next_text(&mut slow).as_deref(), Some("1"));
        assert_eq!(slow.recv().await, None);
    }

    #[tokio::test]
    async fn double_unregister_is_a_noop() {
        let hub = hub();
        let conn = register(&hub, "x").await;

        assert!(matches!(hub.unregister(conn.id()).await, Ok(true)));
        assert!(matches!(hub.unregister(conn.id()).await, Ok(false)));
        assert!(matches!(hub.unregister(ConnectionId::new()).await, Ok(false)));
        assert_eq!(conn.state(), ConnectionState::Closing);
    }

    #[tokio::test]
    async fn channel_broadcasts_arrive_in_order() {
        let hub = hub();
        let mut conn = register(&hub, "ordered").await;
        let tag = ChannelTag::new("ordered");

        let writer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(frame) = conn.recv().await {
                seen.push(frame.as_str().to_string());
            }
            seen
        });

        for n in 0..100 {
            let _ = hub.broadcast_to_channel(&tag, &n).await;
        }
        drop(hub);

        let Ok(Ok(seen)) = tokio::time::timeout(WAIT, writer).await else {
            panic!("writer did not finish");
        };
        let expected: Vec<String> = (0..100).map(|n: i32| n.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn scenario_channels_and_broadcast_all() {
        let hub = hub();
        let mut a = register(&hub, "x").await;
        let mut b = register(&hub, "y").await;
        let mut c = register(&hub, "x").await;

        let _ = hub.broadcast_to_channel(&ChannelTag::new("x"), "m").await;
        assert_eq!(next_text(&mut a).as_deref(), Some("\"m\""));
        assert_eq!(next_text(&mut b), None);
        assert_eq!(next_text(&mut c).as_deref(), Some("\"m\""));

        let _ = hub.broadcast_all("n").await;
        for conn in [&mut a, &mut b, &mut c] {
            assert_eq!(next_text(conn).as_deref(), Some("\"n\""));
        }
    }

    #[tokio::test]
    async fn scenario_capacity_one_evicted_on_second_broadcast() {
        let hub = hub();
        let _others = [register(&hub, "x").await, register(&hub, "y").await];
        let Ok(d) = hub.register_with_capacity(ChannelTag::new("x"), 1).await else {
            panic!("register failed");
        };
        assert_eq!(hub.len().await, 3);

        let Ok(first) = hub.broadcast_all("first").await else {
            panic!("broadcast failed");
        };
        assert_eq!(first.evicted, 0);
        assert!(hub.contains(d.id()).await);

        let Ok(second) = hub.broadcast_all("second").await else {
            panic!("broadcast failed");
        };
        assert_eq!(second.evicted, 1);
        assert!(!hub.contains(d.id()).await);
        assert_eq!(hub.len().await, 2);
    }

    #[tokio::test]
    async fn channel_broadcast_waits_for_queue_space() {
        let hub = hub();
        let Ok(mut conn) = hub.register_with_capacity(ChannelTag::new("x"), 1).await else {
            panic!("register failed");
        };
        let tag = ChannelTag::new("x");
        let _ = hub.broadcast_to_channel(&tag, "first").await;

        let mut pending = tokio_test::task::spawn(hub.broadcast_to_channel(&tag, "second"));
        tokio_test::assert_pending!(pending.poll());

        assert_eq!(next_text(&mut conn).as_deref(), Some("\"first\""));
        let Ok(report) = tokio_test::assert_ready!(pending.poll()) else {
            panic!("channel broadcast failed");
        };
        assert_eq!(report.delivered, 1);
        assert_eq!(next_text(&mut conn).as_deref(), Some("\"second\""));
    }

    #[tokio::test]
    async fn parked_channel_broadcast_does_not_block_the_loop() {
        let hub = hub_with_timeout(Duration::from_secs(30));
        let tag = ChannelTag::new("x");
        let Ok(stalled) = hub.register_with_capacity(tag.clone(), 1).await else {
            panic!("register failed");
        };
        let _ = hub.broadcast_to_channel(&tag, "first").await;

        let mut parked = tokio_test::task::spawn(hub.broadcast_to_channel(&tag, "second"));
        tokio_test::assert_pending!(parked.poll());

        let fast = Duration::from_millis(500);
        let Ok(Ok(other)) = tokio::time::timeout(fast, hub.register(ChannelTag::new("y"))).await
        else {
            panic!("register blocked behind a parked channel broadcast");
        };
        let Ok(Ok(report)) = tokio::time::timeout(fast, hub.broadcast_all("all")).await else {
            panic!("broadcast_all blocked behind a parked channel broadcast");
        };
        assert_eq!(report, BroadcastReport { delivered: 1, evicted: 1 });
        let Ok(Ok(true)) = tokio::time::timeout(fast, hub.unregister(other.id())).await else {
            panic!("unregister blocked behind a parked channel broadcast");
        };

        drop(stalled);
        let Ok(report) = tokio_test::assert_ready!(parked.poll()) else {
            panic!("channel broadcast failed");
        };
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].reason, DeliveryFailureReason::Closed);
    }

    #[tokio::test]
    async fn channel_broadcast_skips_connections_removed_before_their_turn() {
        let hub = hub_with_timeout(Duration::from_secs(30));
        let tag = ChannelTag::new("x");
        let Ok(first) = hub.register_with_capacity(tag.clone(), 1).await else {
            panic!("register failed");
        };
        let mut second = register(&hub, "x").await;
        let _ = hub.broadcast_to_channel(&tag, "fill").await;
        let _ = second.try_recv();

        // Whichever of the two is visited first, unregistering both leaves
        // nothing for the parked call to deliver.
        let mut parked = tokio_test::task::spawn(hub.broadcast_to_channel(&tag, "late"));
        let _ = parked.poll();
        let _ = hub.unregister(second.id()).await;
        let _ = hub.unregister(first.id()).await;
        drop(first);

        let Ok(Ok(report)) = tokio::time::timeout(WAIT, parked).await else {
            panic!("channel broadcast did not finish");
        };
        assert!(report.delivered <= 1);
        assert_eq!(second.recv().await.is_some(), report.delivered == 1);
        assert_eq!(second.recv().await, None);
    }

    #[tokio::test]
    async fn channel_broadcast_reports_stalled_connection() {
        let hub = hub_with_timeout(Duration::from_millis(20));
        let Ok(stalled) = hub.register_with_capacity(ChannelTag::new("x"), 1).await else {
            panic!("register failed");
        };
        let mut healthy = register(&hub, "x").await;
        let tag = ChannelTag::new("x");

        let _ = hub.broadcast_to_channel(&tag, &1).await;
        let _ = healthy.try_recv();

        let Ok(report) = hub.broadcast_to_channel(&tag, &2).await else {
            panic!("channel broadcast failed");
        };

        assert_eq!(report.delivered, 1);
        assert_eq!(report.targeted(), 2);
        assert_eq!(
            report.failed,
            vec![DeliveryFailure {
                connection_id: stalled.id(),
                reason: DeliveryFailureReason::TimedOut,
            }]
        );
        assert!(hub.contains(stalled.id()).await);
    }

    #[tokio::test]
    async fn channel_broadcast_reports_closed_writer() {
        let hub = hub();
        let mut conn = register(&hub, "x").await;
        let id = conn.id();
        // Close the receiving side without telling the hub.
        conn.receiver.close();

        let Ok(report) = hub.broadcast_to_channel(&ChannelTag::new("x"), "m").await else {
            panic!("channel broadcast failed");
        };
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].reason, DeliveryFailureReason::Closed);

        let Ok(all) = hub.broadcast_all("n").await else {
            panic!("broadcast failed");
        };
        assert_eq!(all.evicted, 1);
        assert!(!hub.contains(id).await);
    }

    #[tokio::test]
    async fn serialization_failure_enqueues_nothing() {
        let hub = hub();
        let mut conn = register(&hub, "x").await;
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8, 2], "value");

        let all = hub.broadcast_all(&bad).await;
        let channel = hub.broadcast_to_channel(&ChannelTag::new("x"), &bad).await;

        assert!(matches!(all, Err(HubError::Serialization(_))));
        assert!(matches!(channel, Err(HubError::Serialization(_))));
        assert_eq!(conn.pending(), 0);
        assert!(next_text(&mut conn).is_none());
    }

    #[tokio::test]
    async fn finish_unregisters_and_closes() {
        let hub = hub();
        let conn = register(&hub, "x").await;
        let id = conn.id();
        let link = conn.link();

        conn.finish().await;

        assert!(!hub.contains(id).await);
        assert!(!link.unregister().await);
    }

    #[tokio::test]
    async fn finish_after_eviction_is_harmless() {
        let hub = hub();
        let Ok(conn) = hub.register_with_capacity(ChannelTag::new("x"), 1).await else {
            panic!("register failed");
        };
        let _ = hub.broadcast_all("a").await;
        let _ = hub.broadcast_all("b").await;
        assert_eq!(conn.state(), ConnectionState::Closing);

        let link = conn.link();
        conn.finish().await;
        assert!(!link.unregister().await);
        assert!(hub.is_empty().await);
    }

    #[tokio::test]
    async fn channel_counts_group_by_tag() {
        let hub = hub();
        let _conns = [
            register(&hub, "x").await,
            register(&hub, "x").await,
            register(&hub, ChannelTag::GLOBAL).await,
        ];

        let counts = hub.channel_counts().await;
        assert_eq!(counts.get(&ChannelTag::new("x")), Some(&2));
        assert_eq!(counts.get(&ChannelTag::global()), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[tokio::test]
    async fn dropping_all_handles_stops_the_loop() {
        let hub = hub();
        let mut conn = register(&hub, "x").await;
        let link = conn.link();
        drop(hub);

        let Ok(next) = tokio::time::timeout(WAIT, conn.recv()).await else {
            panic!("queue was not closed");
        };
        assert_eq!(next, None);
        assert!(!link.unregister().await);
    }

    #[tokio::test]
    async fn concurrent_registrations_are_all_visible() {
        let hub = hub();
        let mut tasks = Vec::new();
        for n in 0..32 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                hub.register(ChannelTag::new(format!("tag-{}", n % 4))).await
            }));
        }
        let mut conns = Vec::new();
        for task in tasks {
            let Ok(Ok(conn)) = task.await else {
                panic!("registration task failed");
            };
            conns.push(conn);
        }

        let Ok(report) = hub.broadcast_all("hi").await else {
            panic!("broadcast failed");
        };
        assert_eq!(report.delivered, 32);
        assert_eq!(hub.channel_counts().await.len(), 4);
        for conn in &mut conns {
            assert!(next_text(conn).is_some());
        }
    }
}
