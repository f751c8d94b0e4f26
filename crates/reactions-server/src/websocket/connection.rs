//! Per-client state shared between the hub and the client's pump.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reactions_core::AggregateSnapshot;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::DeliveryError;

/// Opaque unique client identifier (`client_<uuid-v7>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    /// Fresh identifier.
    pub fn new() -> Self {
        Self(format!("client_{}", Uuid::now_v7()))
    }

    /// String form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Pump lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Both read and write sides are active.
    Running,
    /// One side has stopped; the other is winding down.
    Draining,
    /// Teardown finished.
    Closed,
}

/// Outbound queue of broadcast snapshots.
pub type SnapshotQueue = mpsc::Receiver<Arc<AggregateSnapshot>>;

/// A connected client.
///
/// The hub's registry owns membership; the client owns its outbound queue
/// and the signals its pump uses to stop and report termination.
pub struct Client {
    id: ClientId,
    /// `None` once the queue has been closed.
    outbound: Mutex<Option<mpsc::Sender<Arc<AggregateSnapshot>>>>,
    stop: CancellationToken,
    terminated: CancellationToken,
    torn_down: AtomicBool,
    state: Mutex<ClientState>,
    connected_at: Instant,
    dropped_snapshots: AtomicU64,
}

impl Client {
    /// New client with an outbound queue of `queue_size` snapshots (at
    /// least one).
    pub fn new(id: ClientId, queue_size: usize) -> (Self, SnapshotQueue) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let client = Self {
            id,
            outbound: Mutex::new(Some(tx)),
            stop: CancellationToken::new(),
            terminated: CancellationToken::new(),
            torn_down: AtomicBool::new(false),
            state: Mutex::new(ClientState::Running),
            connected_at: Instant::now(),
            dropped_snapshots: AtomicU64::new(0),
        };
        (client, rx)
    }

    /// Client identifier.
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Queue a snapshot, waiting at most `wait` for space.
    pub async fn deliver(
        &self,
        snapshot: Arc<AggregateSnapshot>,
        wait: Duration,
    ) -> Result<(), DeliveryError> {
        let tx = self.outbound.lock().clone();
        let result = match tx {
            None => Err(DeliveryError::Closed),
            Some(tx) => match tx.send_timeout(snapshot, wait).await {
                Ok(()) => Ok(()),
                Err(mpsc::error::SendTimeoutError::Closed(_)) => Err(DeliveryError::Closed),
                Err(mpsc::error::SendTimeoutError::Timeout(_)) => Err(DeliveryError::TimedOut(wait)),
            },
        };
        if result.is_err() {
            let _ = self.dropped_snapshots.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Close the outbound queue. Returns `true` only for the call that
    /// actually closed it.
    pub fn close_queue(&self) -> bool {
        self.outbound.lock().take().is_some()
    }

    /// Whether the outbound queue has been closed.
    pub fn is_queue_closed(&self) -> bool {
        self.outbound.lock().is_none()
    }

    /// Ask both pump sides to stop.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Whether a stop has been requested.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub(crate) fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Claim the right to run teardown; only the first caller gets `true`.
    pub(crate) fn begin_teardown(&self) -> bool {
        !self.torn_down.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn mark_draining(&self) {
        let mut state = self.state.lock();
        if *state == ClientState::Running {
            *state = ClientState::Draining;
        }
    }

    pub(crate) fn mark_closed(&self) {
        *self.state.lock() = ClientState::Closed;
        self.terminated.cancel();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        *self.state.lock()
    }

    /// Resolves once teardown has finished.
    pub async fn terminated(&self) {
        self.terminated.cancelled().await;
    }

    /// Whether teardown has finished.
    pub fn is_terminated(&self) -> bool {
        self.terminated.is_cancelled()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Snapshots that could not be delivered to this client.
    pub fn drop_count(&self) -> u64 {
        self.dropped_snapshots.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("queue_closed", &self.is_queue_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(visitors: usize) -> Arc<AggregateSnapshot> {
        Arc::new(AggregateSnapshot::from_window(&[], visitors))
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = ClientId::new();
        let b = ClientId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("client_"));
        assert_eq!(a.to_string(), a.as_str());
    }

    #[test]
    fn starts_running() {
        let (client, _rx) = Client::new("c1".into(), 4);
        assert_eq!(client.state(), ClientState::Running);
        assert!(!client.is_stopping());
        assert!(!client.is_terminated());
        assert!(!client.is_queue_closed());
    }

    #[tokio::test]
    async fn deliver_enqueues_snapshot() {
        let (client, mut rx) = Client::new("c1".into(), 4);
        client
            .deliver(snapshot(3), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().visitors, 3);
        assert_eq!(client.drop_count(), 0);
    }

    #[tokio::test]
    async fn zero_queue_size_holds_one_snapshot() {
        let (client, mut rx) = Client::new("c1".into(), 0);
        client
            .deliver(snapshot(1), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().visitors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deliver_times_out_on_full_queue() {
        let (client, _rx) = Client::new("c1".into(), 1);
        client
            .deliver(snapshot(1), Duration::from_millis(10))
            .await
            .unwrap();
        let err = client
            .deliver(snapshot(2), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::TimedOut(Duration::from_millis(10)));
        assert_eq!(client.drop_count(), 1);
    }

    #[tokio::test]
    async fn deliver_after_close_fails() {
        let (client, _rx) = Client::new("c1".into(), 4);
        assert!(client.close_queue());
        let err = client
            .deliver(snapshot(1), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::Closed);
    }

    #[tokio::test]
    async fn deliver_to_dropped_receiver_fails() {
        let (client, rx) = Client::new("c1".into(), 4);
        drop(rx);
        let err = client
            .deliver(snapshot(1), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::Closed);
    }

    #[tokio::test]
    async fn closing_queue_ends_receiver() {
        let (client, mut rx) = Client::new("c1".into(), 4);
        assert!(client.close_queue());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn queue_closes_once() {
        let (client, _rx) = Client::new("c1".into(), 4);
        assert!(client.close_queue());
        assert!(!client.close_queue());
        assert!(client.is_queue_closed());
    }

    #[test]
    fn racing_closers_close_exactly_once() {
        let (client, _rx) = Client::new("c1".into(), 4);
        let client = Arc::new(client);
        let closed: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| client.close_queue()))
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });
        assert_eq!(closed, 1);
    }

    #[test]
    fn teardown_claimed_once() {
        let (client, _rx) = Client::new("c1".into(), 4);
        assert!(client.begin_teardown());
        assert!(!client.begin_teardown());
    }

    #[test]
    fn state_transitions() {
        let (client, _rx) = Client::new("c1".into(), 4);
        client.mark_draining();
        assert_eq!(client.state(), ClientState::Draining);
        client.mark_closed();
        assert_eq!(client.state(), ClientState::Closed);
        client.mark_draining();
        assert_eq!(client.state(), ClientState::Closed);
        assert!(client.is_terminated());
    }

    #[tokio::test]
    async fn terminated_resolves_after_close() {
        let (client, _rx) = Client::new("c1".into(), 4);
        let client = Arc::new(client);
        let waiter = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.terminated().await })
        };
        client.mark_closed();
        waiter.await.unwrap();
    }
}
