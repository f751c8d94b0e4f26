//! The connection hub: live-client registry, event stream, snapshot fan-out
//! and shutdown orchestration.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use reactions_core::{AggregateSnapshot, Reaction};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, warn};

use super::aggregation;
use super::connection::{Client, ClientId};
use super::session::{self, PumpTiming};
use super::transport::Transport;
use crate::config::HubConfig;
use crate::errors::{DeliveryError, HubError};
use crate::metrics::{REACTIONS_BROADCASTS_TOTAL, REACTIONS_EVENTS_TOTAL, WS_BROADCAST_DROPS_TOTAL};

/// What a client pump may ask of the hub.
///
/// Pumps hold this back-reference only to submit reactions and to request
/// their own removal; they never touch registry state directly.
#[async_trait]
pub trait HubHandle: Send + Sync {
    /// Submit a reaction to the event stream.
    async fn register_event(&self, reaction: Reaction) -> Result<(), HubError>;
    /// Remove a client from the registry. Returns whether it was present.
    fn disconnect_subscriber(&self, client_id: &ClientId) -> bool;
}

/// Registry of live clients plus the aggregation pipeline feeding them.
pub struct Hub {
    config: HubConfig,
    clients: RwLock<HashMap<ClientId, Arc<Client>>>,
    /// Producer side of the event stream; `None` once shutdown closed it.
    events_tx: Mutex<Option<mpsc::Sender<Reaction>>>,
    /// Consumer side, taken by the first [`Hub::start`].
    events_rx: Mutex<Option<mpsc::Receiver<Reaction>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutting_down: AtomicBool,
    cancel: CancellationToken,
    /// Span current at construction; parent of every task the hub spawns.
    span: Span,
}

impl Hub {
    /// Create a hub. Nothing runs until [`Hub::start`].
    ///
    /// Zero sizes and intervals in `config` are raised to their minimums.
    pub fn new(config: HubConfig) -> Self {
        let config = config.normalized();
        let (tx, rx) = mpsc::channel(config.event_buffer);
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
            events_tx: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(rx)),
            tasks: Mutex::new(Vec::new()),
            shutting_down: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            span: Span::current(),
        }
    }

    /// Hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Launch the aggregation loop (and the stats reporter, when enabled).
    ///
    /// Only the first call does anything; later calls log and return `false`.
    pub fn start(self: &Arc<Self>) -> bool {
        let Some(events) = self.events_rx.lock().take() else {
            warn!("hub already started");
            return false;
        };

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(
            aggregation::run(Arc::clone(self), events).instrument(self.span.clone()),
        ));
        if let Some(period) = self.config.stats_interval {
            tasks.push(tokio::spawn(
                aggregation::report_stats(Arc::clone(self), period, self.cancel.clone())
                    .instrument(self.span.clone()),
            ));
        }
        info!(
            broadcast_interval_ms = self.config.broadcast_interval.as_millis(),
            "hub started"
        );
        true
    }

    /// Register a freshly upgraded connection and start its pump.
    ///
    /// Returns as soon as the client is registered; the pump runs on its
    /// own task. Rejected once shutdown has begun.
    pub fn register_connection<T: Transport>(self: &Arc<Self>, conn: T) -> Result<ClientId, HubError> {
        let (client, queue) = Client::new(ClientId::new(), self.config.send_queue_size);
        let client = Arc::new(client);
        self.insert(Arc::clone(&client))?;

        let id = client.id().clone();
        debug!(client_id = %id, "registered client");
        let hub = Arc::clone(self) as Arc<dyn HubHandle>;
        let timing = PumpTiming::from(&self.config);
        let pump = self
            .span
            .in_scope(|| session::run_client(client, conn, queue, hub, timing));
        drop(tokio::spawn(pump));
        Ok(id)
    }

    /// Insert a client under the write lock, unless shutdown has begun.
    pub(crate) fn insert(&self, client: Arc<Client>) -> Result<(), HubError> {
        let mut clients = self.clients.write();
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(HubError::ShuttingDown);
        }
        let _ = clients.insert(client.id().clone(), client);
        Ok(())
    }

    /// Submit a reaction, waiting until the event stream accepts it.
    ///
    /// Fails with [`HubError::StreamClosed`] once shutdown has closed the
    /// stream.
    pub async fn register_event(&self, reaction: Reaction) -> Result<(), HubError> {
        let tx = self.events_tx.lock().clone();
        let Some(tx) = tx else {
            return Err(HubError::StreamClosed);
        };
        tx.send(reaction).await.map_err(|_| HubError::StreamClosed)?;
        counter!(REACTIONS_EVENTS_TOTAL).increment(1);
        Ok(())
    }

    /// Remove a client. Removing an absent client is a no-op.
    pub fn disconnect_subscriber(&self, client_id: &ClientId) -> bool {
        let removed = self.clients.write().remove(client_id).is_some();
        if removed {
            debug!(client_id = %client_id, "deregistered client");
        }
        removed
    }

    /// Number of registered clients right now.
    pub fn subscribed_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Point-in-time copy of the registered clients.
    pub fn subscribers(&self) -> Vec<Arc<Client>> {
        self.clients.read().values().cloned().collect()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Deliver a snapshot to every registered client.
    ///
    /// Each delivery waits at most `delivery_timeout`. Clients that cannot
    /// take the snapshot are deregistered and told to stop. Returns the
    /// number of clients that received it.
    pub async fn fan_out(&self, snapshot: AggregateSnapshot) -> usize {
        let snapshot = Arc::new(snapshot);
        let recipients = self.subscribers();
        let wait = self.config.delivery_timeout;

        let results = join_all(recipients.iter().map(|client| {
            let snapshot = Arc::clone(&snapshot);
            async move { client.deliver(snapshot, wait).await }
        }))
        .await;

        let mut delivered = 0;
        for (client, result) in recipients.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    match e {
                        DeliveryError::TimedOut(_) => {
                            warn!(
                                client_id = %client.id(),
                                dropped = client.drop_count(),
                                error = %e,
                                "client cannot keep up, disconnecting"
                            );
                        }
                        DeliveryError::Closed => {
                            debug!(client_id = %client.id(), "client already closing");
                        }
                    }
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    let _ = self.disconnect_subscriber(client.id());
                    client.stop();
                }
            }
        }
        counter!(REACTIONS_BROADCASTS_TOTAL).increment(1);
        delivered
    }

    /// Stop every client, then close the event stream and wait for the
    /// aggregation loop to exit.
    ///
    /// Clients that do not finish within the shutdown timeout are removed
    /// and their queues closed. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        let clients = self.subscribers();
        info!(client_count = clients.len(), "shutting down hub");
        for client in &clients {
            client.stop();
        }

        let timeout = self.config.shutdown_timeout;
        let drain = join_all(clients.iter().map(|client| client.terminated()));
        if time::timeout(timeout, drain).await.is_err() {
            let stragglers: Vec<_> = clients.iter().filter(|c| !c.is_terminated()).collect();
            warn!(
                count = stragglers.len(),
                "clients did not stop within {timeout:?}, forcing removal"
            );
            for client in stragglers {
                let _ = self.disconnect_subscriber(client.id());
                let _ = client.close_queue();
            }
        }

        drop(self.events_tx.lock().take());
        drop(self.events_rx.lock().take());

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        if time::timeout(timeout, join_all(tasks)).await.is_err() {
            warn!("aggregation loop did not exit within {timeout:?}");
        }
        info!("hub shut down");
    }
}

#[async_trait]
impl HubHandle for Hub {
    async fn register_event(&self, reaction: Reaction) -> Result<(), HubError> {
        Hub::register_event(self, reaction).await
    }

    fn disconnect_subscriber(&self, client_id: &ClientId) -> bool {
        Hub::disconnect_subscriber(self, client_id)
    }
}
