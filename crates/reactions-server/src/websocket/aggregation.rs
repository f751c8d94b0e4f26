//! Windowed aggregation loop and the connected-clients reporter.

use std::sync::Arc;
use std::time::Duration;

use reactions_core::{AggregateSnapshot, Reaction};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::broadcast::Hub;

/// Buffer reactions and broadcast a snapshot every broadcast interval.
///
/// The buffer is owned by this loop alone; producers reach it only through
/// the event channel. Returns once every sender has been dropped.
pub(crate) async fn run(hub: Arc<Hub>, mut events: mpsc::Receiver<Reaction>) {
    let period = hub.config().broadcast_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut window: Vec<Reaction> = Vec::new();

    loop {
        tokio::select! {
            next = events.recv() => match next {
                Some(reaction) => window.push(reaction),
                None => {
                    info!(pending = window.len(), "event stream closed, stopping broadcasts");
                    return;
                }
            },
            _ = ticker.tick() => {
                let snapshot = AggregateSnapshot::from_window(&window, hub.subscribed_count());
                window.clear();
                let item_count = snapshot.items.len();
                let client_count = snapshot.visitors;
                let delivered = hub.fan_out(snapshot).await;
                debug!(item_count, client_count, delivered, "broadcast snapshot");
            }
        }
    }
}

/// Log the connected-client count every `period` until `cancel` fires.
pub(crate) async fn report_stats(hub: Arc<Hub>, period: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = ticker.tick() => info!(client_count = hub.subscribed_count(), "connected clients"),
        }
    }
}
