//! Client pump: bridges one duplex connection to the hub.
//!
//! The read side decodes reactions and forwards them to the hub; the write
//! side drains the outbound snapshot queue and sends periodic pings. Both run
//! inside one task and share the client's stop token. Whichever side ends
//! first cancels the other, and teardown runs once both have returned.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::time;
use tracing::{debug, info, instrument, warn};

use super::broadcast::HubHandle;
use super::connection::{Client, SnapshotQueue};
use super::handler::{Inbound, classify};
use super::heartbeat::{self, ReadDeadline};
use super::transport::{Frame, Transport};
use crate::config::HubConfig;
use crate::errors::TransportError;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Liveness and write bounds for one pump.
#[derive(Clone, Copy, Debug)]
pub struct PumpTiming {
    /// Read deadline, refreshed by pongs.
    pub pong_wait: Duration,
    /// Interval between pings.
    pub ping_period: Duration,
    /// Bound on each frame write.
    pub write_wait: Duration,
}

impl From<&HubConfig> for PumpTiming {
    fn from(config: &HubConfig) -> Self {
        Self {
            pong_wait: config.pong_wait,
            ping_period: config.ping_period(),
            write_wait: config.write_wait,
        }
    }
}

/// Run a client's read and write sides until either stops, then tear down.
#[instrument(skip_all, fields(client_id = %client.id()))]
pub async fn run_client<T: Transport>(
    client: Arc<Client>,
    transport: T,
    queue: SnapshotQueue,
    hub: Arc<dyn HubHandle>,
    timing: PumpTiming,
) {
    let (sink, stream): (SplitSink<T, Frame>, SplitStream<T>) = transport.split();

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let (stream, sink) = tokio::join!(
        read_loop(&client, stream, hub.as_ref(), timing.pong_wait),
        write_loop(&client, sink, queue, timing),
    );

    teardown(&client, hub.as_ref(), sink, timing.write_wait).await;
    drop(stream);
}

async fn read_loop<S>(client: &Client, mut stream: S, hub: &dyn HubHandle, pong_wait: Duration) -> S
where
    S: Stream<Item = Result<Frame, TransportError>> + Unpin,
{
    let stop = client.stop_token();
    let mut deadline = ReadDeadline::new(pong_wait);

    loop {
        let next = tokio::select! {
            () = stop.cancelled() => break,
            next = time::timeout_at(deadline.deadline(), stream.next()) => next,
        };

        let frame = match next {
            Err(_) => {
                info!(window = ?deadline.window(), "no pong within read window, dropping client");
                break;
            }
            Ok(None) => {
                debug!("connection closed by peer");
                break;
            }
            Ok(Some(Err(e))) => {
                info!(error = %e, "read failed");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match classify(frame) {
            Inbound::Pong => deadline.refresh(),
            Inbound::Ping => {}
            Inbound::Close => {
                debug!("client sent close frame");
                break;
            }
            Inbound::Reaction(Err(e)) => {
                warn!(error = %e, "could not decode reaction");
                break;
            }
            Inbound::Reaction(Ok(reaction)) => {
                tokio::select! {
                    () = stop.cancelled() => break,
                    result = hub.register_event(reaction) => {
                        if let Err(e) = result {
                            debug!(error = %e, "hub stopped accepting reactions");
                            break;
                        }
                    }
                }
            }
        }
    }

    client.mark_draining();
    stop.cancel();
    stream
}

async fn write_loop<K>(client: &Client, mut sink: K, mut queue: SnapshotQueue, timing: PumpTiming) -> K
where
    K: Sink<Frame, Error = TransportError> + Unpin,
{
    let stop = client.stop_token();
    let mut ping = heartbeat::ping_interval(timing.ping_period);

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            next = queue.recv() => {
                let Some(snapshot) = next else {
                    debug!("outbound queue closed");
                    break;
                };
                let json = match serde_json::to_string(&*snapshot) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "could not serialize snapshot");
                        break;
                    }
                };
                if let Err(e) = write_frame(&mut sink, Frame::Text(json), timing.write_wait).await {
                    info!(error = %e, "snapshot write failed");
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = write_frame(&mut sink, Frame::Ping(Bytes::new()), timing.write_wait).await {
                    info!(error = %e, "ping failed");
                    break;
                }
            }
        }
    }

    client.mark_draining();
    stop.cancel();
    sink
}

async fn write_frame<K>(sink: &mut K, frame: Frame, wait: Duration) -> Result<(), TransportError>
where
    K: Sink<Frame, Error = TransportError> + Unpin,
{
    time::timeout(wait, sink.send(frame))
        .await
        .map_err(|_| TransportError::WriteTimeout(wait))?
}

/// Deregister, send a close frame, close the connection, close the queue.
async fn teardown<K>(client: &Client, hub: &dyn HubHandle, mut sink: K, write_wait: Duration)
where
    K: Sink<Frame, Error = TransportError> + Unpin,
{
    if !client.begin_teardown() {
        return;
    }

    let removed = hub.disconnect_subscriber(client.id());
    let _ = write_frame(&mut sink, Frame::Close, write_wait).await;
    let _ = time::timeout(write_wait, sink.close()).await;
    let _ = client.close_queue();
    client.mark_closed();

    let age = client.age();
    info!(
        removed,
        dropped = client.drop_count(),
        duration_secs = age.as_secs(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(age.as_secs_f64());
}
