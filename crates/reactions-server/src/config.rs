//! Runtime configuration for the server and the connection hub.
//!
//! Built from [`ReactionsSettings`]; every duration is resolved once here so
//! the hot paths never touch millisecond integers.

use std::time::Duration;

use reactions_settings::ReactionsSettings;

use crate::websocket::heartbeat;

/// Shortest broadcast, stats and read-window period the hub runs with.
pub const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Timing and sizing for the [`Hub`](crate::websocket::broadcast::Hub).
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Period between snapshot broadcasts.
    pub broadcast_interval: Duration,
    /// Read deadline, refreshed by each pong.
    pub pong_wait: Duration,
    /// Bound on a single frame write.
    pub write_wait: Duration,
    /// Bound on placing a snapshot in one client's outbound queue.
    pub delivery_timeout: Duration,
    /// Outbound snapshots buffered per client.
    pub send_queue_size: usize,
    /// Inbound reactions buffered ahead of the aggregation loop.
    pub event_buffer: usize,
    /// Period of the connected-clients log line; `None` disables it.
    pub stats_interval: Option<Duration>,
    /// Bound on waiting for clients during shutdown.
    pub shutdown_timeout: Duration,
}

impl HubConfig {
    /// Interval between server pings.
    pub fn ping_period(&self) -> Duration {
        heartbeat::ping_period(self.pong_wait)
    }

    /// Raise periods below [`MIN_PERIOD`] and zero buffer sizes to usable
    /// minimums. Timeouts are left as given.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            broadcast_interval: self.broadcast_interval.max(MIN_PERIOD),
            pong_wait: self.pong_wait.max(MIN_PERIOD),
            send_queue_size: self.send_queue_size.max(1),
            event_buffer: self.event_buffer.max(1),
            stats_interval: self.stats_interval.map(|p| p.max(MIN_PERIOD)),
            ..self
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from(&ReactionsSettings::default())
    }
}

impl From<&ReactionsSettings> for HubConfig {
    fn from(settings: &ReactionsSettings) -> Self {
        let hub = &settings.hub;
        Self {
            broadcast_interval: Duration::from_millis(hub.broadcast_interval_ms),
            pong_wait: Duration::from_millis(hub.pong_wait_ms),
            write_wait: Duration::from_millis(hub.write_wait_ms),
            delivery_timeout: Duration::from_millis(hub.delivery_timeout_ms),
            send_queue_size: hub.send_queue_size,
            event_buffer: hub.event_buffer,
            stats_interval: (hub.stats_interval_ms > 0)
                .then(|| Duration::from_millis(hub.stats_interval_ms)),
            shutdown_timeout: settings.server.shutdown_timeout(),
        }
    }
}

/// Configuration for the reactions HTTP server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` auto-assigns).
    pub port: u16,
    /// Timeout for plain HTTP requests.
    pub request_timeout: Duration,
    /// Timeout for the `WebSocket` upgrade request.
    pub handshake_timeout: Duration,
    /// `WebSocket` read buffer size in bytes.
    pub read_buffer_size: usize,
    /// `WebSocket` write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Max inbound `WebSocket` message size in bytes.
    pub max_message_size: usize,
    /// Hub timing.
    pub hub: HubConfig,
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ReactionsSettings::default())
    }
}

impl From<&ReactionsSettings> for ServerConfig {
    fn from(settings: &ReactionsSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            request_timeout: settings.server.request_timeout(),
            handshake_timeout: settings.socket.handshake_timeout(),
            read_buffer_size: settings.socket.read_buffer_size,
            write_buffer_size: settings.socket.write_buffer_size,
            max_message_size: settings.socket.max_message_size,
            hub: HubConfig::from(settings),
        }
    }
}
