//! Error types for the hub, the wire transport, and snapshot delivery.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`Hub`](crate::websocket::broadcast::Hub) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    /// The event stream has been closed by shutdown. Callers must stop
    /// submitting reactions rather than retry.
    #[error("event stream closed")]
    StreamClosed,
    /// Shutdown has begun; no new connections are accepted.
    #[error("hub is shutting down")]
    ShuttingDown,
}

/// Errors raised by a client's duplex transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying `WebSocket` failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),
    /// The peer went away.
    #[error("connection closed")]
    Closed,
    /// A single frame write did not complete in time.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),
}

/// Why a snapshot could not be placed on a client's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The queue was already closed by teardown.
    #[error("outbound queue closed")]
    Closed,
    /// The queue stayed full for the whole delivery window.
    #[error("outbound queue full for {0:?}")]
    TimedOut(Duration),
}
