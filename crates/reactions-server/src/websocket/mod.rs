//! `WebSocket` connection hub: registry, per-client pump, aggregation loop.

pub mod aggregation;
pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod session;
pub mod transport;
