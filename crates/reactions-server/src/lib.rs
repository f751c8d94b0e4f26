//! # reactions-server
//!
//! Axum HTTP + `WebSocket` server for the reactions broadcaster.
//!
//! - `WebSocket` gateway: connection registry, per-client read/write pump,
//!   ping/pong liveness with read deadlines
//! - Windowed aggregation of inbound reactions and periodic snapshot fan-out
//!   with bounded per-client delivery
//! - HTTP endpoints: `/stats`, `/health`, `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
