//! # reactions-core
//!
//! Shared building blocks for the reactions broadcaster.
//!
//! - [`Reaction`]: one inbound reaction decoded from the wire
//! - [`AggregateSnapshot`]: the periodic broadcast payload
//! - [`aggregate`]: pure grouping of a window of reactions into per-type counts
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod aggregate;
pub mod errors;
pub mod logging;
pub mod model;

pub use aggregate::aggregate;
pub use errors::DecodeError;
pub use model::{AggregateSnapshot, Reaction, ReactionCount};
