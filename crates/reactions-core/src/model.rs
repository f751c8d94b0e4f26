//! Wire-level data model: inbound reactions and outbound snapshots.

use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate;
use crate::errors::DecodeError;

/// One inbound reaction.
///
/// Only `type` is kept. A client-supplied `count` must still be an integer
/// when present, but its value is discarded; every message counts once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Reaction type label (e.g. `"heart"`).
    #[serde(rename = "type")]
    pub kind: String,
}

/// Inbound shape of a reaction message.
#[derive(Deserialize)]
struct ReactionMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, rename = "count")]
    _count: Option<i64>,
}

impl Reaction {
    /// Create a reaction of the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    /// Decode a reaction from a JSON payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let message: ReactionMessage = serde_json::from_slice(payload)?;
        if message.kind.is_empty() {
            return Err(DecodeError::EmptyType);
        }
        Ok(Self { kind: message.kind })
    }
}

/// Number of reactions of one type within a broadcast window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    /// Reaction type label.
    #[serde(rename = "type")]
    pub kind: String,
    /// Occurrences of this type in the window.
    pub count: u64,
}

/// Periodic broadcast payload sent to every connected client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    /// Per-type counts for the window, ordered by type name.
    #[serde(rename = "emojis")]
    pub items: Vec<ReactionCount>,
    /// Connected clients at the moment the snapshot was taken.
    pub visitors: usize,
}

impl AggregateSnapshot {
    /// Build a snapshot from one window of reactions.
    pub fn from_window(window: &[Reaction], visitors: usize) -> Self {
        let items = aggregate(window)
            .into_iter()
            .map(|(kind, count)| ReactionCount { kind, count })
            .collect();
        Self { items, visitors }
    }

    /// Count recorded for `kind`, if it appeared in the window.
    pub fn count_of(&self, kind: &str) -> Option<u64> {
        self.items.iter().find(|i| i.kind == kind).map(|i| i.count)
    }
}
