//! Inbound frame classification.

use reactions_core::{DecodeError, Reaction};

use super::transport::Frame;

/// What the read side should do with one inbound frame.
#[derive(Debug)]
pub enum Inbound {
    /// A reaction payload, decoded or not.
    Reaction(Result<Reaction, DecodeError>),
    /// Liveness reply; refreshes the read deadline.
    Pong,
    /// Peer-initiated ping; answered by the protocol layer.
    Ping,
    /// Peer closed the connection.
    Close,
}

/// Classify a frame. Text and binary frames both carry JSON reactions.
pub fn classify(frame: Frame) -> Inbound {
    match frame {
        Frame::Text(text) => Inbound::Reaction(Reaction::decode(text.as_bytes())),
        Frame::Binary(data) => Inbound::Reaction(Reaction::decode(&data)),
        Frame::Pong(_) => Inbound::Pong,
        Frame::Ping(_) => Inbound::Ping,
        Frame::Close => Inbound::Close,
    }
}
