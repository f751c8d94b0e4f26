//! Duplex frame transport between a client pump and the wire.
//!
//! The pump only sees [`Frame`]s; [`WsTransport`] adapts an axum
//! [`WebSocket`] to that shape.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::{Sink, Stream};
use pin_project_lite::pin_project;

use crate::errors::TransportError;

/// One frame on a client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload.
    Text(String),
    /// Binary payload.
    Binary(Bytes),
    /// Liveness check.
    Ping(Bytes),
    /// Liveness reply.
    Pong(Bytes),
    /// Connection close.
    Close,
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Self::Text(text.to_string()),
            Message::Binary(data) => Self::Binary(data),
            Message::Ping(data) => Self::Ping(data),
            Message::Pong(data) => Self::Pong(data),
            Message::Close(_) => Self::Close,
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Self::Text(text.into()),
            Frame::Binary(data) => Self::Binary(data),
            Frame::Ping(data) => Self::Ping(data),
            Frame::Pong(data) => Self::Pong(data),
            Frame::Close => Self::Close(None),
        }
    }
}

/// A duplex connection the hub can pump: a stream of inbound frames and a
/// sink for outbound ones.
pub trait Transport:
    Stream<Item = Result<Frame, TransportError>> + Sink<Frame, Error = TransportError> + Send + 'static
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<Frame, TransportError>>
        + Sink<Frame, Error = TransportError>
        + Send
        + 'static
{
}

pin_project! {
    /// [`Transport`] over an upgraded axum `WebSocket`.
    pub struct WsTransport {
        #[pin]
        socket: WebSocket,
    }
}

impl WsTransport {
    /// Wrap an upgraded socket.
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Stream for WsTransport {
    type Item = Result<Frame, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project()
            .socket
            .poll_next(cx)
            .map(|next| next.map(|res| res.map(Frame::from).map_err(TransportError::from)))
    }
}

impl Sink<Frame> for WsTransport {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().socket.poll_ready(cx).map_err(Into::into)
    }

    fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        self.project()
            .socket
            .start_send(Message::from(item))
            .map_err(Into::into)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().socket.poll_flush(cx).map_err(Into::into)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().socket.poll_close(cx).map_err(Into::into)
    }
}
