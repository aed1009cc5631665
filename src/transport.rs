//! The persistent connection a session runs over.
//!
//! [`Transport`] is the seam between the session loop and the network:
//! production sessions use [`WebSocketTransport`], tests can drive the loop
//! through an in-memory implementation.

use std::future::Future;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;

/// Close code sent after a fatal session error.
pub const CLOSE_INTERNAL_ERROR: u16 = close_code::ERROR;
/// Close code sent on orderly shutdown.
pub const CLOSE_NORMAL: u16 = close_code::NORMAL;

/// One application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(bytes) => bytes,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),
    #[error("websocket upgrade failed: {0}")]
    Upgrade(String),
    #[error("connection closed")]
    Closed,
}

pub trait Transport: Send {
    fn send(&mut self, frame: Frame) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Next application frame. `None` once the peer has closed the connection
    /// or the stream ended.
    fn recv(&mut self) -> impl Future<Output = Option<Result<Frame, TransportError>>> + Send;

    /// Send a close frame. Closing an already closed transport is a no-op.
    fn close(
        &mut self,
        code: u16,
        reason: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// An upgraded axum WebSocket.
pub struct WebSocketTransport {
    ws_tx: SplitSink<WebSocket, Message>,
    ws_rx: SplitStream<WebSocket>,
    closed: bool,
}

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        let (ws_tx, ws_rx) = socket.split();
        Self {
            ws_tx,
            ws_rx,
            closed: false,
        }
    }
}

impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let msg = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        self.ws_tx.send(msg).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        if self.closed {
            return None;
        }
        loop {
            match self.ws_rx.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(Ok(Frame::Text(text.as_str().to_owned())))
                }
                Some(Ok(Message::Binary(bytes))) => return Some(Ok(Frame::Binary(bytes))),
                Some(Ok(Message::Close(_))) | None => {
                    self.closed = true;
                    return None;
                }
                Some(Ok(_)) => continue, // Ping/Pong handled by axum
                Some(Err(e)) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let frame = CloseFrame {
            code,
            reason: reason.to_owned().into(),
        };
        self.ws_tx.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}
