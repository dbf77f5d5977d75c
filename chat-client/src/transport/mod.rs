//! Transport abstraction for the push channel.
//!
//! The transport moves whole STOMP frames as text and knows nothing about
//! the STOMP protocol itself. The connection manager layers the handshake,
//! heartbeats and subscriptions on top.
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` opens the socket
//! - `send()` writes one text frame
//! - `recv()` waits for the next text frame
//! - `close()` terminates the socket
//!
//! `send()` and `recv()` may run concurrently: the driver task sits in
//! `recv()` while publishes go out through `send()`.

mod mock;
mod ws;

pub use mock::MockTransport;
pub use ws::WsTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// A duplex text channel carrying STOMP frames.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `address` (a `ws://` or `wss://` URL).
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send one text frame.
    async fn send(&self, frame: &str) -> Result<(), TransportError>;

    /// Receive the next text frame.
    ///
    /// Waits until a frame is available or the connection closes.
    async fn recv(&self) -> Result<String, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection.
    async fn close(&self) -> Result<(), TransportError>;
}
