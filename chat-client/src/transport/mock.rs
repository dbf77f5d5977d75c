//! Mock transport for testing.
//!
//! Frames queued with [`MockTransport::queue_response`] are handed out by
//! `recv()`; everything written with `send()` is captured for inspection.
//! Unlike a finished socket, an empty queue makes `recv()` wait, so the
//! connection manager's driver can idle on it the way it idles on a real
//! server.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Mock transport for testing.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    wakeup: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    connect_count: usize,
    connect_reply: Option<String>,
    sent_frames: Vec<String>,
    receive_queue: VecDeque<String>,
    drop_pending: bool,
    fail_next_connect: Option<String>,
    fail_connects: usize,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that answers every successful `connect()` with `frame`, queued
    /// ahead of anything else (typically a STOMP `CONNECTED`).
    pub fn with_connect_reply(frame: impl Into<String>) -> Self {
        let transport = Self::new();
        transport.lock().connect_reply = Some(frame.into());
        transport
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a frame to be returned by a later `recv()` call.
    pub fn queue_response(&self, frame: impl Into<String>) {
        self.lock().receive_queue.push_back(frame.into());
        self.wakeup.notify_waiters();
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<String> {
        self.lock().sent_frames.clone()
    }

    /// Get the last frame that was sent.
    pub fn last_sent(&self) -> Option<String> {
        self.lock().sent_frames.last().cloned()
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        self.lock().connected_address.clone()
    }

    /// Number of successful `connect()` calls so far.
    pub fn connect_count(&self) -> usize {
        self.lock().connect_count
    }

    /// Simulate the server going away: the pending or next `recv()` fails
    /// with [`TransportError::ConnectionClosed`].
    pub fn drop_connection(&self) {
        self.lock().drop_pending = true;
        self.wakeup.notify_waiters();
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next `count` connect() calls to fail.
    pub fn fail_connects(&self, count: usize) {
        self.lock().fail_connects = count;
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// Cause the next recv() to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        self.lock().fail_next_recv = Some(error.to_string());
    }

    /// Clear all state (frames, queue, connection). Keeps the connect reply.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let reply = inner.connect_reply.take();
        *inner = MockTransportInner {
            connect_reply: reply,
            ..Default::default()
        };
        drop(inner);
        self.wakeup.notify_waiters();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();

        // Forced failures
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }
        if inner.fail_connects > 0 {
            inner.fail_connects -= 1;
            return Err(TransportError::ConnectionFailed("refused".into()));
        }

        inner.connected = true;
        inner.drop_pending = false;
        inner.connect_count += 1;
        inner.connected_address = Some(address.to_string());
        if let Some(reply) = inner.connect_reply.clone() {
            inner.receive_queue.push_front(reply);
        }
        drop(inner);
        self.wakeup.notify_waiters();
        Ok(())
    }

    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_frames.push(frame.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<String, TransportError> {
        loop {
            // Registered before the checks so a wakeup in between is not lost.
            let wakeup = self.wakeup.notified();
            {
                let mut inner = self.lock();

                if !inner.connected {
                    return Err(TransportError::NotConnected);
                }
                if let Some(error) = inner.fail_next_recv.take() {
                    return Err(TransportError::ReceiveFailed(error));
                }
                if inner.drop_pending {
                    inner.drop_pending = false;
                    inner.connected = false;
                    return Err(TransportError::ConnectionClosed);
                }
                if let Some(frame) = inner.receive_queue.pop_front() {
                    return Ok(frame);
                }
            }
            wakeup.await;
        }
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.lock().connected = false;
        self.wakeup.notify_waiters();
        Ok(())
    }
}
