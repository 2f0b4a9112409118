//! Connection-state tracking (spec §4.10/§5): requests arriving while the
//! socket isn't open fail with a typed error naming the current state;
//! closing the socket rejects every pending request with `Connection
//! closed`.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::RpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    fn label(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

/// One connection's lifecycle plus the set of requests awaiting a
/// response, so a close can reject them all at once instead of leaving
/// them to time out individually.
pub struct Connection {
    state: Mutex<ConnectionState>,
    pending: Mutex<HashMap<String, oneshot::Sender<RpcError>>>,
}

impl Connection {
    pub fn new() -> Self {
        Self { state: Mutex::new(ConnectionState::Connecting), pending: Mutex::new(HashMap::new()) }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn mark_open(&self) {
        *self.state.lock() = ConnectionState::Open;
    }

    pub fn mark_closing(&self) {
        *self.state.lock() = ConnectionState::Closing;
    }

    /// Rejects a request up front unless the socket is open, naming the
    /// current state in the error.
    pub fn guard_open(&self) -> Result<(), RpcError> {
        match self.state() {
            ConnectionState::Open => Ok(()),
            other => Err(RpcError::bad_request(format!("socket is not open (current state: {})", other.label()))),
        }
    }

    /// Registers `id` as awaiting a response; returns a receiver that
    /// resolves with `Connection closed` if `close` runs before the
    /// request completes normally.
    pub fn track_pending(&self, id: String) -> oneshot::Receiver<RpcError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        rx
    }

    pub fn complete(&self, id: &str) {
        self.pending.lock().remove(id);
    }

    /// Marks the connection closed and rejects every still-pending
    /// request with `Connection closed` (spec §4.10).
    pub fn close(&self) {
        *self.state.lock() = ConnectionState::Closed;
        let pending = std::mem::take(&mut *self.pending.lock());
        for (_, tx) in pending {
            let _ = tx.send(RpcError::connection_closed());
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_rejected_before_open() {
        let conn = Connection::new();
        let err = conn.guard_open().unwrap_err();
        assert!(err.message.contains("connecting"));
    }

    #[test]
    fn requests_succeed_once_open() {
        let conn = Connection::new();
        conn.mark_open();
        assert!(conn.guard_open().is_ok());
    }

    #[tokio::test]
    async fn closing_rejects_pending_requests() {
        let conn = Connection::new();
        conn.mark_open();
        let rx = conn.track_pending("req-1".to_string());
        conn.close();
        let err = rx.await.unwrap();
        assert_eq!(err.message, "Connection closed");
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn completed_requests_are_not_rejected_on_close() {
        let conn = Connection::new();
        conn.mark_open();
        let _rx = conn.track_pending("req-1".to_string());
        conn.complete("req-1");
        conn.close();
        assert!(conn.pending.lock().is_empty());
    }
}
