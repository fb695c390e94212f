// Use-case level inputs/outputs for the relay task.

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Transport-level connection id; exists before (and without) a session.
pub type ConnId = u64;

/// Work queued for a connection task to write to its socket.
#[derive(Debug, Clone)]
pub enum Outbound {
    Frame(Utf8Bytes),
    Ping,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SendError {
    // Recipient is not draining its queue fast enough; the frame is dropped.
    Full,
    Closed,
}

/// Sending half of one connection's outbound queue.
///
/// Dropping every handle for a connection closes its queue, which the
/// connection task treats as a forced termination.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    conn_id: ConnId,
    tx: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    pub fn new(conn_id: ConnId, tx: mpsc::Sender<Outbound>) -> Self {
        Self { conn_id, tx }
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Never waits on the client; a slow reader only loses its own frames.
    pub fn try_send(&self, outbound: Outbound) -> Result<(), SendError> {
        self.tx.try_send(outbound).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

/// Everything a connection task reports to the relay task.
#[derive(Debug)]
pub enum RelayEvent {
    Connected { handle: ConnectionHandle },
    Frame { conn_id: ConnId, text: Utf8Bytes },
    Pong { conn_id: ConnId },
    Disconnected { conn_id: ConnId },
}
