// In-memory table of joined sessions and the broadcast fan-out over it.

use crate::domain::SessionId;
use crate::interface_adapters::protocol::{ServerMessage, encode_server_message};
use crate::use_cases::types::{ConnectionHandle, Outbound, SendError};
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// One joined client for the lifetime of its connection.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub display_name: String,
    /// Outbound queue owned by this session's connection only.
    pub connection: ConnectionHandle,
}

/// Errors returned by registry operations.
#[derive(Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Session id is already registered.
    AlreadyExists,
}

/// Single source of truth for who is connected right now.
///
/// Not synchronized: the relay task is its only owner.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: SessionId,
        display_name: String,
        connection: ConnectionHandle,
    ) -> Result<(), RegistryError> {
        if self.sessions.contains_key(&id) {
            return Err(RegistryError::AlreadyExists);
        }
        self.sessions.insert(
            id.clone(),
            Session {
                id,
                display_name,
                connection,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Removes a session. `None` (disconnect before join) and unknown ids are no-ops.
    pub fn remove(&mut self, id: Option<&SessionId>) -> Option<Session> {
        self.sessions.remove(id?)
    }

    /// Serializes `msg` once and queues it for every open session except `exclude`.
    ///
    /// Returns how many sessions the frame was queued for. Closed sessions are
    /// skipped, never removed here.
    pub fn broadcast(&self, msg: &ServerMessage, exclude: Option<&SessionId>) -> usize {
        let bytes = match encode_server_message(msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = ?e, "failed to serialize broadcast");
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, session) in &self.sessions {
            if exclude == Some(id) || !session.connection.is_open() {
                continue;
            }
            match session.connection.try_send(Outbound::Frame(bytes.clone())) {
                Ok(()) => delivered += 1,
                Err(SendError::Full) => {
                    warn!(session_id = %id, "outbound queue full; dropping broadcast");
                }
                Err(SendError::Closed) => {
                    debug!(session_id = %id, "connection closed during broadcast");
                }
            }
        }
        delivered
    }

    pub fn size(&self) -> usize {
        self.sessions.len()
    }
}
