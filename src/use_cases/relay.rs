// The relay task: sole owner of the session registry and liveness state.

use crate::domain::SessionId;
use crate::interface_adapters::protocol::ServerMessage;
use crate::use_cases::liveness::LivenessMonitor;
use crate::use_cases::registry::SessionRegistry;
use crate::use_cases::router::route_frame;
use crate::use_cases::types::{ConnId, ConnectionHandle, Outbound, RelayEvent, SendError};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Shared configuration for the relay task and its connections.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Capacity for events flowing from connection tasks into the relay.
    pub event_channel_capacity: usize,
    /// Capacity of each connection's outbound queue.
    pub outbound_channel_capacity: usize,
    /// Period between liveness sweeps.
    pub heartbeat_interval: Duration,
}

// Per-connection state held by the relay.
struct Peer {
    handle: ConnectionHandle,
    session_id: Option<SessionId>,
}

/// All mutable relay state. Mutated only from the relay task, so no locking.
#[derive(Default)]
pub struct Relay {
    registry: SessionRegistry,
    monitor: LivenessMonitor,
    peers: HashMap<ConnId, Peer>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.registry.size()
    }

    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    pub fn handle_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connected { handle } => {
                let conn_id = handle.conn_id();
                self.monitor.track(conn_id);
                self.peers.insert(
                    conn_id,
                    Peer {
                        handle,
                        session_id: None,
                    },
                );
            }
            RelayEvent::Frame { conn_id, text } => {
                let Some(peer) = self.peers.get_mut(&conn_id) else {
                    // Frames can still be in flight after an eviction.
                    debug!(conn_id, "frame from unknown connection ignored");
                    return;
                };
                route_frame(
                    &mut self.registry,
                    &peer.handle,
                    &mut peer.session_id,
                    text.as_str(),
                );
            }
            RelayEvent::Pong { conn_id } => self.monitor.mark_alive(conn_id),
            RelayEvent::Disconnected { conn_id } => self.disconnect(conn_id),
        }
    }

    /// One liveness sweep: terminate silent peers, ping the rest.
    pub fn heartbeat(&mut self) {
        let sweep = self.monitor.sweep();
        let (probed, evicted) = (sweep.probed.len(), sweep.evicted.len());

        for conn_id in sweep.evicted {
            warn!(conn_id, "heartbeat missed; terminating connection");
            self.disconnect(conn_id);
        }

        for conn_id in sweep.probed {
            let Some(peer) = self.peers.get(&conn_id) else {
                continue;
            };
            match peer.handle.try_send(Outbound::Ping) {
                Ok(()) => {}
                Err(SendError::Full) => {
                    // Counts as a missed probe unless a pong arrives anyway.
                    debug!(conn_id, "outbound queue full; ping skipped");
                }
                Err(SendError::Closed) => debug!(conn_id, "ping to closed connection skipped"),
            }
        }

        debug!(
            probed,
            evicted,
            tracked = self.monitor.tracked(),
            sessions = self.registry.size(),
            "heartbeat sweep"
        );
    }

    // Shared cleanup for orderly close and forced eviction. Idempotent.
    fn disconnect(&mut self, conn_id: ConnId) {
        // Dropping the peer (and its session) releases every outbound handle,
        // which ends the connection task if it is still running.
        let Some(peer) = self.peers.remove(&conn_id) else {
            return;
        };
        self.monitor.forget(conn_id);

        let Some(session) = self.registry.remove(peer.session_id.as_ref()) else {
            debug!(conn_id, "connection closed before join");
            return;
        };

        let player_count = self.registry.size();
        info!(
            conn_id,
            session_id = %session.id,
            display_name = %session.display_name,
            player_count,
            "player left"
        );
        self.registry.broadcast(
            &ServerMessage::PlayerLeft {
                player: session.display_name,
                player_count,
            },
            None,
        );
    }
}

pub async fn relay_task(mut events_rx: mpsc::Receiver<RelayEvent>, heartbeat_interval: Duration) {
    let mut relay = Relay::new();

    // First sweep fires one full period after startup, not immediately.
    let mut heartbeat = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
    // After a stall, resume with one sweep and a full period before the next,
    // so a peer pinged late still gets the whole period to answer.
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Some(event) => relay.handle_event(event),
                    None => {
                        // All transport handles are gone; release the timer with the task.
                        info!("event channel closed; relay task exiting");
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => relay.heartbeat(),
        }
    }
}
