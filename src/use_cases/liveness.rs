// Heartbeat bookkeeping: strict two-tick eviction of peers that stop answering pings.

use crate::use_cases::types::ConnId;
use std::collections::HashMap;

/// Result of one heartbeat sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Sweep {
    /// Connections that answered since the last sweep; ping them again.
    pub probed: Vec<ConnId>,
    /// Connections that stayed silent for a full period; terminate them.
    pub evicted: Vec<ConnId>,
}

/// Tracks one alive flag per open connection, joined or not.
#[derive(Debug, Default)]
pub struct LivenessMonitor {
    alive: HashMap<ConnId, bool>,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// New connections start alive so they get one full period before the first probe counts.
    pub fn track(&mut self, conn_id: ConnId) {
        self.alive.insert(conn_id, true);
    }

    pub fn mark_alive(&mut self, conn_id: ConnId) {
        if let Some(alive) = self.alive.get_mut(&conn_id) {
            *alive = true;
        }
    }

    pub fn forget(&mut self, conn_id: ConnId) {
        self.alive.remove(&conn_id);
    }

    pub fn tracked(&self) -> usize {
        self.alive.len()
    }

    /// Evicts peers still flagged dead, then flags the rest dead pending their next pong.
    pub fn sweep(&mut self) -> Sweep {
        let mut sweep = Sweep::default();
        for (conn_id, alive) in self.alive.iter_mut() {
            if *alive {
                *alive = false;
                sweep.probed.push(*conn_id);
            } else {
                sweep.evicted.push(*conn_id);
            }
        }
        for conn_id in &sweep.evicted {
            self.alive.remove(conn_id);
        }
        sweep.probed.sort_unstable();
        sweep.evicted.sort_unstable();
        sweep
    }
}
