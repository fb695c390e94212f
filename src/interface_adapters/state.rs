use crate::use_cases::RelayEvent;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    // Connection events flowing from sockets into the relay task.
    pub events_tx: mpsc::Sender<RelayEvent>,
    // Per-connection outbound queue size.
    pub outbound_channel_capacity: usize,
}
