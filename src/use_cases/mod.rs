// Use cases layer: the relay workflow and the state it owns.

pub mod liveness;
pub mod registry;
pub mod relay;
pub mod router;
pub mod types;

pub use relay::{Relay, RelaySettings, relay_task};
pub use types::{ConnId, ConnectionHandle, Outbound, RelayEvent};
