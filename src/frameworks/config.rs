use crate::use_cases::RelaySettings;
use std::{
    env,
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

// Runtime/server constants.

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

pub fn http_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_HTTP_PORT)
}

pub fn bind_host() -> IpAddr {
    env::var("HOST")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub fn heartbeat_interval() -> Duration {
    // Zero would make the interval timer panic, so it falls back like any bad value.
    env::var("HEARTBEAT_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL)
}

pub fn relay_settings() -> RelaySettings {
    RelaySettings {
        event_channel_capacity: EVENT_CHANNEL_CAPACITY,
        outbound_channel_capacity: OUTBOUND_CHANNEL_CAPACITY,
        heartbeat_interval: heartbeat_interval(),
    }
}
