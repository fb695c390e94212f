// Framework bootstrap for the relay server runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::entry_handler;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{RelayEvent, RelaySettings, relay_task};

use axum::Router;
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::mpsc;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Serves on an already-bound listener using settings from the environment.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    run_with_settings(listener, config::relay_settings()).await
}

pub async fn run_with_settings(
    listener: tokio::net::TcpListener,
    settings: RelaySettings,
) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(&settings);

    // Every path answers: upgrades become sessions, the rest get the status line.
    let app = Router::new().fallback(entry_handler).with_state(state);

    tracing::info!(
        %address,
        heartbeat_interval_ms = settings.heartbeat_interval.as_millis(),
        "listening"
    );

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::bind_host(), config::http_port());

    // Bind failure is the only fatal startup error.
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state(settings: &RelaySettings) -> Arc<AppState> {
    // events_tx/rx: every connection reports into the single relay task.
    let (events_tx, events_rx) = mpsc::channel::<RelayEvent>(settings.event_channel_capacity);

    // The relay task owns the registry and heartbeat timer; it exits once all
    // senders (the router state and live connections) are dropped.
    tokio::spawn(relay_task(events_rx, settings.heartbeat_interval));

    Arc::new(AppState {
        events_tx,
        outbound_channel_capacity: settings.outbound_channel_capacity,
    })
}
