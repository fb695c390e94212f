use crate::interface_adapters::http::status_response;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::next_conn_id;
use crate::use_cases::{ConnId, ConnectionHandle, Outbound, RelayEvent};

use axum::{
    Error,
    body::Bytes,
    extract::{
        State,
        ws::{
            CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code,
            rejection::WebSocketUpgradeRejection,
        },
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // The relay task is gone; nothing can be routed any more.
    RelayClosed,
}

enum LoopControl {
    Continue,
    Disconnect,
}

#[derive(Debug, Default)]
struct ConnStats {
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    pings: u64,
}

/// Single entry point for every path: upgrade requests become sessions,
/// anything else gets the plain-text status line.
pub async fn entry_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match upgrade {
        Ok(ws) => ws.on_upgrade(move |socket| {
            let conn_id = next_conn_id();
            handle_socket(socket, state, conn_id).instrument(info_span!("conn", conn_id))
        }),
        Err(_) => status_response().into_response(),
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, conn_id: ConnId) {
    let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(state.outbound_channel_capacity);

    // The relay keeps the only sending handles; this task keeps just the receiver.
    let handle = ConnectionHandle::new(conn_id, outbound_tx);
    if state
        .events_tx
        .send(RelayEvent::Connected { handle })
        .await
        .is_err()
    {
        warn!("relay unavailable; refusing connection");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::AWAY,
                reason: "server shutting down".into(),
            })))
            .await;
        return;
    }
    info!("client connected");

    let mut stats = ConnStats::default();
    if let Err(e) = run_client_loop(
        &mut socket,
        conn_id,
        &state.events_tx,
        outbound_rx,
        &mut stats,
    )
    .await
    {
        warn!(error = ?e, "client loop exited with error");
    }

    // Idempotent on the relay side; evicted connections are already gone.
    let _ = state
        .events_tx
        .send(RelayEvent::Disconnected { conn_id })
        .await;

    debug!(
        msgs_in = stats.msgs_in,
        msgs_out = stats.msgs_out,
        bytes_in = stats.bytes_in,
        bytes_out = stats.bytes_out,
        pings = stats.pings,
        "connection stats"
    );
    info!("client disconnected");
}

async fn run_client_loop(
    socket: &mut WebSocket,
    conn_id: ConnId,
    events_tx: &mpsc::Sender<RelayEvent>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    stats: &mut ConnStats,
) -> Result<(), NetError> {
    loop {
        let control: Result<LoopControl, NetError> = tokio::select! {
            // Incoming frame from the client.
            incoming = socket.recv() => {
                handle_incoming_ws(incoming, conn_id, events_tx, stats).await
            }

            // Outgoing frame or probe queued by the relay.
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(outbound) => forward_outbound(socket, outbound, stats).await,
                    None => {
                        // The relay dropped our queue: heartbeat eviction. Drop the
                        // socket without a close handshake.
                        info!("connection terminated by server");
                        Ok(LoopControl::Disconnect)
                    }
                }
            }
        };

        match control {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Disconnect) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    conn_id: ConnId,
    events_tx: &mpsc::Sender<RelayEvent>,
    stats: &mut ConnStats,
) -> Result<LoopControl, NetError> {
    let text = match incoming {
        Some(Ok(Message::Text(text))) => text,
        // Binary frames are routed as text; invalid UTF-8 then fails to parse.
        Some(Ok(Message::Binary(bytes))) => {
            Utf8Bytes::from(String::from_utf8_lossy(&bytes).into_owned())
        }
        Some(Ok(Message::Pong(_))) => {
            events_tx
                .send(RelayEvent::Pong { conn_id })
                .await
                .map_err(|_| NetError::RelayClosed)?;
            return Ok(LoopControl::Continue);
        }
        // Client pings are answered by the socket layer.
        Some(Ok(Message::Ping(_))) => return Ok(LoopControl::Continue),
        Some(Ok(Message::Close(_))) => return Ok(LoopControl::Disconnect),
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            return Ok(LoopControl::Disconnect);
        }
        None => {
            info!("websocket closed");
            return Ok(LoopControl::Disconnect);
        }
    };

    stats.msgs_in += 1;
    stats.bytes_in += text.len() as u64;

    // Awaiting here keeps per-connection frames in arrival order.
    events_tx
        .send(RelayEvent::Frame { conn_id, text })
        .await
        .map_err(|_| NetError::RelayClosed)?;
    Ok(LoopControl::Continue)
}

async fn forward_outbound(
    socket: &mut WebSocket,
    outbound: Outbound,
    stats: &mut ConnStats,
) -> Result<LoopControl, NetError> {
    let message = match outbound {
        Outbound::Frame(bytes) => {
            stats.msgs_out += 1;
            stats.bytes_out += bytes.len() as u64;
            Message::Text(bytes)
        }
        Outbound::Ping => {
            stats.pings += 1;
            Message::Ping(Bytes::new())
        }
    };

    match socket.send(message).await {
        Ok(()) => Ok(LoopControl::Continue),
        Err(err) => {
            // Peer is gone; the close path handles cleanup.
            debug!(error = ?err, "failed to send to client");
            Ok(LoopControl::Disconnect)
        }
    }
}
