// Inbound frame dispatch: decode, validate, and translate into registry operations.

use crate::domain::{SessionId, sanitize_chat_message, sanitize_player_name};
use crate::interface_adapters::protocol::{
    ALREADY_JOINED, ClientMessage, INVALID_FORMAT, JOIN_REQUIRED, ServerMessage,
    UNKNOWN_TYPE, decode_client_message, encode_server_message,
};
use crate::use_cases::registry::{RegistryError, SessionRegistry};
use crate::use_cases::types::{ConnectionHandle, Outbound};
use serde_json::Value;
use tracing::{debug, error, info, warn};

const UNKNOWN_PLAYER: &str = "Unknown";

/// Routes one inbound text frame from `sender`.
///
/// `session_id` is the sender's joined identity; a successful `join` fills it in.
/// Every failure is answered to the sender alone and leaves the connection open.
pub fn route_frame(
    registry: &mut SessionRegistry,
    sender: &ConnectionHandle,
    session_id: &mut Option<SessionId>,
    text: &str,
) {
    let msg = match decode_client_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(
                conn_id = sender.conn_id(),
                bytes = text.len(),
                error = ?e,
                "failed to parse client message"
            );
            reply(sender, &ServerMessage::error(INVALID_FORMAT));
            return;
        }
    };

    match msg {
        ClientMessage::Join { player } => handle_join(registry, sender, session_id, &player),
        ClientMessage::Move { x, y } => {
            let Some(id) = joined_as(sender, session_id) else {
                return;
            };
            registry.broadcast(
                &ServerMessage::PlayerMove {
                    player_id: id.to_string(),
                    x,
                    y,
                },
                Some(id),
            );
        }
        ClientMessage::Combat { event } => {
            let Some(id) = joined_as(sender, session_id) else {
                return;
            };
            registry.broadcast(
                &ServerMessage::CombatEvent {
                    player_id: id.to_string(),
                    event,
                },
                Some(id),
            );
        }
        ClientMessage::Chat { message } => {
            let Some(id) = joined_as(sender, session_id) else {
                return;
            };
            let message = sanitize_chat_message(message.as_str());
            if message.is_empty() {
                debug!(session_id = %id, "empty chat message dropped");
                return;
            }
            let player = registry
                .get(id)
                .map(|session| session.display_name.clone())
                .unwrap_or_else(|| UNKNOWN_PLAYER.to_string());
            // Chat echoes back to the sender; clients render their own lines from it.
            registry.broadcast(&ServerMessage::Chat { player, message }, None);
        }
        ClientMessage::Unrecognized => {
            reply(sender, &ServerMessage::error(UNKNOWN_TYPE));
        }
    }
}

fn handle_join(
    registry: &mut SessionRegistry,
    sender: &ConnectionHandle,
    session_id: &mut Option<SessionId>,
    player: &Value,
) {
    if let Some(existing) = session_id.as_ref() {
        warn!(session_id = %existing, "duplicate join rejected");
        reply(sender, &ServerMessage::error(ALREADY_JOINED));
        return;
    }

    let id = SessionId::generate();
    let display_name = sanitize_player_name(player.as_str());
    if let Err(RegistryError::AlreadyExists) =
        registry.register(id.clone(), display_name.clone(), sender.clone())
    {
        error!(session_id = %id, "generated session id collided; join dropped");
        return;
    }

    let player_count = registry.size();
    info!(
        conn_id = sender.conn_id(),
        session_id = %id,
        display_name = %display_name,
        player_count,
        "player joined"
    );

    reply(
        sender,
        &ServerMessage::Joined {
            player_id: id.to_string(),
            player_count,
        },
    );
    registry.broadcast(
        &ServerMessage::PlayerJoined {
            player: display_name,
            player_count,
        },
        Some(&id),
    );
    *session_id = Some(id);
}

// Resolves the sender's session or tells it to join first.
fn joined_as<'a>(
    sender: &ConnectionHandle,
    session_id: &'a Option<SessionId>,
) -> Option<&'a SessionId> {
    if session_id.is_none() {
        debug!(conn_id = sender.conn_id(), "message before join rejected");
        reply(sender, &ServerMessage::error(JOIN_REQUIRED));
    }
    session_id.as_ref()
}

fn reply(sender: &ConnectionHandle, msg: &ServerMessage) {
    let bytes = match encode_server_message(msg) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = ?e, "failed to serialize reply");
            return;
        }
    };
    if let Err(e) = sender.try_send(Outbound::Frame(bytes)) {
        warn!(conn_id = sender.conn_id(), error = ?e, "failed to queue reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    struct TestConn {
        handle: ConnectionHandle,
        rx: mpsc::Receiver<Outbound>,
        session_id: Option<SessionId>,
    }

    impl TestConn {
        fn new(conn_id: u64) -> Self {
            let (tx, rx) = mpsc::channel(64);
            Self {
                handle: ConnectionHandle::new(conn_id, tx),
                rx,
                session_id: None,
            }
        }

        fn send(&mut self, registry: &mut SessionRegistry, frame: Value) {
            route_frame(
                registry,
                &self.handle,
                &mut self.session_id,
                &frame.to_string(),
            );
        }

        // Everything queued for this connection so far, decoded.
        fn drain(&mut self) -> Vec<Value> {
            let mut frames = Vec::new();
            while let Ok(outbound) = self.rx.try_recv() {
                if let Outbound::Frame(bytes) = outbound {
                    frames.push(serde_json::from_str(bytes.as_str()).expect("json"));
                }
            }
            frames
        }
    }

    fn joined_pair(registry: &mut SessionRegistry) -> (TestConn, TestConn) {
        let mut a = TestConn::new(1);
        let mut b = TestConn::new(2);
        a.send(registry, json!({"type": "join", "player": "Mira"}));
        b.send(registry, json!({"type": "join", "player": "Tam"}));
        a.drain();
        b.drain();
        (a, b)
    }

    #[test]
    fn when_two_players_join_then_counts_and_default_name_are_announced() {
        let mut registry = SessionRegistry::new();
        let mut a = TestConn::new(1);
        let mut b = TestConn::new(2);

        a.send(&mut registry, json!({"type": "join", "player": "Mira"}));
        let a_frames = a.drain();
        assert_eq!(a_frames.len(), 1);
        assert_eq!(a_frames[0]["type"], "joined");
        assert_eq!(a_frames[0]["playerCount"], 1);

        b.send(&mut registry, json!({"type": "join", "player": ""}));
        assert_eq!(
            a.drain(),
            vec![json!({"type": "playerJoined", "player": "Player", "playerCount": 2})]
        );
        let b_frames = b.drain();
        assert_eq!(b_frames.len(), 1);
        assert_eq!(b_frames[0]["type"], "joined");
        assert_eq!(b_frames[0]["playerCount"], 2);
        assert_ne!(a_frames[0]["playerId"], b_frames[0]["playerId"]);
    }

    #[test]
    fn when_join_name_is_not_a_string_then_player_is_used() {
        let mut registry = SessionRegistry::new();
        let mut a = TestConn::new(1);
        a.send(&mut registry, json!({"type": "join", "player": {"nested": true}}));

        let id = a.session_id.clone().expect("joined");
        assert_eq!(
            registry.get(&id).map(|s| s.display_name.as_str()),
            Some("Player")
        );
    }

    #[test]
    fn when_many_connections_join_then_every_id_is_unique() {
        let mut registry = SessionRegistry::new();
        let mut ids = HashSet::new();
        for conn_id in 0..200 {
            let mut conn = TestConn::new(conn_id);
            conn.send(&mut registry, json!({"type": "join", "player": "P"}));
            let before = ids.len();
            ids.insert(conn.session_id.clone().expect("joined"));
            assert_eq!(ids.len(), before + 1);
            assert_eq!(registry.size(), ids.len());
        }
    }

    #[test]
    fn when_move_is_sent_then_others_receive_it_and_sender_does_not() {
        let mut registry = SessionRegistry::new();
        let (mut a, mut b) = joined_pair(&mut registry);
        let a_id = a.session_id.clone().expect("joined").to_string();

        a.send(&mut registry, json!({"type": "move", "x": 12.5, "y": -3}));

        assert!(a.drain().is_empty());
        assert_eq!(
            b.drain(),
            vec![json!({"type": "playerMove", "playerId": a_id, "x": 12.5, "y": -3.0})]
        );
    }

    #[test]
    fn when_combat_is_sent_then_event_is_relayed_to_others_only() {
        let mut registry = SessionRegistry::new();
        let (mut a, mut b) = joined_pair(&mut registry);

        a.send(
            &mut registry,
            json!({"type": "combat", "event": {"action": "attack", "target": "orc"}}),
        );

        assert!(a.drain().is_empty());
        let frames = b.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "combatEvent");
        assert_eq!(frames[0]["event"]["target"], "orc");
    }

    #[test]
    fn when_chat_is_sent_then_sender_and_others_receive_it() {
        let mut registry = SessionRegistry::new();
        let (mut a, mut b) = joined_pair(&mut registry);

        a.send(&mut registry, json!({"type": "chat", "message": "  hello  "}));

        let expected = vec![json!({"type": "chat", "player": "Mira", "message": "hello"})];
        assert_eq!(a.drain(), expected);
        assert_eq!(b.drain(), expected);
    }

    #[test]
    fn when_chat_is_long_then_it_is_truncated_and_blank_chat_is_dropped() {
        let mut registry = SessionRegistry::new();
        let (mut a, mut b) = joined_pair(&mut registry);

        a.send(&mut registry, json!({"type": "chat", "message": "x".repeat(400)}));
        let frames = b.drain();
        assert_eq!(frames[0]["message"].as_str().map(str::len), Some(280));
        a.drain();

        a.send(&mut registry, json!({"type": "chat", "message": "   "}));
        a.send(&mut registry, json!({"type": "chat", "message": 7}));
        assert!(a.drain().is_empty());
        assert!(b.drain().is_empty());
    }

    #[test]
    fn when_type_is_unknown_then_only_sender_gets_one_error() {
        let mut registry = SessionRegistry::new();
        let (mut a, mut b) = joined_pair(&mut registry);

        a.send(&mut registry, json!({"type": "bogus"}));

        assert_eq!(
            a.drain(),
            vec![json!({"type": "error", "message": "Unknown message type"})]
        );
        assert!(b.drain().is_empty());
    }

    #[test]
    fn when_frame_is_malformed_then_sender_gets_invalid_format() {
        let mut registry = SessionRegistry::new();
        let mut a = TestConn::new(1);

        route_frame(&mut registry, &a.handle, &mut a.session_id, "{oops");
        route_frame(&mut registry, &a.handle, &mut a.session_id, "null");

        let invalid = json!({"type": "error", "message": "Invalid message format"});
        assert_eq!(a.drain(), vec![invalid.clone(), invalid]);
        assert_eq!(registry.size(), 0);
    }

    #[test]
    fn when_json_frame_lacks_a_string_type_then_sender_gets_unknown_type() {
        let mut registry = SessionRegistry::new();
        let (mut a, mut b) = joined_pair(&mut registry);

        a.send(&mut registry, json!({}));
        a.send(&mut registry, json!({"type": 7}));
        a.send(&mut registry, json!(42));

        let unknown = json!({"type": "error", "message": "Unknown message type"});
        assert_eq!(a.drain(), vec![unknown.clone(), unknown.clone(), unknown]);
        assert!(b.drain().is_empty());
    }

    #[test]
    fn when_not_joined_then_relay_messages_are_rejected() {
        let mut registry = SessionRegistry::new();
        let (_a, mut b) = joined_pair(&mut registry);
        let mut stranger = TestConn::new(9);

        stranger.send(&mut registry, json!({"type": "move", "x": 1, "y": 1}));
        stranger.send(&mut registry, json!({"type": "chat", "message": "hi"}));

        let frames = stranger.drain();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f["message"] == "Join required"));
        assert!(b.drain().is_empty());
    }

    #[test]
    fn when_joined_connection_joins_again_then_it_is_rejected() {
        let mut registry = SessionRegistry::new();
        let (mut a, mut b) = joined_pair(&mut registry);
        let first_id = a.session_id.clone();

        a.send(&mut registry, json!({"type": "join", "player": "Again"}));

        assert_eq!(
            a.drain(),
            vec![json!({"type": "error", "message": "Already joined"})]
        );
        assert!(b.drain().is_empty());
        assert_eq!(a.session_id, first_id);
        assert_eq!(registry.size(), 2);
    }
}
