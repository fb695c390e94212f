// Wire protocol DTOs for the relay. Every frame is a JSON object tagged by `type`.

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const INVALID_FORMAT: &str = "Invalid message format";
pub const UNKNOWN_TYPE: &str = "Unknown message type";
pub const JOIN_REQUIRED: &str = "Join required";
pub const ALREADY_JOINED: &str = "Already joined";

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    // `player` stays loosely typed so a non-string name degrades instead of failing the frame.
    Join {
        #[serde(default)]
        player: Value,
    },
    Move {
        x: f64,
        y: f64,
    },
    // Opaque combat payload relayed as-is.
    Combat {
        #[serde(default)]
        event: Value,
    },
    Chat {
        #[serde(default)]
        message: Value,
    },
    // Any `type` string this server does not know.
    #[serde(other)]
    Unrecognized,
}

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    // Assigned identity, sent only to the joining connection.
    #[serde(rename_all = "camelCase")]
    Joined {
        player_id: String,
        player_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined { player: String, player_count: usize },
    #[serde(rename_all = "camelCase")]
    PlayerMove { player_id: String, x: f64, y: f64 },
    #[serde(rename_all = "camelCase")]
    CombatEvent { player_id: String, event: Value },
    Chat { player: String, message: String },
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player: String, player_count: usize },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: &str) -> Self {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum FrameError {
    // Not JSON, or a known `type` whose fields have the wrong shape.
    Malformed(serde_json::Error),
    // A bare `null` frame.
    Null,
}

impl From<serde_json::Error> for FrameError {
    fn from(e: serde_json::Error) -> Self {
        FrameError::Malformed(e)
    }
}

/// Decodes one client frame.
///
/// Only unparseable JSON, `null`, and known types with mistyped fields are errors.
/// Any other JSON value without a string `type` decodes as `Unrecognized`.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, FrameError> {
    let value: Value = serde_json::from_str(text)?;
    if value.is_null() {
        return Err(FrameError::Null);
    }
    if !value.get("type").is_some_and(Value::is_string) {
        return Ok(ClientMessage::Unrecognized);
    }
    Ok(serde_json::from_value(value)?)
}

/// Serializes once into shared bytes so a broadcast can clone cheaply per recipient.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Utf8Bytes, serde_json::Error> {
    serde_json::to_string(msg).map(Utf8Bytes::from)
}
