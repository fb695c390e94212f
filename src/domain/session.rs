// Session identity and the sanitizers applied to client-supplied text.

use std::fmt;
use uuid::Uuid;

pub const DEFAULT_PLAYER_NAME: &str = "Player";
pub const MAX_PLAYER_NAME_LEN: usize = 50;
pub const MAX_CHAT_MESSAGE_LEN: usize = 280;

/// Server-issued session identifier. Never supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Normalizes a requested display name. Non-string or blank input becomes "Player".
pub fn sanitize_player_name(name: Option<&str>) -> String {
    let trimmed = truncate_chars(name.unwrap_or_default().trim(), MAX_PLAYER_NAME_LEN);
    if trimmed.is_empty() {
        DEFAULT_PLAYER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalizes a chat line. An empty result means the message should be dropped.
pub fn sanitize_chat_message(message: Option<&str>) -> String {
    truncate_chars(message.unwrap_or_default().trim(), MAX_CHAT_MESSAGE_LEN).to_string()
}

// Cut on a char boundary so multi-byte names never split mid-codepoint.
fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
