// Domain layer: session identity and input sanitization rules.

pub mod session;

pub use session::{SessionId, sanitize_chat_message, sanitize_player_name};
