pub mod telegram;

use chrono::{DateTime, Utc};

/// A message received from any platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform identifier (e.g., "telegram")
    pub platform: String,
    /// Platform-specific user ID as string
    pub user_id: String,
    /// Platform-specific chat/channel ID as string
    pub chat_id: String,
    /// Display name of the user
    pub user_name: String,
    /// The message text, if the message carried any
    pub text: Option<String>,
    /// When the platform says the message was sent
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    /// The text, if present and not blank.
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}
