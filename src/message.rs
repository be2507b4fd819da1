//! Inbound message and outbound identity types.
//!
//! [`ChatMessage`] is the engine's view of a chat-gateway event. The gateway
//! adapter is responsible for flattening platform-specific structure
//! (mention lists, reply references) into this shape before handing the
//! message to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound chat message as delivered by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Gateway-assigned message id.
    pub id: String,
    /// Raw message text.
    pub content: String,
    /// Author's user id.
    pub author_id: String,
    /// Whether the author is itself a bot account.
    pub author_is_bot: bool,
    /// Channel the message arrived in.
    pub channel_id: String,
    /// Guild/server id, if the channel belongs to one.
    pub guild_id: Option<String>,
    /// When the message was created, per the gateway.
    pub created_at: DateTime<Utc>,
    /// User ids @-mentioned in the message.
    pub mentions: Vec<String>,
    /// True when this message is a reply to one of the persona's own
    /// messages (resolved by the gateway adapter).
    pub is_reply_to_bot: bool,
}

impl ChatMessage {
    /// Whether the given user id appears in the mention list.
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|m| m == user_id)
    }
}

/// The identity an outbound message is rendered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    /// Display name shown for the message.
    pub bot_name: String,
    /// Avatar URL shown for the message.
    pub avatar_url: Option<String>,
}

impl BotIdentity {
    /// Identity with a name and no avatar override.
    pub fn named(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            avatar_url: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::Utc;

    /// Build a plain human message for tests.
    pub fn message(content: &str, author_id: &str, at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            author_id: author_id.to_string(),
            author_is_bot: false,
            channel_id: "chan-1".to_string(),
            guild_id: Some("guild-1".to_string()),
            created_at: at,
            mentions: Vec::new(),
            is_reply_to_bot: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mentions_user() {
        let mut msg = test_support::message("hey", "u1", Utc::now());
        msg.mentions.push("bot-1".into());
        assert!(msg.mentions_user("bot-1"));
        assert!(!msg.mentions_user("bot-2"));
    }

    #[test]
    fn test_message_serde_round_trip() {
        let msg = test_support::message("blue", "u1", Utc::now());
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, "blue");
        assert_eq!(back.author_id, "u1");
    }
}
