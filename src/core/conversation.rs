use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::core::message::{Message, Role};

pub const DEFAULT_TITLE: &str = "Nouvelle conversation";
const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Mirrors the store key; older files only carried it as the key.
    #[serde(default)]
    pub id: String,
    pub title: String,
    /// Display name of the model the conversation is bound to.
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Local>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, model: impl Into<String>, created_at: DateTime<Local>) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_TITLE.to_string(),
            model: model.into(),
            messages: Vec::new(),
            created_at,
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    pub fn latest_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|message| message.is_user())
    }

    pub fn stats(&self) -> ConversationStats {
        let count = |role: Role| self.messages.iter().filter(|m| m.role == role).count();
        ConversationStats {
            messages: self.messages.len(),
            user_messages: count(Role::User),
            assistant_messages: count(Role::Assistant),
            characters: self
                .messages
                .iter()
                .map(|message| message.content.chars().count())
                .sum(),
        }
    }
}

/// RFC 3339 on write; also accepts the offset-less ISO form older stores
/// were written with, read as local time.
mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Local));
        }
        let naive = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(serde::de::Error::custom)?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| serde::de::Error::custom(format!("nonexistent local time: {raw}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversationStats {
    pub messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub characters: usize,
}

/// Title derived from the opening message: its first fifty characters,
/// with an ellipsis when the message was longer.
pub fn title_from_message(message: &str) -> String {
    let mut title: String = message.chars().take(TITLE_MAX_CHARS).collect();
    title = title.trim().to_string();
    if message.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    if title.is_empty() {
        "Conversation".to_string()
    } else {
        title
    }
}
