use serde::{Deserialize, Serialize};
use std::fmt;

use log::warn;
use serde::de::Deserializer;

use super::message::{parse_cq_string, Message};

/// Message type enum (private or group chat)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Private,
    Group,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Private => "private",
            MessageType::Group => "group",
        }
    }
}

/// Sender information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sender {
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: String,
    pub role: Option<String>,
}

impl Sender {
    pub fn display_name(&self) -> &str {
        if !self.card.is_empty() { &self.card } else { &self.nickname }
    }
}

/// The bot's own account
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub qq_id: String,
}

/// Message event containing the full message information
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub message_id: i64,
    pub message_type: MessageType,
    pub sender: Sender,
    pub message_list: Vec<Message>,
    pub group_id: Option<i64>,
    pub group_name: Option<String>,
    pub self_id: Option<i64>,
    pub post_type: String,
}

impl MessageEvent {
    /// Whether the sender is an automated account: the bot's own echo, the bot account itself,
    /// or one of `bot_user_ids`.
    pub fn is_from_bot(&self, bot_id: Option<&str>, bot_user_ids: &[String]) -> bool {
        if self.post_type == "message_sent" {
            return true;
        }
        let sender_id = self.sender.user_id.to_string();
        if self.self_id.is_some_and(|id| id == self.sender.user_id) {
            return true;
        }
        if bot_id.is_some_and(|id| id == sender_id) {
            return true;
        }
        bot_user_ids.iter().any(|id| *id == sender_id)
    }

    /// Where the message was posted, for logging
    pub fn conversation_label(&self) -> String {
        match (self.message_type, self.group_id, self.group_name.as_deref()) {
            (MessageType::Group, Some(id), Some(name)) if !name.is_empty() => format!("group {}({})", name, id),
            (MessageType::Group, Some(id), _) => format!("group {}", id),
            (MessageType::Group, None, _) => "group".to_string(),
            (MessageType::Private, _, _) => "private chat".to_string(),
        }
    }

    /// Whether `bot_id` is among the @ targets of this message
    pub fn mentions(&self, bot_id: &str) -> bool {
        self.message_list.iter().any(|m| m.is_at(bot_id))
    }
}

impl From<RawMessageEvent> for MessageEvent {
    fn from(raw: RawMessageEvent) -> Self {
        MessageEvent {
            message_id: raw.message_id,
            message_type: raw.message_type,
            sender: raw.sender,
            message_list: raw.message,
            group_id: raw.group_id,
            group_name: raw.group_name,
            self_id: raw.self_id,
            post_type: raw.post_type,
        }
    }
}

fn default_post_type() -> String {
    "message".to_string()
}

/// Raw message event structure for deserialization and serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessageEvent {
    pub message_id: i64,
    pub message_type: MessageType,
    pub sender: Sender,
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_message_vec_lenient")]
    pub message: Vec<Message>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub self_id: Option<i64>,
    #[serde(default = "default_post_type")]
    pub post_type: String,
}

/// Accepts both the array form and the CQ-code string form of a OneBot message.
fn deserialize_message_vec_lenient<'de, D>(deserializer: D) -> Result<Vec<Message>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;

    let raw_values = match raw {
        serde_json::Value::String(s) => return Ok(parse_cq_string(&s)),
        serde_json::Value::Array(values) => values,
        serde_json::Value::Null => return Ok(Vec::new()),
        other => {
            warn!("Unexpected message payload, ignoring: {}", other);
            return Ok(Vec::new());
        }
    };

    let mut out = Vec::with_capacity(raw_values.len());
    for v in raw_values {
        match serde_json::from_value::<Message>(v) {
            Ok(m) => out.push(m),
            Err(e) => {
                // Do not fail the whole event when a single element is unsupported.
                warn!("Skipping unsupported message element: {}", e);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_event_json(sender: i64, message: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "post_type": "message",
            "message_type": "group",
            "message_id": 1001,
            "self_id": 42,
            "group_id": 5555,
            "sender": { "user_id": sender, "nickname": "alice", "card": "" },
            "message": message
        })
    }

    #[test]
    fn test_parse_array_message_event() {
        let json = group_event_json(
            7,
            serde_json::json!([
                {"type": "at", "data": {"qq": "42"}},
                {"type": "text", "data": {"text": " create a meeting"}},
                {"type": "image", "data": {"file": "x.png"}}
            ]),
        );
        let raw: RawMessageEvent = serde_json::from_value(json).unwrap();
        let event = MessageEvent::from(raw);

        assert_eq!(event.message_type, MessageType::Group);
        assert_eq!(event.conversation_label(), "group 5555");
        assert_eq!(event.message_list.len(), 2);
        assert!(event.mentions("42"));
        assert!(!event.mentions("4"));
        assert!(!event.is_from_bot(Some("42"), &[]));
    }

    #[test]
    fn test_parse_string_message_event() {
        let json = group_event_json(7, serde_json::json!("[CQ:at,qq=42] hi"));
        let raw: RawMessageEvent = serde_json::from_value(json).unwrap();
        let event = MessageEvent::from(raw);
        assert!(event.mentions("42"));
        assert_eq!(event.message_list.len(), 2);
    }

    #[test]
    fn test_is_from_bot() {
        let raw: RawMessageEvent = serde_json::from_value(group_event_json(42, serde_json::json!([]))).unwrap();
        let own = MessageEvent::from(raw);
        assert!(own.is_from_bot(None, &[]));

        let raw: RawMessageEvent = serde_json::from_value(group_event_json(9, serde_json::json!([]))).unwrap();
        let other = MessageEvent::from(raw);
        assert!(!other.is_from_bot(None, &[]));
        assert!(other.is_from_bot(None, &["9".to_string()]));

        let mut echo = other.clone();
        echo.post_type = "message_sent".to_string();
        assert!(echo.is_from_bot(None, &[]));
    }

    #[test]
    fn test_conversation_label_uses_group_name() {
        let mut json = group_event_json(7, serde_json::json!([]));
        json["group_name"] = serde_json::json!("Planning");
        let raw: RawMessageEvent = serde_json::from_value(json).unwrap();
        let mut event = MessageEvent::from(raw);
        assert_eq!(event.conversation_label(), "group Planning(5555)");

        event.message_type = MessageType::Private;
        event.group_id = None;
        assert_eq!(event.conversation_label(), "private chat");
    }

    #[test]
    fn test_sender_display_name() {
        let mut sender = Sender { user_id: 1, nickname: "nick".into(), card: String::new(), role: None };
        assert_eq!(sender.display_name(), "nick");
        sender.card = "card".into();
        assert_eq!(sender.display_name(), "card");
    }
}
