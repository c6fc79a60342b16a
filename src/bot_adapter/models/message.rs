use serde::{Deserialize, Serialize};
use serde::de::{self, Deserializer};
use std::fmt;

use log::warn;

fn deserialize_i64_from_string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| de::Error::custom("numeric value is not an i64")),
        serde_json::Value::String(s) => s
            .parse::<i64>()
            .map_err(|e| de::Error::custom(format!("failed to parse i64 from string: {e}"))),
        other => Err(de::Error::custom(format!(
            "expected string or number for i64, got {other}"
        ))),
    }
}

fn deserialize_option_string_from_string_or_number<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<serde_json::Value>::deserialize(deserializer)?;
    match opt {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected null/string/number for Option<String>, got {other}"
        ))),
    }
}

/// Enum representing all possible message segment types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    #[serde(rename = "text")]
    PlainText(PlainTextMessage),
    #[serde(rename = "at")]
    At(AtTargetMessage),
    #[serde(rename = "reply", alias = "replay")]
    Reply(ReplyMessage),
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::PlainText(msg) => write!(f, "{}", msg),
            Message::At(msg) => write!(f, "{}", msg),
            Message::Reply(msg) => write!(f, "{}", msg),
        }
    }
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Message::PlainText(PlainTextMessage { text: text.into() })
    }

    pub fn at(target: impl Into<String>) -> Self {
        Message::At(AtTargetMessage { target: Some(target.into()) })
    }

    pub fn reply(id: i64) -> Self {
        Message::Reply(ReplyMessage { id, message_source: None })
    }

    /// True if this segment is an @ mention of `id`.
    pub fn is_at(&self, id: &str) -> bool {
        matches!(self, Message::At(at) if at.target.as_deref() == Some(id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlainTextMessage {
    pub text: String,
}

impl fmt::Display for PlainTextMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// @ mention message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtTargetMessage {
    #[serde(alias = "qq")]
    #[serde(default, deserialize_with = "deserialize_option_string_from_string_or_number")]
    pub target: Option<String>,
}

impl AtTargetMessage {
    pub fn target_id(&self) -> String {
        self.target.clone().unwrap_or_else(|| "null".to_string())
    }
}

impl fmt::Display for AtTargetMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.target_id())
    }
}

/// Reply message (references another message)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMessage {
    #[serde(deserialize_with = "deserialize_i64_from_string_or_number")]
    pub id: i64,
    #[serde(skip)]
    pub message_source: Option<Box<Message>>,
}

impl fmt::Display for ReplyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref source) = self.message_source {
            write!(f, "[Reply of message ID {}: {}]", self.id, source)
        } else {
            write!(f, "[Reply of message ID {}]", self.id)
        }
    }
}

fn cq_unescape(s: &str) -> String {
    s.replace("&#44;", ",")
        .replace("&#91;", "[")
        .replace("&#93;", "]")
        .replace("&amp;", "&")
}

/// Parse a string-form OneBot message into segments.
///
/// A CQ code is delimited by `[CQ:` and `]`; its first comma-separated field is
/// the segment type and the remaining fields are `key=value` pairs. Text
/// between codes becomes plain text. Unsupported codes are skipped, and an
/// unterminated `[CQ:` is kept as text.
pub fn parse_cq_string(raw: &str) -> Vec<Message> {
    let mut out = Vec::new();
    let mut rest = raw;

    while let Some(start) = rest.find("[CQ:") {
        let Some(len) = rest[start..].find(']') else {
            break;
        };
        if start > 0 {
            out.push(Message::text(cq_unescape(&rest[..start])));
        }

        let body = &rest[start + 4..start + len];
        let mut fields = body.split(',');
        let kind = fields.next().unwrap_or_default();
        let params: Vec<(&str, String)> = fields
            .filter_map(|f| f.split_once('='))
            .map(|(k, v)| (k, cq_unescape(v)))
            .collect();
        let param = |name: &str| params.iter().find(|(k, _)| *k == name).map(|(_, v)| v.clone());

        match kind {
            "at" => match param("qq") {
                Some(qq) => out.push(Message::at(qq)),
                None => warn!("Skipping CQ at code without qq field: {}", body),
            },
            "reply" => match param("id").map(|id| id.parse::<i64>()) {
                Some(Ok(id)) => out.push(Message::reply(id)),
                _ => warn!("Skipping CQ reply code with invalid id: {}", body),
            },
            other => warn!("Skipping unsupported CQ code: {}", other),
        }

        rest = &rest[start + len + 1..];
    }

    if !rest.is_empty() {
        out.push(Message::text(cq_unescape(rest)));
    }
    out
}

/// Concatenate rendered segments, inserting a single space between two
/// neighbours only when neither side already provides whitespace.
fn join_segments(parts: impl Iterator<Item = String>) -> String {
    let mut out = String::new();
    for part in parts {
        if part.is_empty() {
            continue;
        }
        let needs_space = !out.is_empty()
            && !out.ends_with(char::is_whitespace)
            && !part.starts_with(char::is_whitespace);
        if needs_space {
            out.push(' ');
        }
        out.push_str(&part);
    }
    out
}

/// Render the instruction text handed to the agent.
///
/// Reply quotes carry no instruction and are dropped. When `strip_mention_of`
/// is set, @ segments targeting that id are removed; all other mentions are
/// rendered as `@id` in place.
pub fn instruction_text(messages: &[Message], strip_mention_of: Option<&str>) -> String {
    let parts = messages.iter().filter_map(|m| match m {
        Message::Reply(_) => None,
        Message::At(_) if strip_mention_of.is_some_and(|id| m.is_at(id)) => None,
        other => Some(other.to_string()),
    });
    join_segments(parts).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_deserialize_number_target() {
        let m: Message = serde_json::from_str(r#"{"type":"at","data":{"qq":10086}}"#).unwrap();
        assert!(m.is_at("10086"));
    }

    #[test]
    fn test_parse_cq_string() {
        let msgs = parse_cq_string("[CQ:reply,id=77][CQ:at,qq=42] create a meeting &#91;Sync&#93;");
        assert_eq!(msgs.len(), 3);
        assert!(matches!(msgs[0], Message::Reply(ReplyMessage { id: 77, .. })));
        assert!(msgs[1].is_at("42"));
        assert_eq!(msgs[2].to_string(), " create a meeting [Sync]");
    }

    #[test]
    fn test_parse_cq_string_keeps_unterminated_code_as_text() {
        let msgs = parse_cq_string("hi [CQ:at,qq=1");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].to_string(), "hi [CQ:at,qq=1");
    }

    #[test]
    fn test_parse_cq_string_skips_unsupported() {
        let msgs = parse_cq_string("[CQ:face,id=14]hello");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].to_string(), "hello");
    }

    #[test]
    fn test_instruction_text_strips_only_bot_mention() {
        let msgs = vec![
            Message::at("42"),
            Message::text(" invite "),
            Message::at("7"),
            Message::text(" to Sync tomorrow"),
        ];
        assert_eq!(instruction_text(&msgs, Some("42")), "invite @7 to Sync tomorrow");
        assert_eq!(instruction_text(&msgs, None), "@42 invite @7 to Sync tomorrow");
    }

    #[test]
    fn test_instruction_text_mention_length_does_not_matter() {
        // Mention ids of different lengths must be removed the same way.
        for id in ["1", "123456789012"] {
            let msgs = vec![Message::at(id), Message::text("delete Sync")];
            assert_eq!(instruction_text(&msgs, Some(id)), "delete Sync");
        }
    }

    #[test]
    fn test_instruction_text_drops_reply_quote() {
        let msgs = vec![Message::reply(5), Message::at("42"), Message::text("move it to 4pm")];
        assert_eq!(instruction_text(&msgs, Some("42")), "move it to 4pm");
    }
}
