use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;

use super::models::message::Message;
use super::models::{MessageEvent, MessageType};
use crate::error::{Error, Result};

/// Outbound side of the chat transport: replies scoped to a triggering message.
pub trait ReplySender: Send + Sync {
    fn reply(&self, event: &MessageEvent, text: &str) -> Result<()>;
}

/// OneBot action that quotes `event` and answers in the same conversation.
pub fn build_reply_action(event: &MessageEvent, text: &str, echo: &str) -> Result<Value> {
    let message = serde_json::to_value(vec![Message::reply(event.message_id), Message::text(text)])?;

    let action = match event.message_type {
        MessageType::Group => {
            let group_id = event
                .group_id
                .ok_or_else(|| Error::ValidationError(format!("group message {} has no group_id", event.message_id)))?;
            json!({
                "action": "send_group_msg",
                "params": { "group_id": group_id, "message": message },
                "echo": echo,
            })
        }
        MessageType::Private => json!({
            "action": "send_private_msg",
            "params": { "user_id": event.sender.user_id, "message": message },
            "echo": echo,
        }),
    };
    Ok(action)
}

/// Queues reply actions for the WebSocket writer task.
pub struct WsReplySender {
    tx: UnboundedSender<String>,
    next_echo: AtomicU64,
}

impl WsReplySender {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx, next_echo: AtomicU64::new(1) }
    }
}

impl ReplySender for WsReplySender {
    fn reply(&self, event: &MessageEvent, text: &str) -> Result<()> {
        let echo = format!("reply-{}-{}", event.message_id, self.next_echo.fetch_add(1, Ordering::SeqCst));
        let action = build_reply_action(event, text, &echo)?;
        debug!("[BotAdapter] queueing action {}", echo);
        self.tx
            .send(action.to_string())
            .map_err(|_| crate::string_error!("WebSocket writer is closed, dropping reply {}", echo))
    }
}
