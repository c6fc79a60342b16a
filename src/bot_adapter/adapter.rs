use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use super::event::RelayHandler;
use super::models::{MessageEvent, Profile, RawMessageEvent};
use super::reply::{ReplySender, WsReplySender};
use crate::error::Result;
use crate::util::mask_url_credentials;
use crate::util::url_utils::extract_host;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

/// BotAdapter connects to the QQ bot server via WebSocket and relays mentions
pub struct BotAdapter {
    url: String,
    token: String,
    bot_profile: Option<Profile>,
    relay: Arc<RelayHandler>,
}

/// Shared handle for BotAdapter that allows mutation inside async tasks
pub type SharedBotAdapter = Arc<TokioMutex<BotAdapter>>;

/// What an inbound frame from the bot server turned out to be
#[derive(Debug)]
pub enum InboundFrame {
    Lifecycle { self_id: Option<i64> },
    Heartbeat,
    ActionResponse { retcode: i64, echo: Option<String>, message: Option<String> },
    Message(Box<RawMessageEvent>),
    Ignored,
}

/// Sort a decoded OneBot frame by its post type.
pub fn classify_frame(frame: Value) -> Result<InboundFrame> {
    if let Some(retcode) = frame.get("retcode").and_then(Value::as_i64) {
        let echo = frame.get("echo").and_then(Value::as_str).map(str::to_string);
        let message = frame
            .get("wording")
            .or_else(|| frame.get("msg"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(InboundFrame::ActionResponse { retcode, echo, message });
    }

    let post_type = frame.get("post_type").and_then(Value::as_str).unwrap_or_default();
    match post_type {
        "meta_event" => match frame.get("meta_event_type").and_then(Value::as_str) {
            Some("lifecycle") => Ok(InboundFrame::Lifecycle {
                self_id: frame.get("self_id").and_then(Value::as_i64),
            }),
            Some("heartbeat") => Ok(InboundFrame::Heartbeat),
            _ => Ok(InboundFrame::Ignored),
        },
        "message" | "message_sent" if frame.get("message_type").is_some() => {
            Ok(InboundFrame::Message(Box::new(serde_json::from_value(frame)?)))
        }
        _ => Ok(InboundFrame::Ignored),
    }
}

impl BotAdapter {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        qq_id: Option<String>,
        relay: Arc<RelayHandler>,
    ) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            bot_profile: qq_id.map(|qq_id| Profile { qq_id }),
            relay,
        }
    }

    /// Convert this adapter into a shared, mutex-protected handle
    pub fn into_shared(self) -> SharedBotAdapter {
        Arc::new(TokioMutex::new(self))
    }

    /// The bot's own account id, once configured or learned from the server
    pub fn get_bot_id(&self) -> Option<&str> {
        self.bot_profile.as_ref().map(|p| p.qq_id.as_str())
    }

    /// Record the bot account reported by the server, unless one is already known
    pub fn learn_bot_id(&mut self, self_id: i64) {
        if self.bot_profile.is_none() {
            info!("[BotAdapter] Using bot account {} reported by the server", self_id);
            self.bot_profile = Some(Profile { qq_id: self_id.to_string() });
        }
    }

    /// Start the WebSocket connection and begin processing events using a shared handle
    pub async fn start(adapter: SharedBotAdapter) -> Result<()> {
        let (url, token) = {
            let guard = adapter.lock().await;
            (guard.url.clone(), guard.token.clone())
        };

        info!("[BotAdapter] Connecting to bot server at {}", mask_url_credentials(&url));

        // Build the WebSocket request with authorization header
        let request = http::Request::builder()
            .uri(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Host", extract_host(&url).unwrap_or("localhost"))
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .body(())?;

        let (ws_stream, _) = connect_async(request).await?;
        info!("[BotAdapter] Connected to the qq bot server successfully.");

        let (mut write, mut read) = ws_stream.split();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(action) = rx.recv().await {
                if let Err(e) = write.send(WsMessage::Text(action)).await {
                    error!("[BotAdapter] Failed to send action to bot server: {}", e);
                    break;
                }
            }
        });
        let sender: Arc<dyn ReplySender> = Arc::new(WsReplySender::new(tx));

        // Process incoming messages
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(WsMessage::Text(text)) => {
                    BotAdapter::process_event(adapter.clone(), sender.clone(), text).await;
                }
                Ok(WsMessage::Binary(data)) => {
                    if let Ok(text) = String::from_utf8(data) {
                        BotAdapter::process_event(adapter.clone(), sender.clone(), text).await;
                    } else {
                        warn!("[BotAdapter] Received binary message that is not valid UTF-8");
                    }
                }
                Ok(WsMessage::Close(_)) => {
                    info!("[BotAdapter] WebSocket connection closed");
                    break;
                }
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {}
                Err(e) => {
                    error!("[BotAdapter] WebSocket error: {}", e);
                    break;
                }
            }
        }

        writer.abort();
        Ok(())
    }

    /// Process a single event frame
    async fn process_event(adapter: SharedBotAdapter, sender: Arc<dyn ReplySender>, message: String) {
        debug!("[BotAdapter] Received message: {}", message);

        let frame: Value = match serde_json::from_str(&message) {
            Ok(v) => v,
            Err(e) => {
                error!("[BotAdapter] Failed to parse message as JSON: {}", e);
                return;
            }
        };

        let raw_event = match classify_frame(frame) {
            Ok(InboundFrame::Message(raw)) => *raw,
            Ok(InboundFrame::Lifecycle { self_id }) => {
                match self_id {
                    Some(id) => {
                        info!("[BotAdapter] Logged in as {}", id);
                        adapter.lock().await.learn_bot_id(id);
                    }
                    None => info!("[BotAdapter] Lifecycle event without self_id"),
                }
                return;
            }
            Ok(InboundFrame::Heartbeat) => {
                debug!("[BotAdapter] Heartbeat");
                return;
            }
            Ok(InboundFrame::ActionResponse { retcode, echo, message }) => {
                let echo = echo.unwrap_or_default();
                if retcode != 0 {
                    warn!(
                        "[BotAdapter] Action {} failed with retcode {}: {}",
                        echo,
                        retcode,
                        message.unwrap_or_default()
                    );
                } else {
                    debug!("[BotAdapter] Action {} succeeded", echo);
                }
                return;
            }
            Ok(InboundFrame::Ignored) => {
                debug!("[BotAdapter] Ignoring non-message event");
                return;
            }
            Err(e) => {
                error!("[BotAdapter] Failed to parse message event: {}", e);
                return;
            }
        };

        let event = MessageEvent::from(raw_event);
        let (bot_id, relay) = {
            let mut guard = adapter.lock().await;
            if let Some(id) = event.self_id {
                guard.learn_bot_id(id);
            }
            (guard.get_bot_id().map(str::to_string), guard.relay.clone())
        };

        tokio::spawn(async move {
            relay.process_message(&event, bot_id.as_deref(), sender.as_ref()).await;
        });
    }
}
