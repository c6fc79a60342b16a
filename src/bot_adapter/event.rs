use log::{debug, error, info};
use std::sync::Arc;

use super::models::message::instruction_text;
use super::models::MessageEvent;
use super::reply::ReplySender;
use crate::task_runner::{TaskError, TaskOutcome, TaskRunner};

pub const WORKING_REPLY: &str = "Working on it!";
pub const COMPLETED_REPLY: &str = "Task Completed <3";
pub const FAILED_REPLY: &str = "Task Failed :(";

/// What the relay did with one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayDecision {
    IgnoredAutomatedSender,
    NotMentioned,
    Handled(TaskOutcome),
}

/// Filters inbound messages for mentions of the bot and relays them to the task runner.
pub struct RelayHandler {
    runner: Arc<dyn TaskRunner>,
    bot_user_ids: Vec<String>,
    strip_bot_mention: bool,
}

impl RelayHandler {
    pub fn new(runner: Arc<dyn TaskRunner>, bot_user_ids: Vec<String>, strip_bot_mention: bool) -> Self {
        Self {
            runner,
            bot_user_ids,
            strip_bot_mention,
        }
    }

    fn send(&self, sender: &dyn ReplySender, event: &MessageEvent, text: &str) {
        if let Err(e) = sender.reply(event, text) {
            error!("[Relay] Failed to send reply '{}' to message {}: {}", text, event.message_id, e);
        }
    }

    /// Handle one inbound message.
    ///
    /// A qualifying message gets exactly two replies, working then final, whatever the runner does.
    pub async fn process_message(
        &self,
        event: &MessageEvent,
        bot_id: Option<&str>,
        sender: &dyn ReplySender,
    ) -> RelayDecision {
        if event.is_from_bot(bot_id, &self.bot_user_ids) {
            debug!("[Relay] Ignoring message {} from automated sender {}", event.message_id, event.sender.user_id);
            return RelayDecision::IgnoredAutomatedSender;
        }

        let Some(bot_id) = bot_id.filter(|id| event.mentions(id)) else {
            debug!("[Relay] Message {} does not mention the bot", event.message_id);
            return RelayDecision::NotMentioned;
        };

        info!(
            "[Relay] message {} in {} from {}({}) mentions the bot",
            event.message_id,
            event.conversation_label(),
            event.sender.display_name(),
            event.sender.user_id
        );

        self.send(sender, event, WORKING_REPLY);

        let strip = self.strip_bot_mention.then_some(bot_id);
        let instruction = instruction_text(&event.message_list, strip);
        let runner = self.runner.clone();

        let outcome = match tokio::task::spawn_blocking(move || runner.run(&instruction)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[Relay] Task runner for message {} did not finish: {}", event.message_id, e);
                TaskOutcome::Error(TaskError::Execution(e.to_string()))
            }
        };

        let final_reply = if outcome.is_completed() { COMPLETED_REPLY } else { FAILED_REPLY };
        info!("[Relay] Message {} finished with {}, replying '{}'", event.message_id, outcome.kind(), final_reply);
        self.send(sender, event, final_reply);

        RelayDecision::Handled(outcome)
    }
}
