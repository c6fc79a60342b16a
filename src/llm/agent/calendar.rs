use std::sync::Arc;

use chrono::FixedOffset;

use super::AgentDescriptor;
use crate::llm::function_tools::FunctionTool;
use crate::llm::LLMBase;

pub const CALENDAR_AGENT_ROLE: &str = "Google Calendar Agent";

pub const CALENDAR_AGENT_GOAL: &str = "You take action on Google Calendar using Google Calendar APIs";

/// Appended to every instruction before it becomes a task description.
pub const TIME_NORMALIZATION_DIRECTIVE: &str = " Detect the start datetime and end datetime and convert them to RFC3339 format, then use that format as the input. Do not invoke any tool just to do this conversion.";

pub const CALENDAR_TASK_EXPECTED_OUTPUT: &str = "A short confirmation stating whether the requested calendar action was executed";

/// Calendar defaults substituted into the backstory.
pub struct CalendarDefaults<'a> {
    pub timezone_label: &'a str,
    pub calendar_id: &'a str,
}

pub fn calendar_backstory(defaults: &CalendarDefaults) -> String {
    format!(
        "You are an AI agent responsible for taking actions on Google Calendar on users' behalf. \
         You need to take action on Calendar using Google Calendar APIs. Use correct tools to run APIs from the given tool-set. \
         Unless the user says otherwise, use the timezone UTC{} and the calendar '{}'. \
         Before deleting or updating an event, first look it up by its title or description to find its event id, \
         then act on that id. \
         Once the task is done, stop calling tools and reply with the final answer.",
        defaults.timezone_label, defaults.calendar_id
    )
}

/// The single calendar agent of this process.
pub fn calendar_agent(
    llm: Arc<dyn LLMBase>,
    tools: Vec<Arc<dyn FunctionTool>>,
    defaults: &CalendarDefaults,
    timezone: FixedOffset,
    verbose: bool,
    memory: bool,
    max_iterations: u32,
) -> AgentDescriptor {
    AgentDescriptor {
        role: CALENDAR_AGENT_ROLE.to_string(),
        goal: CALENDAR_AGENT_GOAL.to_string(),
        backstory: calendar_backstory(defaults),
        tools,
        llm,
        verbose,
        memory,
        max_iterations,
        timezone,
    }
}
