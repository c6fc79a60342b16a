use chrono::{DateTime, FixedOffset, SecondsFormat};
use log::{debug, info, warn};

use super::TaskDescriptor;
use crate::error::{Error, Result};
use crate::llm::{InferenceParam, Message};

macro_rules! step {
    ($verbose:expr, $($arg:tt)*) => {
        if $verbose { info!($($arg)*) } else { debug!($($arg)*) }
    };
}

fn system_prompt(task: &TaskDescriptor, now: DateTime<FixedOffset>) -> String {
    let agent = task.agent;
    format!(
        "You are {}. {}\nYour personal goal is: {}\nThe current date and time is {}.",
        agent.role,
        agent.backstory,
        agent.goal,
        now.to_rfc3339_opts(SecondsFormat::Secs, false)
    )
}

fn task_prompt(task: &TaskDescriptor) -> String {
    format!(
        "Current Task: {}\n\nThis is the expected criteria for your final answer: {}\n\
         You MUST return the actual complete content as the final answer, not a summary.",
        task.description, task.expected_output
    )
}

/// Drive one task through the tool-calling loop.
///
/// Returns the model's final text, or `None` when its last turn had no content.
/// Tool failures are reported back to the model; LLM failures and running out
/// of iterations are errors.
pub fn execute(task: &TaskDescriptor, now: DateTime<FixedOffset>) -> Result<Option<String>> {
    let agent = task.agent;
    let verbose = agent.verbose;

    if task.allow_delegation {
        warn!("[AgentExecutor] delegation requested but {} has no coworkers, ignoring", agent.role);
    }

    let mut messages = vec![Message::system(system_prompt(task, now)), Message::user(task_prompt(task))];

    step!(verbose, "[AgentExecutor] {} working on: {}", agent.role, task.description);

    for iteration in 1..=agent.max_iterations {
        step!(
            verbose,
            "[AgentExecutor] iteration {}: llm [{}] inference with {} message(s)",
            iteration,
            agent.llm.get_model_name(),
            messages.len()
        );

        let response = agent.llm.inference(&InferenceParam {
            messages: &messages,
            tools: Some(agent.tools.as_slice()),
        })?;

        if response.tool_calls.is_empty() {
            step!(verbose, "[AgentExecutor] final answer: {:?}", response.content);
            return Ok(response.content);
        }

        let tool_calls = response.tool_calls.clone();
        messages.push(response);

        for tool_call in &tool_calls {
            step!(
                verbose,
                "[AgentExecutor] executing tool: {}({}) [{}]",
                tool_call.function.name,
                tool_call.function.arguments,
                tool_call.id
            );

            let result = match agent.tools.iter().find(|t| t.name() == tool_call.function.name) {
                Some(tool) => match tool.call(tool_call.function.arguments.clone()) {
                    Ok(output) => {
                        step!(verbose, "[AgentExecutor] tool [{}] executed successfully", tool_call.function.name);
                        output.to_string()
                    }
                    Err(e) => {
                        warn!("[AgentExecutor] tool [{}] execution failed: {}", tool_call.function.name, e);
                        format!("Error executing tool: {}", e)
                    }
                },
                None => {
                    warn!("[AgentExecutor] tool [{}] not found", tool_call.function.name);
                    format!("Tool '{}' not found", tool_call.function.name)
                }
            };
            messages.push(Message::tool(tool_call.id.clone(), result));
        }
    }

    Err(Error::LLMError(format!(
        "agent stopped after {} iteration(s) without a final answer",
        agent.max_iterations
    )))
}
