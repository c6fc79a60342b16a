pub mod outcome;

use std::sync::Arc;

use log::{error, info, warn};

use crate::llm::agent::calendar::{CALENDAR_TASK_EXPECTED_OUTPUT, TIME_NORMALIZATION_DIRECTIVE};
use crate::llm::agent::{AgentDescriptor, TaskDescriptor};

pub use outcome::{classify_result, TaskError, TaskOutcome};

/// Turns one instruction into exactly one outcome. Never fails; may block for a long time.
pub trait TaskRunner: Send + Sync {
    fn run(&self, instruction: &str) -> TaskOutcome;
}

/// Runs instructions against the process-wide calendar agent.
pub struct CalendarTaskRunner {
    agent: Arc<AgentDescriptor>,
}

impl CalendarTaskRunner {
    pub fn new(agent: Arc<AgentDescriptor>) -> Self {
        Self { agent }
    }
}

pub fn build_task<'a>(agent: &'a AgentDescriptor, instruction: &str) -> TaskDescriptor<'a> {
    let mut description = String::with_capacity(instruction.len() + TIME_NORMALIZATION_DIRECTIVE.len());
    description.push_str(instruction);
    description.push_str(TIME_NORMALIZATION_DIRECTIVE);
    TaskDescriptor::new(description, agent, CALENDAR_TASK_EXPECTED_OUTPUT)
}

impl TaskRunner for CalendarTaskRunner {
    fn run(&self, instruction: &str) -> TaskOutcome {
        if instruction.trim().is_empty() {
            warn!("[TaskRunner] empty instruction, passing it to the agent as is");
        }

        let task = build_task(&self.agent, instruction);
        info!("[TaskRunner] executing task for instruction: {}", instruction);

        let outcome = match task.execute() {
            Ok(raw) => classify_result(raw.as_deref()),
            Err(e) => {
                error!("[TaskRunner] task execution failed: {}", e);
                TaskOutcome::Error(TaskError::Execution(e.to_string()))
            }
        };

        match &outcome {
            TaskOutcome::Error(e) => error!("[TaskRunner] task ended with error: {}", e),
            other => info!("[TaskRunner] task ended with {}", other),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::llm::agent::executor::tests::{agent, tool_call, ScriptedLLM};
    use crate::llm::Message;
    use serde_json::json;

    #[test]
    fn test_build_task_appends_directive() {
        let llm = Arc::new(ScriptedLLM::new(Vec::new()));
        let agent = agent(llm, 3);
        let task = build_task(&agent, "create a meeting called Sync from 2pm to 3pm tomorrow");

        assert!(task.description.starts_with("create a meeting called Sync"));
        assert!(task.description.ends_with(TIME_NORMALIZATION_DIRECTIVE));
        assert!(!task.allow_delegation);
        assert_eq!(task.expected_output, CALENDAR_TASK_EXPECTED_OUTPUT);
    }

    #[test]
    fn test_run_success() {
        let llm = Arc::new(ScriptedLLM::new(vec![
            Ok(tool_call("c1", "GOOGLECALENDAR_CREATE_EVENT", json!({"summary": "Sync"}))),
            Ok(Message::assistant("Event 'Sync' created")),
        ]));
        let runner = CalendarTaskRunner::new(Arc::new(agent(llm, 5)));
        let outcome = runner.run("create Sync");
        assert!(outcome.is_completed());
    }

    #[test]
    fn test_run_network_failure_becomes_error() {
        let llm = Arc::new(ScriptedLLM::new(vec![Err(Error::LLMError(
            "failed to send request: connection refused".into(),
        ))]));
        let runner = CalendarTaskRunner::new(Arc::new(agent(llm, 5)));
        match runner.run("create Sync") {
            TaskOutcome::Error(TaskError::Execution(msg)) => assert!(msg.contains("connection refused")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_run_without_content_is_error() {
        let mut silent = Message::assistant("");
        silent.content = None;
        let llm = Arc::new(ScriptedLLM::new(vec![Ok(silent)]));
        let runner = CalendarTaskRunner::new(Arc::new(agent(llm, 5)));
        assert!(matches!(runner.run("create Sync"), TaskOutcome::Error(_)));
    }

    #[test]
    fn test_run_always_yields_one_of_three_kinds() {
        let llm = Arc::new(ScriptedLLM::new(vec![Ok(Message::assistant("done")), Ok(Message::assistant("done"))]));
        let runner = CalendarTaskRunner::new(Arc::new(agent(llm, 5)));
        for _ in 0..3 {
            let kind = runner.run("").kind();
            assert!(["success", "failure", "error"].contains(&kind));
        }
    }
}
