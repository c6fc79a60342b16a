pub mod calendar;
pub mod executor;

use std::sync::Arc;

use chrono::FixedOffset;

use crate::llm::function_tools::FunctionTool;
use crate::llm::LLMBase;

/// A configured LLM-driven agent. Built once at startup and shared read-only by every task.
pub struct AgentDescriptor {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Vec<Arc<dyn FunctionTool>>,
    pub llm: Arc<dyn LLMBase>,
    pub verbose: bool,
    /// Carried for completeness; the executor keeps no state between tasks.
    pub memory: bool,
    pub max_iterations: u32,
    /// Offset used to render the clock line given to the model
    pub timezone: FixedOffset,
}

/// One instruction for one execution pass, owned by a single task runner invocation.
pub struct TaskDescriptor<'a> {
    pub description: String,
    pub agent: &'a AgentDescriptor,
    pub expected_output: String,
    pub allow_delegation: bool,
}

impl<'a> TaskDescriptor<'a> {
    pub fn new(
        description: impl Into<String>,
        agent: &'a AgentDescriptor,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            agent,
            expected_output: expected_output.into(),
            allow_delegation: false,
        }
    }

    /// Run the task to completion. Blocks for as long as the model keeps calling tools.
    pub fn execute(&self) -> crate::error::Result<Option<String>> {
        let now = chrono::Utc::now().with_timezone(&self.agent.timezone);
        executor::execute(self, now)
    }
}
