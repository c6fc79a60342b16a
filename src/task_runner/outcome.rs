use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Why a task ended without a usable completion signal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("result is not valid JSON: {0}")]
    NotJson(String),

    #[error("decode failure: {reason} (content: {content})")]
    Decode { content: String, reason: String },

    #[error("result has no 'executed' field: {0}")]
    MissingExecutedField(String),

    #[error("execution failure: {0}")]
    Execution(String),
}

/// Three-way judgment of one task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success(String),
    Failure(String),
    Error(TaskError),
}

impl TaskOutcome {
    /// Success carrying some non-blank completion text
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Success(text) if !text.trim().is_empty())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskOutcome::Success(_) => "success",
            TaskOutcome::Failure(_) => "failure",
            TaskOutcome::Error(_) => "error",
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Success(text) => write!(f, "success: {}", text),
            TaskOutcome::Failure(text) => write!(f, "failure: {}", text),
            TaskOutcome::Error(e) => write!(f, "error: {}", e),
        }
    }
}

/// Classify the raw text an agent returned.
///
/// Any present result is a success and is not parsed further. Only an absent
/// result goes down the `executed`-flag path, which for `None` always ends in
/// an error.
pub fn classify_result(raw: Option<&str>) -> TaskOutcome {
    if let Some(text) = raw {
        return TaskOutcome::Success(text.to_string());
    }
    classify_executed_flag(raw)
}

/// The JSON fallback path: `{"executed": true}` is a success, `false` a failure,
/// anything else an error.
pub fn classify_executed_flag(raw: Option<&str>) -> TaskOutcome {
    let Some(text) = raw else {
        return TaskOutcome::Error(TaskError::NotJson("null".to_string()));
    };
    match parse_executed_flag(text) {
        Ok(true) => TaskOutcome::Success(text.to_string()),
        Ok(false) => TaskOutcome::Failure(text.to_string()),
        Err(e) => TaskOutcome::Error(e),
    }
}

/// Read the boolean `executed` field of a `{`…`}` delimited JSON object.
pub fn parse_executed_flag(raw: &str) -> Result<bool, TaskError> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return Err(TaskError::NotJson(raw.to_string()));
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| TaskError::Decode {
        content: raw.to_string(),
        reason: e.to_string(),
    })?;

    match value.get("executed") {
        Some(Value::Bool(b)) => Ok(*b),
        _ => Err(TaskError::MissingExecutedField(raw.to_string())),
    }
}
