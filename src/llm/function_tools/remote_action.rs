use super::FunctionTool;
use crate::error::Result;
use crate::toolset::{RemoteAction, ToolSetProvider};
use serde_json::{json, Value};
use std::sync::Arc;

/// Function tool backed by one action of the remote tool platform.
///
/// Name, description and parameter schema come from the platform's action
/// catalogue; `call` forwards the model's arguments unchanged.
#[derive(Clone)]
pub struct RemoteActionTool {
    action: RemoteAction,
    provider: Arc<dyn ToolSetProvider>,
}

impl RemoteActionTool {
    pub fn new(action: RemoteAction, provider: Arc<dyn ToolSetProvider>) -> Self {
        Self { action, provider }
    }
}

impl FunctionTool for RemoteActionTool {
    fn name(&self) -> &str {
        &self.action.name
    }

    fn description(&self) -> &str {
        self.action
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.action.display_name)
    }

    fn parameters(&self) -> Value {
        if self.action.parameters.is_object() {
            self.action.parameters.clone()
        } else {
            json!({ "type": "object", "properties": {} })
        }
    }

    fn call(&self, arguments: Value) -> Result<Value> {
        let input = match arguments {
            Value::Null => json!({}),
            Value::Object(_) => arguments,
            other => {
                return Err(crate::string_error!(
                    "arguments for {} must be a JSON object, got {}",
                    self.action.name,
                    other
                ))
            }
        };
        self.provider.execute(&self.action, input)
    }
}
