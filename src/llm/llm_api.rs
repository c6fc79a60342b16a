use super::{InferenceParam, LLMBase, Message, role_to_str, str_to_role};
use super::function_tools::{ToolCalls, ToolCallsFuncSpec};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::time::Duration;
use log::{error, debug};

/// OpenAI-compatible chat completions client
#[derive(Debug, Clone)]
pub struct LLMAPI {
    model_name: String,
    api_endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl LLMAPI {
    /// Create a new LLMAPI instance
    pub fn new(
        model_name: String,
        api_endpoint: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            model_name,
            api_endpoint,
            api_key,
            timeout,
        }
    }

    /// Parse tool calls from JSON array
    fn parse_tool_calls(tool_calls_value: &Value) -> Vec<ToolCalls> {
        tool_calls_value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        let id = tc.get("id")?.as_str()?.to_string();
                        let type_name = tc
                            .get("type")
                            .and_then(|t| t.as_str())
                            .unwrap_or("function")
                            .to_string();
                        let func = tc.get("function")?;
                        let name = func.get("name")?.as_str()?.to_string();

                        let arguments = func
                            .get("arguments")
                            .and_then(|args| {
                                if args.is_string() {
                                    args.as_str()
                                        .and_then(|s| serde_json::from_str::<Value>(s).ok())
                                } else {
                                    Some(args.clone())
                                }
                            })
                            .unwrap_or(Value::Null);

                        Some(ToolCalls {
                            id,
                            type_name,
                            function: ToolCallsFuncSpec { name, arguments },
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse_api_message(api_resp: &Value) -> Option<Message> {
        let choices = api_resp.get("choices")?.as_array()?;
        let choice = choices.first()?;
        let msg = choice.get("message")?;

        let role_str = msg.get("role").and_then(|r| r.as_str()).unwrap_or("assistant");
        let role = str_to_role(role_str);

        let content = msg.get("content").and_then(|c| c.as_str()).map(|s| s.to_string());
        let tool_calls = msg
            .get("tool_calls")
            .map(Self::parse_tool_calls)
            .unwrap_or_default();

        Some(Message {
            role,
            content,
            tool_calls,
            tool_call_id: None,
        })
    }

    fn build_request_body(&self, param: &InferenceParam) -> Value {
        let messages: Vec<Value> = param
            .messages
            .iter()
            .map(|msg| {
                let mut msg_obj = json!({
                    "role": role_to_str(&msg.role),
                    "content": msg.content,
                });

                if !msg.tool_calls.is_empty() {
                    let tool_calls: Vec<_> = msg
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": tc.type_name,
                                "function": {
                                    "name": tc.function.name,
                                    "arguments": tc.function.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    msg_obj["tool_calls"] = json!(tool_calls);
                }

                if let Some(ref id) = msg.tool_call_id {
                    msg_obj["tool_call_id"] = json!(id);
                }

                msg_obj
            })
            .collect();

        let mut request_body = json!({
            "model": self.model_name,
            "messages": messages,
        });

        if let Some(tools) = param.tools.filter(|ts| !ts.is_empty()) {
            let tool_list: Vec<Value> = tools
                .iter()
                .map(|tool| json!({ "type": "function", "function": tool.get_json() }))
                .collect();
            request_body["tools"] = json!(tool_list);
            request_body["tool_choice"] = json!("auto");
        }

        request_body
    }
}

impl LLMBase for LLMAPI {
    fn get_model_name(&self) -> &str {
        &self.model_name
    }

    fn inference(&self, param: &InferenceParam) -> Result<Message> {
        let client = Client::builder().timeout(self.timeout).build()?;

        let request_body = self.build_request_body(param);
        let mut request = client.post(&self.api_endpoint).json(&request_body);

        if let Some(ref api_key) = self.api_key {
            // Check if api_key already contains "Bearer " prefix
            let auth_header = if api_key.starts_with("Bearer ") {
                api_key.to_string()
            } else {
                format!("Bearer {}", api_key)
            };
            request = request.header("Authorization", auth_header);
        }

        let response = request.send().map_err(|e| {
            error!("Failed to send API request: {}", e);
            Error::LLMError(format!("failed to send request: {}", e))
        })?;

        let status = response.status();
        let response_text = response.text()?;
        if !status.is_success() {
            error!("API request failed with status {}: {}", status, response_text);
            return Err(Error::LLMError(format!("API request failed with status {}", status)));
        }

        let api_resp: Value = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse API response: {}, original response: {:?}", e, &response_text);
            Error::LLMError(format!("failed to parse response: {}", e))
        })?;

        match Self::parse_api_message(&api_resp) {
            Some(msg) => {
                debug!("Successfully parsed API response");
                Ok(msg)
            }
            None => {
                error!("Invalid API response structure: missing required fields");
                Err(Error::LLMError("invalid response structure from API".to_string()))
            }
        }
    }
}
