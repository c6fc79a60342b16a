//! Remote action catalogue: the calendar actions hosted by a tool-calling platform.

pub mod composio;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::llm::function_tools::{FunctionTool, RemoteActionTool};

pub use composio::ComposioToolSet;

/// App identifier of the calendar integration on the tool platform.
pub const GOOGLE_CALENDAR_APP: &str = "googlecalendar";

/// Above this many actions an app's `important`-tagged actions are preferred.
const IMPORTANT_TAG_THRESHOLD: usize = 15;

/// One remotely-invokable action. Opaque to the relay and task runner.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAction {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default, rename = "appName")]
    pub app_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub trait ToolSetProvider: Send + Sync {
    /// The fixed, ordered action set of `app`.
    fn get_actions(&self, app: &str) -> Result<Vec<RemoteAction>>;

    /// Run `action` with `input` and return the platform's raw response.
    fn execute(&self, action: &RemoteAction, input: Value) -> Result<Value>;
}

/// Keep enabled actions in catalogue order; prefer `important` ones when the app is large.
///
/// The app size is the full catalogue length, disabled actions included.
pub fn select_actions(items: Vec<RemoteAction>) -> Vec<RemoteAction> {
    let catalogue_len = items.len();
    let enabled: Vec<RemoteAction> = items.into_iter().filter(|a| a.enabled).collect();
    if catalogue_len < IMPORTANT_TAG_THRESHOLD {
        return enabled;
    }
    let important: Vec<RemoteAction> = enabled
        .iter()
        .filter(|a| a.tags.iter().any(|t| t == "important"))
        .cloned()
        .collect();
    if important.is_empty() { enabled } else { important }
}

/// Look up the action set of `app` and expose each action as a function tool.
pub fn get_tools(provider: Arc<dyn ToolSetProvider>, app: &str) -> Result<Vec<Arc<dyn FunctionTool>>> {
    let actions = provider.get_actions(app)?;
    Ok(actions
        .into_iter()
        .map(|action| Arc::new(RemoteActionTool::new(action, provider.clone())) as Arc<dyn FunctionTool>)
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    pub(crate) fn action(name: &str, tags: &[&str]) -> RemoteAction {
        RemoteAction {
            name: name.to_string(),
            display_name: name.to_lowercase(),
            description: Some(format!("{} action", name)),
            parameters: json!({"type": "object", "properties": {}}),
            app_name: GOOGLE_CALENDAR_APP.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            enabled: true,
        }
    }

    /// In-memory provider that records executions.
    pub(crate) struct StaticToolSet {
        pub actions: Vec<RemoteAction>,
        pub executed: Mutex<Vec<(String, Value)>>,
    }

    impl ToolSetProvider for StaticToolSet {
        fn get_actions(&self, _app: &str) -> Result<Vec<RemoteAction>> {
            Ok(self.actions.clone())
        }

        fn execute(&self, action: &RemoteAction, input: Value) -> Result<Value> {
            self.executed.lock().unwrap().push((action.name.clone(), input.clone()));
            Ok(json!({"successfull": true, "data": {"echo": input}}))
        }
    }

    #[test]
    fn test_select_actions_small_app_keeps_all_enabled() {
        let mut disabled = action("GOOGLECALENDAR_QUICK_ADD", &[]);
        disabled.enabled = false;
        let selected = select_actions(vec![
            action("GOOGLECALENDAR_CREATE_EVENT", &["important"]),
            disabled,
            action("GOOGLECALENDAR_FIND_EVENT", &[]),
        ]);
        let names: Vec<_> = selected.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["GOOGLECALENDAR_CREATE_EVENT", "GOOGLECALENDAR_FIND_EVENT"]);
    }

    #[test]
    fn test_select_actions_large_app_prefers_important() {
        let mut items: Vec<RemoteAction> = (0..20).map(|i| action(&format!("A{}", i), &[])).collect();
        items[3].tags.push("important".into());
        items[11].tags.push("important".into());
        let selected = select_actions(items);
        let names: Vec<_> = selected.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["A3", "A11"]);
    }

    #[test]
    fn test_select_actions_threshold_counts_disabled_actions() {
        let mut items: Vec<RemoteAction> = (0..16).map(|i| action(&format!("A{}", i), &[])).collect();
        items[0].enabled = false;
        items[1].enabled = false;
        items[5].tags.push("important".into());
        let selected = select_actions(items);
        let names: Vec<_> = selected.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["A5"]);
    }

    #[test]
    fn test_select_actions_large_app_without_tags() {
        let items: Vec<RemoteAction> = (0..20).map(|i| action(&format!("A{}", i), &[])).collect();
        assert_eq!(select_actions(items).len(), 20);
    }

    #[test]
    fn test_get_tools_preserves_order() {
        let provider = Arc::new(StaticToolSet {
            actions: vec![action("B", &[]), action("A", &[])],
            executed: Mutex::new(Vec::new()),
        });
        let tools = get_tools(provider, GOOGLE_CALENDAR_APP).unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn test_remote_action_deserialize() {
        let a: RemoteAction = serde_json::from_value(json!({
            "name": "GOOGLECALENDAR_DELETE_EVENT",
            "display_name": "Delete event",
            "description": "Delete an event by id",
            "parameters": {"properties": {"event_id": {"type": "string"}}, "title": "DeleteEventRequest", "type": "object", "required": ["event_id"]},
            "appName": "googlecalendar",
            "tags": ["important"],
            "enabled": true,
            "logo": null
        }))
        .unwrap();
        assert_eq!(a.app_name, "googlecalendar");
        assert_eq!(a.parameters["required"][0], "event_id");
    }
}
