use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{select_actions, RemoteAction, ToolSetProvider};
use crate::error::{Error, Result};

/// Composio REST client: lists the actions of an app and executes them on behalf of one entity.
pub struct ComposioToolSet {
    base_url: String,
    api_key: String,
    entity_id: String,
    timeout: Duration,
    /// Configured account, or the one resolved on first execution
    connected_account_id: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct ItemsResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectedAccount {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    #[serde(rename = "appUniqueId", default)]
    pub app_unique_id: String,
}

impl ComposioToolSet {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        entity_id: impl Into<String>,
        connected_account_id: Option<String>,
    ) -> Self {
        let connected = OnceCell::new();
        if let Some(id) = connected_account_id {
            let _ = connected.set(id);
        }
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            entity_id: entity_id.into(),
            timeout: Duration::from_secs(60),
            connected_account_id: connected,
        }
    }

    fn client(&self) -> Result<Client> {
        Ok(Client::builder().timeout(self.timeout).build()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.as_u16() == 200 {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(Error::ToolError(format!("Composio returned status {}: {}", status, body)))
    }

    fn get_connected_accounts(&self) -> Result<Vec<ConnectedAccount>> {
        let response = self
            .client()?
            .get(self.url("connectedAccounts"))
            .header("x-api-key", &self.api_key)
            .query(&[("user_uuid", self.entity_id.as_str()), ("showActiveOnly", "true")])
            .send()?;
        let parsed: ItemsResponse<ConnectedAccount> = Self::check(response)?.json()?;
        Ok(parsed.items)
    }

    fn connected_account_for(&self, app: &str) -> Result<&str> {
        self.connected_account_id
            .get_or_try_init(|| {
                let accounts = self.get_connected_accounts()?;
                let id = pick_connected_account(&accounts, app).ok_or_else(|| {
                    Error::ToolError(format!(
                        "no active connected account for app '{}' and entity '{}'",
                        app, self.entity_id
                    ))
                })?;
                info!("[Composio] Using connected account {} for app {}", id, app);
                Ok::<String, Error>(id)
            })
            .map(|s| s.as_str())
    }
}

/// The most recently created active account connected to `app`.
pub fn pick_connected_account(accounts: &[ConnectedAccount], app: &str) -> Option<String> {
    accounts
        .iter()
        .filter(|a| a.status.eq_ignore_ascii_case("ACTIVE"))
        .filter(|a| a.app_unique_id.eq_ignore_ascii_case(app))
        .max_by_key(|a| {
            DateTime::parse_from_rfc3339(&a.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        })
        .map(|a| a.id.clone())
}

impl ToolSetProvider for ComposioToolSet {
    fn get_actions(&self, app: &str) -> Result<Vec<RemoteAction>> {
        info!("[Composio] Fetching actions for app {}", app);
        let response = self
            .client()?
            .get(self.url("actions"))
            .header("x-api-key", &self.api_key)
            .query(&[("appNames", app)])
            .send()?;
        let parsed: ItemsResponse<RemoteAction> = Self::check(response)?.json()?;

        let actions = select_actions(parsed.items);
        if actions.is_empty() {
            warn!("[Composio] App {} exposes no enabled actions", app);
        }
        info!("[Composio] Loaded {} action(s) for app {}", actions.len(), app);
        Ok(actions)
    }

    fn execute(&self, action: &RemoteAction, input: Value) -> Result<Value> {
        let app = if action.app_name.is_empty() {
            super::GOOGLE_CALENDAR_APP
        } else {
            action.app_name.as_str()
        };
        let connected_account = self.connected_account_for(app)?;

        debug!("[Composio] Executing {} with input {}", action.name, input);
        let body = json!({
            "connectedAccountId": connected_account,
            "input": input,
            "entityId": self.entity_id,
            "appName": app,
        });
        let response = self
            .client()?
            .post(self.url(&format!("actions/{}/execute", action.name)))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()?;
        Ok(Self::check(response)?.json()?)
    }
}
