use std::fs;
use serde::Deserialize;
use log::{info, warn};
use chrono::FixedOffset;

use crate::error::{Error, Result};

pub const DEFAULT_BOT_SERVER_URL: &str = "ws://localhost:3001";
pub const DEFAULT_AGENT_MODEL_API: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_AGENT_MODEL_NAME: &str = "gpt-4o-mini";
pub const DEFAULT_COMPOSIO_BASE_URL: &str = "https://backend.composio.dev/api";
pub const DEFAULT_COMPOSIO_ENTITY_ID: &str = "default";
pub const DEFAULT_CALENDAR_TIMEZONE: &str = "+05:30";
pub const DEFAULT_CALENDAR_ID: &str = "primary";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "BOT_SERVER_URL")]
    pub bot_server_url: Option<String>,
    #[serde(rename = "BOT_SERVER_TOKEN")]
    pub bot_server_token: Option<String>,
    #[serde(rename = "BOT_QQ_ID")]
    pub bot_qq_id: Option<String>,
    #[serde(rename = "BOT_USER_IDS", default)]
    pub bot_user_ids: Vec<String>,
    #[serde(rename = "STRIP_BOT_MENTION")]
    pub strip_bot_mention: Option<bool>,
    #[serde(rename = "AGENT_MODEL_API")]
    pub agent_model_api: Option<String>,
    #[serde(rename = "AGENT_MODEL_API_KEY")]
    pub agent_model_api_key: Option<String>,
    #[serde(rename = "AGENT_MODEL_NAME")]
    pub agent_model_name: Option<String>,
    #[serde(rename = "AGENT_MODEL_TIMEOUT_SECS")]
    pub agent_model_timeout_secs: Option<u64>,
    #[serde(rename = "AGENT_MAX_ITERATIONS")]
    pub agent_max_iterations: Option<u32>,
    #[serde(rename = "AGENT_VERBOSE")]
    pub agent_verbose: Option<bool>,
    #[serde(rename = "AGENT_MEMORY")]
    pub agent_memory: Option<bool>,
    #[serde(rename = "COMPOSIO_API_KEY")]
    pub composio_api_key: Option<String>,
    #[serde(rename = "COMPOSIO_BASE_URL")]
    pub composio_base_url: Option<String>,
    #[serde(rename = "COMPOSIO_ENTITY_ID")]
    pub composio_entity_id: Option<String>,
    #[serde(rename = "COMPOSIO_CONNECTED_ACCOUNT_ID")]
    pub composio_connected_account_id: Option<String>,
    #[serde(rename = "CALENDAR_TIMEZONE")]
    pub calendar_timezone: Option<String>,
    #[serde(rename = "CALENDAR_ID")]
    pub calendar_id: Option<String>,
}

/// Fully resolved settings. Every required key is present and every default applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_server_url: String,
    pub bot_server_token: String,
    pub bot_qq_id: Option<String>,
    pub bot_user_ids: Vec<String>,
    pub strip_bot_mention: bool,
    pub agent_model_api: String,
    pub agent_model_api_key: Option<String>,
    pub agent_model_name: String,
    pub agent_model_timeout_secs: u64,
    pub agent_max_iterations: u32,
    pub agent_verbose: bool,
    pub agent_memory: bool,
    pub composio_api_key: String,
    pub composio_base_url: String,
    pub composio_entity_id: String,
    pub composio_connected_account_id: Option<String>,
    pub calendar_timezone: FixedOffset,
    pub calendar_timezone_label: String,
    pub calendar_id: String,
}

/// Load configuration from the yaml file at `path`, then fill the gaps from the process environment.
pub fn load_config(path: &str) -> Result<Settings> {
    let config = match fs::read_to_string(path) {
        Ok(content) => {
            let config: Config = serde_yaml::from_str(&content)
                .map_err(|e| Error::ConfigError(format!("failed to parse {}: {}", path, e)))?;
            info!("Loaded configuration from {}", path);
            config
        }
        Err(e) => {
            info!("Could not read {} ({}), using environment variables", path, e);
            Config::default()
        }
    };

    resolve(config, |key| std::env::var(key).ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_flag(key: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            warn!("{} has unrecognised value '{}', ignoring", key, other);
            None
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Failed to parse {} ({}), using default", key, e);
            None
        }
    }
}

/// Apply environment overrides and defaults. `env` is the variable lookup.
pub fn resolve<F>(mut config: Config, env: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let string_key = |current: Option<String>, key: &str| non_empty(current).or_else(|| non_empty(env(key)));

    config.bot_server_url = string_key(config.bot_server_url, "BOT_SERVER_URL");
    config.bot_server_token = string_key(config.bot_server_token, "BOT_SERVER_TOKEN");
    config.bot_qq_id = string_key(config.bot_qq_id, "BOT_QQ_ID");
    config.agent_model_api = string_key(config.agent_model_api, "AGENT_MODEL_API");
    config.agent_model_api_key = string_key(config.agent_model_api_key, "AGENT_MODEL_API_KEY");
    config.agent_model_name = string_key(config.agent_model_name, "AGENT_MODEL_NAME");
    config.composio_api_key = string_key(config.composio_api_key, "COMPOSIO_API_KEY");
    config.composio_base_url = string_key(config.composio_base_url, "COMPOSIO_BASE_URL");
    config.composio_entity_id = string_key(config.composio_entity_id, "COMPOSIO_ENTITY_ID");
    config.composio_connected_account_id =
        string_key(config.composio_connected_account_id, "COMPOSIO_CONNECTED_ACCOUNT_ID");
    config.calendar_timezone = string_key(config.calendar_timezone, "CALENDAR_TIMEZONE");
    config.calendar_id = string_key(config.calendar_id, "CALENDAR_ID");

    if config.bot_user_ids.is_empty() {
        if let Some(ids) = env("BOT_USER_IDS") {
            config.bot_user_ids = ids
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    if config.strip_bot_mention.is_none() {
        config.strip_bot_mention = env("STRIP_BOT_MENTION").and_then(|v| parse_flag("STRIP_BOT_MENTION", &v));
    }
    if config.agent_verbose.is_none() {
        config.agent_verbose = env("AGENT_VERBOSE").and_then(|v| parse_flag("AGENT_VERBOSE", &v));
    }
    if config.agent_memory.is_none() {
        config.agent_memory = env("AGENT_MEMORY").and_then(|v| parse_flag("AGENT_MEMORY", &v));
    }
    if config.agent_model_timeout_secs.is_none() {
        config.agent_model_timeout_secs =
            env("AGENT_MODEL_TIMEOUT_SECS").and_then(|v| parse_number("AGENT_MODEL_TIMEOUT_SECS", &v));
    }
    if config.agent_max_iterations.is_none() {
        config.agent_max_iterations =
            env("AGENT_MAX_ITERATIONS").and_then(|v| parse_number("AGENT_MAX_ITERATIONS", &v));
    }

    let bot_server_token = config
        .bot_server_token
        .ok_or_else(|| Error::ConfigError("BOT_SERVER_TOKEN is not set".to_string()))?;
    let composio_api_key = config
        .composio_api_key
        .ok_or_else(|| Error::ConfigError("COMPOSIO_API_KEY is not set".to_string()))?;

    let calendar_timezone_label = config
        .calendar_timezone
        .unwrap_or_else(|| DEFAULT_CALENDAR_TIMEZONE.to_string());
    let calendar_timezone = parse_utc_offset(&calendar_timezone_label)?;

    let agent_max_iterations = match config.agent_max_iterations {
        Some(0) => {
            warn!("AGENT_MAX_ITERATIONS must be at least 1, using 1");
            1
        }
        Some(n) => n,
        None => 15,
    };

    Ok(Settings {
        bot_server_url: config
            .bot_server_url
            .unwrap_or_else(|| DEFAULT_BOT_SERVER_URL.to_string()),
        bot_server_token,
        bot_qq_id: config.bot_qq_id,
        bot_user_ids: config.bot_user_ids,
        strip_bot_mention: config.strip_bot_mention.unwrap_or(true),
        agent_model_api: config
            .agent_model_api
            .unwrap_or_else(|| DEFAULT_AGENT_MODEL_API.to_string()),
        agent_model_api_key: config.agent_model_api_key,
        agent_model_name: config
            .agent_model_name
            .unwrap_or_else(|| DEFAULT_AGENT_MODEL_NAME.to_string()),
        agent_model_timeout_secs: config.agent_model_timeout_secs.unwrap_or(120),
        agent_max_iterations,
        agent_verbose: config.agent_verbose.unwrap_or(true),
        agent_memory: config.agent_memory.unwrap_or(false),
        composio_api_key,
        composio_base_url: config
            .composio_base_url
            .unwrap_or_else(|| DEFAULT_COMPOSIO_BASE_URL.to_string()),
        composio_entity_id: config
            .composio_entity_id
            .unwrap_or_else(|| DEFAULT_COMPOSIO_ENTITY_ID.to_string()),
        composio_connected_account_id: config.composio_connected_account_id,
        calendar_timezone,
        calendar_timezone_label,
        calendar_id: config
            .calendar_id
            .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string()),
    })
}

/// Parse a fixed UTC offset written as `+HH:MM`, `-HH:MM`, `+HHMM` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| Error::ConfigError("invalid UTC offset".to_string()));
    }

    s.parse::<FixedOffset>()
        .map_err(|e| Error::ConfigError(format!("CALENDAR_TIMEZONE '{}' is not a ±HH:MM offset: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_bot_token_fails() {
        let err = resolve(Config::default(), env_of(&[("COMPOSIO_API_KEY", "ck")])).unwrap_err();
        assert!(matches!(err, Error::ConfigError(ref m) if m.contains("BOT_SERVER_TOKEN")));
    }

    #[test]
    fn test_missing_composio_key_fails() {
        let err = resolve(Config::default(), env_of(&[("BOT_SERVER_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, Error::ConfigError(ref m) if m.contains("COMPOSIO_API_KEY")));
    }

    #[test]
    fn test_defaults_applied() {
        let settings = resolve(
            Config::default(),
            env_of(&[("BOT_SERVER_TOKEN", "t"), ("COMPOSIO_API_KEY", "ck")]),
        )
        .unwrap();

        assert_eq!(settings.bot_server_url, DEFAULT_BOT_SERVER_URL);
        assert_eq!(settings.agent_model_name, DEFAULT_AGENT_MODEL_NAME);
        assert_eq!(settings.agent_model_timeout_secs, 120);
        assert_eq!(settings.agent_max_iterations, 15);
        assert!(settings.strip_bot_mention);
        assert!(settings.agent_verbose);
        assert!(!settings.agent_memory);
        assert_eq!(settings.calendar_id, "primary");
        assert_eq!(settings.calendar_timezone.local_minus_utc(), 5 * 3600 + 30 * 60);
        assert!(settings.bot_user_ids.is_empty());
    }

    #[test]
    fn test_yaml_values_win_over_env() {
        let yaml = r#"
BOT_SERVER_URL: "ws://bot:3001"
BOT_SERVER_TOKEN: "yaml-token"
COMPOSIO_API_KEY: "yaml-key"
BOT_USER_IDS: ["10001", "10002"]
AGENT_VERBOSE: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let settings = resolve(
            config,
            env_of(&[
                ("BOT_SERVER_URL", "ws://env:1"),
                ("BOT_SERVER_TOKEN", "env-token"),
                ("BOT_USER_IDS", "1,2,3"),
                ("AGENT_VERBOSE", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.bot_server_url, "ws://bot:3001");
        assert_eq!(settings.bot_server_token, "yaml-token");
        assert_eq!(settings.bot_user_ids, vec!["10001".to_string(), "10002".to_string()]);
        assert!(!settings.agent_verbose);
    }

    #[test]
    fn test_env_fills_gaps() {
        let settings = resolve(
            Config::default(),
            env_of(&[
                ("BOT_SERVER_TOKEN", "t"),
                ("COMPOSIO_API_KEY", "ck"),
                ("BOT_USER_IDS", " 1, ,2 "),
                ("STRIP_BOT_MENTION", "no"),
                ("AGENT_MAX_ITERATIONS", "4"),
                ("AGENT_MODEL_TIMEOUT_SECS", "not-a-number"),
                ("CALENDAR_TIMEZONE", "-03:00"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.bot_user_ids, vec!["1".to_string(), "2".to_string()]);
        assert!(!settings.strip_bot_mention);
        assert_eq!(settings.agent_max_iterations, 4);
        assert_eq!(settings.agent_model_timeout_secs, 120);
        assert_eq!(settings.calendar_timezone.local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn test_blank_token_is_missing() {
        let err = resolve(
            Config::default(),
            env_of(&[("BOT_SERVER_TOKEN", "   "), ("COMPOSIO_API_KEY", "ck")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19800);
        assert_eq!(parse_utc_offset("-0800").unwrap().local_minus_utc(), -28800);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("Asia/Kolkata").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
        assert!(parse_utc_offset("+5:3").is_err());
    }
}
