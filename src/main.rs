mod bot_adapter;
mod config;
mod error;
mod llm;
mod task_runner;
mod toolset;
mod util;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lazy_static::lazy_static;
use log::{error, info, warn};
use log_util::log_util::LogUtil;

use bot_adapter::adapter::BotAdapter;
use bot_adapter::event::RelayHandler;
use config::load_config;
use llm::agent::calendar::{calendar_agent, CalendarDefaults};
use llm::{LLMBase, LLMAPI};
use task_runner::CalendarTaskRunner;
use toolset::{get_tools, ComposioToolSet, ToolSetProvider, GOOGLE_CALENDAR_APP};

lazy_static! {
    static ref BASE_LOG: LogUtil = LogUtil::new_with_path("calendar_relay_bot", "logs");
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// QQ account the bot is logged in as
    #[arg(short = 'l', long = "login-qq")]
    qq_id: Option<String>,

    #[arg(short = 'c', long = "config", default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() {
    if let Err(e) = LogUtil::init_with_logger(&BASE_LOG) {
        eprintln!("Failed to initialize logger: {}", e);
        std::process::exit(1);
    }

    let args = Args::parse();
    info!("calendar_relay_bot starting...");

    let settings = match load_config(&args.config) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let llm: Arc<dyn LLMBase> = Arc::new(LLMAPI::new(
        settings.agent_model_name.clone(),
        settings.agent_model_api.clone(),
        settings.agent_model_api_key.clone(),
        Duration::from_secs(settings.agent_model_timeout_secs),
    ));
    info!("Agent model: {} at {}", llm.get_model_name(), util::mask_url_credentials(&settings.agent_model_api));

    let provider: Arc<dyn ToolSetProvider> = Arc::new(ComposioToolSet::new(
        settings.composio_base_url.clone(),
        settings.composio_api_key.clone(),
        settings.composio_entity_id.clone(),
        settings.composio_connected_account_id.clone(),
    ));

    let tools = match tokio::task::spawn_blocking(move || get_tools(provider, GOOGLE_CALENDAR_APP)).await {
        Ok(Ok(tools)) => tools,
        Ok(Err(e)) => {
            error!("Failed to load {} actions: {}", GOOGLE_CALENDAR_APP, e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Action loading task did not finish: {}", e);
            std::process::exit(1);
        }
    };
    if tools.is_empty() {
        warn!("No {} actions are available, the agent can only answer in text", GOOGLE_CALENDAR_APP);
    }
    info!("Loaded {} {} actions", tools.len(), GOOGLE_CALENDAR_APP);

    let defaults = CalendarDefaults {
        timezone_label: &settings.calendar_timezone_label,
        calendar_id: &settings.calendar_id,
    };
    let agent = Arc::new(calendar_agent(
        llm,
        tools,
        &defaults,
        settings.calendar_timezone,
        settings.agent_verbose,
        settings.agent_memory,
        settings.agent_max_iterations,
    ));

    let runner = Arc::new(CalendarTaskRunner::new(agent));
    let relay = Arc::new(RelayHandler::new(
        runner,
        settings.bot_user_ids.clone(),
        settings.strip_bot_mention,
    ));

    let qq_id = args.qq_id.or_else(|| settings.bot_qq_id.clone());
    match qq_id {
        Some(ref qq) => info!("登录的QQ号: {}", qq),
        None => info!("No bot account configured, waiting for the server to report it"),
    }

    let adapter = BotAdapter::new(settings.bot_server_url, settings.bot_server_token, qq_id, relay);
    info!("Bot adapter initialized, connecting to server...");
    if let Err(e) = BotAdapter::start(adapter.into_shared()).await {
        error!("Bot adapter error: {}", e);
    }
}
