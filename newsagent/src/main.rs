/*
newsagent - command-line entrypoint.
Runs one aggregation turn against the configured LLM and Tavily endpoints, then asks the
user for feedback and folds it into the stored preference profiles.
*/

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsagent::agent::{read_preferences, AgentSettings, FeedbackResponse, NewsAgent};
use newsagent::llm::remote::RemoteLlmProvider;
use newsagent::llm::{ChatMessage, LlmProvider};
use newsagent::memory::Namespace;
use newsagent::prompts::FEEDBACK_QUESTION;
use newsagent::storage::SqlitePreferenceStore;
use newsagent::tools::tavily::DEFAULT_TAVILY_URL;
use newsagent::tools::{TavilyClient, TavilyTools};

#[derive(Parser, Debug)]
#[command(name = "newsagent", about = "Preference-aware news aggregator")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print both preference profiles and exit
    #[arg(long)]
    show_preferences: bool,

    /// Do not ask for feedback after the answer
    #[arg(long)]
    no_feedback: bool,

    /// Request for the agent, e.g. "daily debrief" or "fun fact from The Verge"
    query: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config.clone() {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let db_pool = match common::init_db_pool(&config.database.path).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %config.database.path, "failed to initialize database pool");
            return Err(e);
        }
    };

    if config.admin.as_ref().and_then(|a| a.auto_migrate).unwrap_or(true) {
        common::run_migrations(&db_pool).await?;
        info!("DB migrations completed");
    }

    let store = Arc::new(SqlitePreferenceStore::new(db_pool));
    let settings = AgentSettings::from_config(&config);

    if args.show_preferences {
        let prefs = read_preferences(store.as_ref(), &settings).await?;
        let agent_id = &settings.agent_id;
        println!(
            "## News sources ({})\n{}\n",
            Namespace::news_sources(agent_id.clone()),
            prefs.news_sources.trim()
        );
        println!("## Content ({})\n{}", Namespace::content(agent_id.clone()), prefs.content.trim());
        return Ok(());
    }

    let Some(query) = args.query else {
        anyhow::bail!("nothing to do: pass a QUERY or --show-preferences");
    };

    let llm_config = config
        .llm
        .as_ref()
        .context("missing [llm] section in configuration")?;
    let agent_llm: Arc<dyn LlmProvider> =
        Arc::from(create_llm_provider(llm_config, LlmMode::Agent)?);
    let memory_llm: Arc<dyn LlmProvider> =
        Arc::from(create_llm_provider(llm_config, LlmMode::Memory)?);
    let tools = Arc::new(TavilyTools::new(create_tavily_client(&config)?));

    let agent = NewsAgent::new(agent_llm, store, tools, settings).with_memory_llm(memory_llm);

    let mut messages = vec![ChatMessage::user(query)];
    let answer = agent.run_turn(&mut messages).await?;
    println!("{}", answer);

    if args.no_feedback {
        return Ok(());
    }

    let feedback = read_feedback().await?;
    agent.apply_feedback(&mut messages, feedback).await?;
    info!("turn complete");
    Ok(())
}

/// Ask the feedback question on stdout; an empty line means ignore.
async fn read_feedback() -> Result<FeedbackResponse> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("\n{}\n> ", FEEDBACK_QUESTION).as_bytes())
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read feedback from stdin")?;

    let line = line.trim();
    Ok(if line.is_empty() {
        FeedbackResponse::Ignore
    } else {
        FeedbackResponse::Response(line.to_string())
    })
}

/// LLM mode for selecting appropriate configuration
#[derive(Debug, Clone, Copy)]
enum LlmMode {
    Agent,  // Tool-calling aggregation turns
    Memory, // Deterministic structured profile merges
}

/// Create an LLM provider based on configuration and mode
fn create_llm_provider(
    llm_config: &common::LlmConfig,
    mode: LlmMode,
) -> Result<Box<dyn LlmProvider>> {
    let adapter = llm_config.adapter.as_deref().unwrap_or("remote");
    match adapter {
        "remote" => {
            let endpoint_config = match mode {
                LlmMode::Agent => llm_config.agent.as_ref().or(llm_config.remote.as_ref()),
                LlmMode::Memory => llm_config.memory.as_ref().or(llm_config.remote.as_ref()),
            };

            let Some(remote_config) = endpoint_config else {
                anyhow::bail!("Remote adapter selected but no LLM config found for mode {:?}", mode)
            };

            let api_key_env = remote_config
                .api_key_env
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Missing api_key_env in remote config"))?;
            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

            let model = remote_config.model.clone().unwrap_or_else(|| "gpt-4.1".to_string());
            let api_url = remote_config
                .api_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());
            let timeout_secs = remote_config.timeout_seconds.unwrap_or(120);
            let max_tokens = remote_config.max_tokens.unwrap_or(4000);

            info!(?mode, model = %model, "LLM provider initialized");
            let provider = RemoteLlmProvider::new(api_url, api_key, model)
                .with_defaults(timeout_secs, max_tokens, 0.0);
            Ok(Box::new(provider))
        }
        _ => anyhow::bail!("Unknown LLM adapter type: {}", adapter),
    }
}

fn create_tavily_client(config: &Config) -> Result<TavilyClient> {
    let tavily = config.tavily.clone().unwrap_or_default();
    let api_key_env = tavily.api_key_env.as_deref().unwrap_or("TAVILY_API_KEY");
    let api_key = std::env::var(api_key_env)
        .with_context(|| format!("Tavily API key env var '{}' not set", api_key_env))?;
    let api_url = tavily.api_url.as_deref().unwrap_or(DEFAULT_TAVILY_URL);

    Ok(TavilyClient::new(api_url, api_key).with_timeout(tavily.timeout_seconds.unwrap_or(60)))
}
