/*!
common/src/lib.rs

Shared configuration types and DB helper functions for newsagent.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default/override merging
- The two seed preference profiles used when a namespace has no profile yet
- Helpers to initialize and migrate an SQLite database
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Seed profile for the news source namespace (publications only).
pub const DEFAULT_NEWS_SOURCE_PREFERENCES: &str = "
- TechCrunch
- The Verge
- The Wall Street Journal
- The New Yorker
- The Atlantic
- New York Times
- The Economist
- Associated Press
- Forbes
- Bloomberg
";

/// Seed profile for the content namespace (topics only).
pub const DEFAULT_CONTENT_PREFERENCES: &str = "
- Technology and innovation news
- Business and finance developments
- AI and machine learning advancements
- Startup and venture capital news
- Digital transformation trends
- Economic policy and market analysis
- Media and journalism industry insights
";

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/newsagent.db")
    pub path: String,
}

/// Remote LLM endpoint config (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// LLM top-level config grouping the fallback endpoint and task overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "remote"
    // Fallback: single remote config
    pub remote: Option<RemoteLlmConfig>,
    // Task-specific configs
    pub agent: Option<RemoteLlmConfig>,
    pub memory: Option<RemoteLlmConfig>,
}

/// Tavily web search / crawl API config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TavilyConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Conversation controller settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// First component of every preference namespace
    pub id: Option<String>,
    /// Upper bound on agent -> tools -> agent rounds within one turn
    pub max_tool_rounds: Option<usize>,
}

/// Seed profiles and merge guard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    #[serde(default = "default_news_sources")]
    pub news_sources: String,
    #[serde(default = "default_content")]
    pub content: String,
    /// Skip writes that would replace a non-empty profile with blank text
    #[serde(default)]
    pub reject_empty_replacement: bool,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            news_sources: default_news_sources(),
            content: default_content(),
            reject_empty_replacement: false,
        }
    }
}

fn default_news_sources() -> String {
    DEFAULT_NEWS_SOURCE_PREFERENCES.to_string()
}

fn default_content() -> String {
    DEFAULT_CONTENT_PREFERENCES.to_string()
}

/// Admin / maintenance config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub auto_migrate: Option<bool>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: Option<LlmConfig>,
    pub tavily: Option<TavilyConfig>,
    pub agent: Option<AgentConfig>,
    #[serde(default)]
    pub preferences: PreferencesConfig,
    pub admin: Option<AdminConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Namespace prefix shared by both preference profiles.
    pub fn agent_id(&self) -> &str {
        self.agent
            .as_ref()
            .and_then(|a| a.id.as_deref())
            .unwrap_or("news_feed_agent")
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Run SQL migrations using sqlx's migration macro.
/// Migrations live in the workspace-level `migrations` directory and are embedded at build time.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("../migrations")
        .run(pool)
        .await
        .context("Failed to run sqlx migrations")?;

    Ok(())
}

/// Initialize an SQLite connection pool.
///
/// Creates the parent directory if necessary, ensures the DB file exists and returns a
/// configured `SqlitePool` (WAL journal, max 5 connections).
///
/// Example:
///   let pool = init_db_pool("data/newsagent.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create DB parent directory: {}", parent.display())
        })?;
    }

    // Surface filesystem permission problems here rather than through the SQLite driver.
    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create or open DB file: {}", path))?;

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}
