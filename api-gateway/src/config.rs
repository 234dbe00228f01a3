//! Gateway configuration loading and parsing

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "/etc/goalplan/config.toml";

/// Root configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct GoalplanConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// File the configuration was read from, `None` when running on defaults
    #[serde(skip)]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Where plans come from: an OpenAI-style completions endpoint
#[derive(Debug, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { "0.0.0.0:5000".into() }
fn default_cors_origins() -> Vec<String> { vec!["http://localhost:3000".into()] }
fn default_base_url() -> String { "http://ollama:11434".into() }
fn default_model() -> String { goalplan_planner::completion::DEFAULT_MODEL.into() }
fn default_temperature() -> f32 { goalplan_planner::completion::DEFAULT_TEMPERATURE }
fn default_max_tokens() -> u32 { goalplan_planner::completion::DEFAULT_MAX_TOKENS }
fn default_timeout_seconds() -> u64 { goalplan_planner::completion::DEFAULT_TIMEOUT.as_secs() }
fn default_database_path() -> String { "/var/lib/goalplan/goalplan.db".into() }
fn default_log_level() -> String { "info".into() }

impl GoalplanConfig {
    /// Parse a TOML document; missing sections and keys fall back to defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: GoalplanConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `OLLAMA_API`, `DATABASE_PATH`, `LISTEN_ADDR`, `CORS_ORIGINS` and
    /// `LOG_LEVEL` on top of the file values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("OLLAMA_API") {
            self.completion.base_url = url.trim().to_string();
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(addr) = lookup("LISTEN_ADDR") {
            self.server.listen_addr = addr.trim().to_string();
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.completion.timeout_seconds == 0 {
            bail!("completion.timeout_seconds must be greater than zero");
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            bail!(
                "completion.temperature must be within 0.0..=2.0, got {}",
                self.completion.temperature
            );
        }
        Ok(())
    }
}

/// Load configuration from `GOALPLAN_CONFIG` (or the default path) and then
/// apply environment overrides.
pub fn load_config() -> Result<GoalplanConfig> {
    let config_path = std::env::var("GOALPLAN_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if Path::new(&config_path).exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {config_path}"))?;
        let mut config = GoalplanConfig::from_toml(&content)
            .with_context(|| format!("Failed to parse config from {config_path}"))?;
        config.source = Some(config_path);
        config
    } else {
        GoalplanConfig::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}
