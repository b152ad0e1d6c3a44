// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "NEWS_SENTIMENT_CONFIG";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

pub const DEFAULT_DATABASE_URL: &str = "sqlite:sentiment.db?mode=rwc";
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}
fn default_news_count() -> u32 {
    20
}
fn default_yahoo_base_url() -> String {
    DEFAULT_YAHOO_BASE_URL.to_string()
}
fn default_store_max_retries() -> u32 {
    3
}
fn default_store_retry_base_ms() -> u64 {
    50
}
fn default_store_acquire_timeout_secs() -> u64 {
    5
}
fn default_annotator_config_path() -> PathBuf {
    PathBuf::from("config/annotator.json")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Headlines requested per ingestion run.
    #[serde(default = "default_news_count")]
    pub news_count: u32,
    #[serde(default = "default_yahoo_base_url")]
    pub yahoo_base_url: String,
    #[serde(default = "default_store_max_retries")]
    pub store_max_retries: u32,
    #[serde(default = "default_store_retry_base_ms")]
    pub store_retry_base_ms: u64,
    #[serde(default = "default_store_acquire_timeout_secs")]
    pub store_acquire_timeout_secs: u64,
    #[serde(default = "default_annotator_config_path")]
    pub annotator_config_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            news_count: default_news_count(),
            yahoo_base_url: default_yahoo_base_url(),
            store_max_retries: default_store_max_retries(),
            store_retry_base_ms: default_store_retry_base_ms(),
            store_acquire_timeout_secs: default_store_acquire_timeout_secs(),
            annotator_config_path: default_annotator_config_path(),
        }
    }
}

impl AppConfig {
    pub fn store_options(&self) -> crate::store::StoreOptions {
        crate::store::StoreOptions {
            max_retries: self.store_max_retries,
            retry_base: Duration::from_millis(self.store_retry_base_ms),
            acquire_timeout: Duration::from_secs(self.store_acquire_timeout_secs.max(1)),
            ..crate::store::StoreOptions::default()
        }
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load config using env var + fallbacks, then apply env overrides:
/// 1) $NEWS_SENTIMENT_CONFIG
/// 2) config/app.toml
/// 3) config/app.json
/// 4) defaults
///
/// `DATABASE_URL` always wins over the file value.
pub fn load_default() -> Result<AppConfig> {
    let mut cfg = load_file_default()?;
    if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
        if !url.trim().is_empty() {
            cfg.database_url = url.trim().to_string();
        }
    }
    Ok(cfg)
}

fn load_file_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/app.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/app.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    Ok(AppConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        return serde_json::from_str(s).context("parsing json config");
    }
    toml::from_str(s).context("parsing toml config")
}
