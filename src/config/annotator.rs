// src/config/annotator.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_FINBERT_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/ProsusAI/finbert";

fn default_provider() -> String {
    "lexicon".to_string()
}
fn default_endpoint() -> String {
    DEFAULT_FINBERT_ENDPOINT.to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatorConfig {
    /// "lexicon" | "finbert" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// "ENV" means: read from HF_API_TOKEN
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_endpoint(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AnnotatorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AnnotatorConfig = serde_json::from_str(&data)?;

        cfg.provider = cfg.provider.trim().to_lowercase();

        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = env::var("HF_API_TOKEN")
                .map_err(|_| anyhow::anyhow!("Missing HF_API_TOKEN env var"))?;
        }

        match cfg.provider.as_str() {
            "lexicon" | "finbert" => {}
            other => anyhow::bail!("Unsupported annotator provider in config: {other}"),
        }
        if cfg.timeout_secs == 0 {
            cfg.timeout_secs = default_timeout_secs();
        }

        Ok(cfg)
    }

    /// Missing file means defaults; a present but broken file is an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }
}
