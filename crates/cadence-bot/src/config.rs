//! Bot configuration: a YAML file with serde defaults, plus environment
//! overrides for the secrets so they never have to live on disk.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

/// Chat platform (Feishu open API) access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
}

/// Feedback-generation endpoint (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_attempts")]
    pub attempts: u32,
    #[serde(default = "default_llm_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_database_path() -> String {
    "cadence.db".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_dedup_capacity() -> usize {
    cadence_core::dedup::DEFAULT_CAPACITY
}

fn default_chat_api_base() -> String {
    "https://open.feishu.cn".to_string()
}

fn default_llm_endpoint() -> String {
    "https://aiproxy.gzg.sealos.run".to_string()
}

fn default_llm_model() -> String {
    "deepseek-chat".to_string()
}

fn default_llm_attempts() -> u32 {
    3
}

fn default_llm_retry_delay_ms() -> u64 {
    500
}

fn default_llm_timeout_secs() -> u64 {
    30
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: default_chat_api_base(),
            app_id: String::new(),
            app_secret: String::new(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            attempts: default_llm_attempts(),
            retry_delay_ms: default_llm_retry_delay_ms(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            listen_port: default_listen_port(),
            dedup_capacity: default_dedup_capacity(),
            chat: ChatConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path` if it exists, otherwise start from defaults; then
    /// apply environment overrides for the secrets.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("parsing config {}", p.display()))?
            }
            Some(p) => anyhow::bail!("config file not found: {}", p.display()),
            None => Config::default(),
        };

        if let Ok(v) = std::env::var("FEISHU_APP_ID") {
            config.chat.app_id = v;
        }
        if let Ok(v) = std::env::var("FEISHU_APP_SECRET") {
            config.chat.app_secret = v;
        }
        if let Ok(v) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = v;
        }
        Ok(config)
    }
}
