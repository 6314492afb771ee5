//! Persisted configuration, following `cosmos::config::Config`'s shape:
//! a `Default`-able struct, a `load()` that never fails, and a fallible
//! `save()`. Credentials are never part of this struct - they come from
//! the environment only (see [`Config::api_key`]).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_ENV_VAR: &str = "TSUGIX_CONFIG";
const LOCAL_CONFIG_FILE: &str = ".tsugix.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Default for Provider {
    fn default() -> Self {
        Provider::OpenAi
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Provider,
    pub model: String,
    pub endpoint: Option<String>,
    pub max_tokens: u32,
    pub auto_backup: bool,
    pub auto_apply: bool,
    pub auto_rerun: bool,
    pub timeout_seconds: u64,
    pub retry_count: u32,
    pub custom_prompt_template: Option<String>,
    pub temperature: f32,
    pub root_directory: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: "gpt-4o-mini".to_string(),
            endpoint: None,
            max_tokens: 2048,
            auto_backup: true,
            auto_apply: false,
            auto_rerun: false,
            timeout_seconds: 60,
            retry_count: 3,
            custom_prompt_template: None,
            temperature: 0.2,
            root_directory: None,
        }
    }
}

impl Config {
    /// Resolves the config file path: `TSUGIX_CONFIG` env var, then
    /// `./.tsugix.json`, then `~/.tsugix.json`. Mirrors
    /// `cosmos::config::Config::config_path`'s env-override-then-default
    /// chain.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return PathBuf::from(path);
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return local;
        }
        dirs::home_dir()
            .map(|h| h.join(LOCAL_CONFIG_FILE))
            .unwrap_or(local)
    }

    /// Never fails: any I/O or parse error falls back to defaults, the
    /// same way `cosmos::config::Config::load` treats a missing or
    /// corrupt config file as "nothing configured yet" rather than an
    /// error to propagate.
    pub fn load() -> Self {
        let path = Self::config_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }

    /// Reads the provider-appropriate API key from the environment.
    /// Credentials are never stored in the config file.
    pub fn api_key(&self) -> Option<String> {
        let var = match self.provider {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        };
        std::env::var(var).ok().filter(|k| !k.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
