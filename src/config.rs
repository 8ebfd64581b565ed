use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen3:8b";

#[derive(Debug, Clone)]
pub struct Config {
    pub ollama_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub recursion_limit: usize,
    pub kedro_bin: String,
    pub workdir: PathBuf,
    pub history_db: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, used by `from_env` and tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ollama_base_url = lookup("OLLAMA_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        let model = lookup("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature: f32 = parse_var(&lookup, "OLLAMA_TEMPERATURE", 0.0)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(Error::Config(format!(
                "OLLAMA_TEMPERATURE must be between 0.0 and 2.0, got {}",
                temperature
            )));
        }

        let request_timeout_secs = parse_var(&lookup, "OLLAMA_TIMEOUT_SECS", 120)?;

        let recursion_limit: usize = parse_var(&lookup, "AGENT_RECURSION_LIMIT", 25)?;
        if recursion_limit == 0 {
            return Err(Error::Config(
                "AGENT_RECURSION_LIMIT must be at least 1".to_string(),
            ));
        }

        let kedro_bin = lookup("KEDRO_BIN").unwrap_or_else(|| "kedro".to_string());

        let workdir = match lookup("KEDRO_WORKDIR") {
            Some(dir) => PathBuf::from(dir),
            None => env::current_dir()?,
        };

        let history_db = lookup("HISTORY_DB").unwrap_or_else(|| "kedro-agent.db".to_string());

        Ok(Self {
            ollama_base_url,
            model,
            temperature,
            request_timeout_secs,
            recursion_limit,
            kedro_bin,
            workdir,
            history_db,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", key, raw))),
        None => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub temperature: f32,
    pub recursion_limit: usize,
}

impl From<&Config> for AgentConfig {
    fn from(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            recursion_limit: config.recursion_limit,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            recursion_limit: 25,
        }
    }
}
