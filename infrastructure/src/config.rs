use domain::{ChatError, ChatResult};
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INFERENCE_BIN: &str = "ollama";
pub const DEFAULT_MODEL: &str = "gemma3:4b";
pub const DEFAULT_HISTORY_DIR: &str = "chat_history";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

#[derive(Debug, Clone)]
pub struct Config {
    pub inference_bin: String,
    pub model: String,
    pub history_dir: PathBuf,
    /// `None` waits for the inference process indefinitely.
    pub timeout: Option<Duration>,
    /// Extra attempts after an inference process fails to run.
    pub retries: u32,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inference_bin: DEFAULT_INFERENCE_BIN.to_string(),
            model: DEFAULT_MODEL.to_string(),
            history_dir: PathBuf::from(DEFAULT_HISTORY_DIR),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            retries: 0,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Read `.env` if present, then the `CHAT_RELAY_*` environment variables.
    pub fn load() -> ChatResult<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ChatResult<Self> {
        let defaults = Self::default();

        let timeout = match lookup("CHAT_RELAY_TIMEOUT_SECS") {
            Some(raw) => match parse_number::<u64>("CHAT_RELAY_TIMEOUT_SECS", &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => defaults.timeout,
        };

        let retries = match lookup("CHAT_RELAY_RETRIES") {
            Some(raw) => parse_number("CHAT_RELAY_RETRIES", &raw)?,
            None => defaults.retries,
        };

        let bind_addr = match lookup("CHAT_RELAY_BIND") {
            Some(raw) => parse_bind(&raw)?,
            None => defaults.bind_addr,
        };

        Ok(Self {
            inference_bin: lookup("CHAT_RELAY_INFERENCE_BIN").unwrap_or(defaults.inference_bin),
            model: lookup("CHAT_RELAY_MODEL").unwrap_or(defaults.model),
            history_dir: lookup("CHAT_RELAY_HISTORY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_dir),
            timeout,
            retries,
            bind_addr,
            log_level: lookup("CHAT_RELAY_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: lookup("CHAT_RELAY_LOG_FORMAT").unwrap_or(defaults.log_format),
        })
    }
}

pub fn parse_bind(raw: &str) -> ChatResult<SocketAddr> {
    raw.trim()
        .parse()
        .map_err(|e| ChatError::Config(format!("invalid bind address {raw:?}: {e}")))
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> ChatResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ChatError::Config(format!("{key}={raw:?}: {e}")))
}
