use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";
const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_IDENTITY_PATH: &str = ".poll_identity.json";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub ws_url: String,
    pub reconnect_delay: Duration,
    pub http_timeout: Duration,
    pub identity_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            identity_path: PathBuf::from(DEFAULT_IDENTITY_PATH),
        }
    }
}

impl Settings {
    /// Reads settings from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let reconnect_delay = match lookup("POLL_RECONNECT_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_u64("POLL_RECONNECT_DELAY_MS", raw)?),
            None => defaults.reconnect_delay,
        };
        let http_timeout = match lookup("POLL_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_u64("POLL_HTTP_TIMEOUT_SECS", raw)?),
            None => defaults.http_timeout,
        };

        Ok(Settings {
            api_url: lookup("POLL_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            ws_url: lookup("POLL_WS_URL").unwrap_or(defaults.ws_url),
            reconnect_delay,
            http_timeout,
            identity_path: lookup("POLL_IDENTITY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.identity_path),
        })
    }
}

fn parse_u64(name: &'static str, raw: String) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value: raw })
}
