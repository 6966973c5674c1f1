//! Bot configuration from the environment

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_COMMERCE_API_URL: &str = "https://api.moltin.com";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub commerce_api_url: String,
    pub session_db_path: PathBuf,
    pub http_timeout: Duration,
    pub poll_timeout: Duration,
    /// Sessions idle longer than this restart from the beginning
    pub session_ttl: Option<Duration>,
    pub token_refresh_margin: Duration,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let seconds = |name: &'static str| -> Result<Option<Duration>, ConfigError> {
            get(name)
                .map(|value| {
                    value
                        .trim()
                        .parse::<u64>()
                        .map(Duration::from_secs)
                        .map_err(|_| ConfigError::Invalid { name, value })
                })
                .transpose()
        };

        let session_db_path = get("SESSION_DB_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".storefront-bot").join("sessions.db")
            },
            PathBuf::from,
        );

        Ok(Self {
            telegram_token: required("TELEGRAM_TOKEN")?,
            client_id: required("CLIENT_ID")?,
            client_secret: required("CLIENT_SECRET")?,
            commerce_api_url: get("COMMERCE_API_URL")
                .unwrap_or_else(|| DEFAULT_COMMERCE_API_URL.to_string()),
            session_db_path,
            http_timeout: seconds("HTTP_TIMEOUT_SECS")?.unwrap_or(Duration::from_secs(15)),
            poll_timeout: seconds("POLL_TIMEOUT_SECS")?.unwrap_or(Duration::from_secs(30)),
            session_ttl: seconds("SESSION_TTL_SECS")?.filter(|ttl| !ttl.is_zero()),
            token_refresh_margin: seconds("TOKEN_REFRESH_MARGIN_SECS")?
                .unwrap_or(Duration::from_secs(30)),
        })
    }
}
