//! Runtime configuration from environment variables
//!
//! Binaries call `dotenv::dotenv()` first, so a local `.env` file works too.

use crate::error::AssistantError;
use crate::gemini::DEFAULT_GEMINI_URL;
use crate::market::coingecko::DEFAULT_COINGECKO_URL;
use crate::models::PresentationMode;
use crate::retry::RetryPolicy;
use crate::Result;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub gemini_api_key: String,
    pub gemini_url: String,
    pub coingecko_url: String,
    pub oracle_timeout: Duration,
    pub retry: RetryPolicy,
    pub portfolio_dir: PathBuf,
    pub database_url: Option<String>,
    pub port: u16,
    pub presentation: PresentationMode,
    pub load_catalog: bool,
    pub session_idle_timeout: chrono::Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_url: DEFAULT_GEMINI_URL.to_string(),
            coingecko_url: DEFAULT_COINGECKO_URL.to_string(),
            oracle_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            portfolio_dir: PathBuf::from("."),
            database_url: None,
            port: 8080,
            presentation: PresentationMode::Detailed,
            load_catalog: true,
            session_idle_timeout: chrono::Duration::minutes(30),
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank keys take the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let timeout_secs: u64 = parse_or(get("ORACLE_TIMEOUT_SECS"), "ORACLE_TIMEOUT_SECS", 10)?;
        let max_retries: u32 = parse_or(get("ORACLE_MAX_RETRIES"), "ORACLE_MAX_RETRIES", defaults.retry.max_retries)?;
        let port: u16 = parse_or(get("PORT").or_else(|| get("API_PORT")), "PORT", defaults.port)?;
        let idle_minutes: i64 = parse_or(get("SESSION_IDLE_MINUTES"), "SESSION_IDLE_MINUTES", 30)?;

        if timeout_secs == 0 {
            return Err(AssistantError::Config("ORACLE_TIMEOUT_SECS must be positive".to_string()));
        }
        if idle_minutes <= 0 {
            return Err(AssistantError::Config("SESSION_IDLE_MINUTES must be positive".to_string()));
        }

        let presentation = match get("PRESENTATION_MODE").as_deref() {
            None => defaults.presentation,
            Some(raw) => match raw.to_lowercase().as_str() {
                "detailed" => PresentationMode::Detailed,
                "spoken" => PresentationMode::Spoken,
                other => {
                    return Err(AssistantError::Config(format!(
                        "PRESENTATION_MODE must be 'detailed' or 'spoken', got '{}'",
                        other
                    )))
                }
            },
        };

        let load_catalog = match get("LOAD_COIN_CATALOG").as_deref() {
            None => defaults.load_catalog,
            Some(raw) => parse_flag(raw, "LOAD_COIN_CATALOG")?,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY").unwrap_or_default(),
            gemini_url: get("GEMINI_MODEL_URL").unwrap_or(defaults.gemini_url),
            coingecko_url: get("COINGECKO_BASE_URL").unwrap_or(defaults.coingecko_url),
            oracle_timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy {
                max_retries,
                ..defaults.retry
            },
            portfolio_dir: get("PORTFOLIO_DIR").map(PathBuf::from).unwrap_or(defaults.portfolio_dir),
            database_url: get("POSTGRES_URL").or_else(|| get("DATABASE_URL")),
            port,
            presentation,
            load_catalog,
            session_idle_timeout: chrono::Duration::minutes(idle_minutes),
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| AssistantError::Config(format!("{} has invalid value '{}'", key, raw))),
    }
}

fn parse_flag(raw: &str, key: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AssistantError::Config(format!("{} has invalid value '{}'", key, raw))),
    }
}
