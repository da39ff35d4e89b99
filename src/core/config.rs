//! Application configuration.
//!
//! Everything is read once at startup into an explicit [`Config`] value
//! that gets passed into the bot dispatcher and the Mini App server.
//! Handlers never reach for process-wide state; if a required variable is
//! missing the process fails here, with context, before serving anything.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Runtime configuration, built from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot API token; also the HMAC key material for init data checks.
    pub bot_token: String,
    /// Path to the SQLite database file.
    pub database_path: String,
    /// Port for the Mini App HTTP API.
    pub webapp_port: u16,
    /// Public URL of the Mini App front-end, shown as the /start button.
    pub mini_app_url: Option<url::Url>,
    /// OpenAI key for the insights endpoint; unset disables analysis.
    pub openai_api_key: Option<String>,
    /// Chat model used for insights.
    pub openai_model: String,
    /// Reject init data older than this. Unset = no staleness check;
    /// the verifier itself never enforces freshness.
    pub init_data_max_age: Option<Duration>,
    /// Log file path for the combined console + file logger.
    pub log_file_path: String,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// # Errors
    /// Fails when `BOT_TOKEN` is missing or empty, or when an optional
    /// variable is present but unparseable. This is deliberately fatal at
    /// startup — an empty token must never surface as per-request 401s.
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
        if bot_token.trim().is_empty() {
            anyhow::bail!("BOT_TOKEN is empty");
        }

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "kopilka.sqlite".to_string());

        let webapp_port = match env::var("WEBAPP_PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid WEBAPP_PORT: {raw}"))?,
            Err(_) => 8080,
        };

        let mini_app_url = match env::var("MINI_APP_URL") {
            Ok(raw) => Some(
                url::Url::parse(&raw).with_context(|| format!("invalid MINI_APP_URL: {raw}"))?,
            ),
            Err(_) => None,
        };

        let openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let openai_model =
            env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let init_data_max_age = match env::var("INIT_DATA_MAX_AGE_SECS") {
            Ok(raw) => {
                let secs: u64 = raw
                    .parse()
                    .with_context(|| format!("invalid INIT_DATA_MAX_AGE_SECS: {raw}"))?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let log_file_path =
            env::var("LOG_FILE_PATH").unwrap_or_else(|_| "kopilka.log".to_string());

        Ok(Self {
            bot_token,
            database_path,
            webapp_port,
            mini_app_url,
            openai_api_key,
            openai_model,
            init_data_max_age,
            log_file_path,
        })
    }
}

/// Network configuration
pub mod network {
    use std::time::Duration;

    /// Request timeout for outgoing HTTP requests (OpenAI)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_timeout_matches_constant() {
        assert_eq!(network::timeout(), Duration::from_secs(60));
    }
}
