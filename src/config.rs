//! Service configuration, read once at startup from the environment.
//!
//! Everything lives in one [`Config`] struct so the binary can log the
//! effective settings in a single place and both front ends share the same
//! working directory instead of growing their own path logic.
//!
//! The two credentials are hard requirements: a missing `TOGETHERAI_API_KEY`
//! or `TELEGRAM_BOT_TOKEN` is a fatal startup error, not something to retry.

use crate::error::ConfigError;
use std::path::PathBuf;

/// Runtime configuration for the snapmd service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Together AI API key used by the recognition client.
    /// Env: `TOGETHERAI_API_KEY` (required).
    pub recognition_api_key: String,

    /// Telegram bot token used by the chat connector.
    /// Env: `TELEGRAM_BOT_TOKEN` (required).
    pub bot_token: String,

    /// Base URL of the recognition chat-completions endpoint.
    /// Env: `SNAPMD_RECOGNITION_BASE_URL`. Default: Together AI.
    pub recognition_base_url: String,

    /// Vision model identifier sent with each recognition request.
    /// Env: `SNAPMD_RECOGNITION_MODEL`.
    pub recognition_model: String,

    /// Base URL of the Telegram Bot API.
    /// Env: `SNAPMD_TELEGRAM_BASE_URL`. Override for local bot-API servers.
    pub telegram_base_url: String,

    /// Working directory for uploads, downloaded attachments and page
    /// scratch space. Created on demand. Both front ends share it.
    /// Env: `SNAPMD_WORK_DIR`. Default: `<system temp>/snapmd`.
    pub work_dir: PathBuf,

    /// HTTP listener port. Env: `PORT`. Default: 6000.
    pub port: u16,

    /// HTTP bind address. Env: `SNAPMD_BIND`. Default: `0.0.0.0`.
    pub bind: String,
}

/// Default recognition endpoint (Together AI OpenAI-compatible API).
pub const DEFAULT_RECOGNITION_BASE_URL: &str = "https://api.together.xyz/v1";

/// Default vision model. Large enough to read dense scans reliably.
pub const DEFAULT_RECOGNITION_MODEL: &str = "meta-llama/Llama-3.2-90B-Vision-Instruct-Turbo";

/// Default Telegram Bot API base.
pub const DEFAULT_TELEGRAM_BASE_URL: &str = "https://api.telegram.org";

/// Maximum accepted upload size for the HTTP front end (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Split out from [`Config::from_env`] so tests can exercise the
    /// missing-credential paths without mutating process-wide state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            match lookup(name) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(ConfigError::MissingVar { name }),
            }
        };

        let recognition_api_key = required("TOGETHERAI_API_KEY")?;
        let bot_token = required("TELEGRAM_BOT_TOKEN")?;

        let work_dir = lookup("SNAPMD_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("snapmd"));

        let port = lookup("PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(6000);

        Ok(Self {
            recognition_api_key,
            bot_token,
            recognition_base_url: lookup("SNAPMD_RECOGNITION_BASE_URL")
                .unwrap_or_else(|| DEFAULT_RECOGNITION_BASE_URL.to_string()),
            recognition_model: lookup("SNAPMD_RECOGNITION_MODEL")
                .unwrap_or_else(|| DEFAULT_RECOGNITION_MODEL.to_string()),
            telegram_base_url: lookup("SNAPMD_TELEGRAM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_BASE_URL.to_string()),
            work_dir,
            port,
            bind: lookup("SNAPMD_BIND").unwrap_or_else(|| "0.0.0.0".to_string()),
        })
    }

    /// Create the working directory if it does not exist yet.
    pub fn ensure_work_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.work_dir).map_err(|e| ConfigError::WorkDir {
            path: self.work_dir.clone(),
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn missing_recognition_key_is_fatal() {
        let err = Config::from_lookup(vars(&[("TELEGRAM_BOT_TOKEN", "123:abc")])).unwrap_err();
        assert!(err.to_string().contains("TOGETHERAI_API_KEY"));
    }

    #[test]
    fn missing_bot_token_is_fatal() {
        let err = Config::from_lookup(vars(&[("TOGETHERAI_API_KEY", "tk-1")])).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn empty_credential_counts_as_missing() {
        let err = Config::from_lookup(vars(&[
            ("TOGETHERAI_API_KEY", "  "),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                name: "TOGETHERAI_API_KEY"
            }
        ));
    }

    #[test]
    fn defaults_apply_when_only_credentials_set() {
        let cfg = Config::from_lookup(vars(&[
            ("TOGETHERAI_API_KEY", "tk-1"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 6000);
        assert_eq!(cfg.bind, "0.0.0.0");
        assert_eq!(cfg.recognition_base_url, DEFAULT_RECOGNITION_BASE_URL);
        assert_eq!(cfg.telegram_base_url, DEFAULT_TELEGRAM_BASE_URL);
        assert!(cfg.work_dir.ends_with("snapmd"));
    }

    #[test]
    fn port_override_parses() {
        let cfg = Config::from_lookup(vars(&[
            ("TOGETHERAI_API_KEY", "tk-1"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8080);
    }
}
