//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! `API_BASE_URL` overrides `[api].base_url` so the same file can point at a
//! local or a deployed API.

use auth_refresh::Settings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "hostel-api.toml";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// API endpoint settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_renewal_path")]
    pub renewal_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_timeout_ms")]
    pub renewal_timeout_ms: u64,
}

/// Where the session survives between invocations
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    /// JSON session file; without it the session lives only for one run
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_timeout_ms() -> u64 {
    session_store::DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}

fn default_renewal_path() -> String {
    session_store::RENEWAL_PATH.to_string()
}

fn default_login_path() -> String {
    session_store::LOGIN_PATH.to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(base_url) = std::env::var("API_BASE_URL") {
            if base_url.trim().is_empty() {
                return Err(common::Error::Env {
                    name: "API_BASE_URL".into(),
                    reason: "empty".into(),
                });
            }
            config.api.base_url = base_url.trim().to_owned();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_ms == 0 || self.api.renewal_timeout_ms == 0 {
            return Err(common::Error::Config(
                "timeout_ms and renewal_timeout_ms must be greater than 0".into(),
            ));
        }

        for (name, path) in [
            ("renewal_path", &self.api.renewal_path),
            ("login_path", &self.api.login_path),
        ] {
            if !path.starts_with('/') {
                return Err(common::Error::Config(format!(
                    "{name} must start with '/', got: {path}"
                )));
            }
        }

        Ok(())
    }

    /// Config file path: `--config` / `CONFIG_PATH` (resolved by the CLI),
    /// otherwise `hostel-api.toml` in the working directory.
    pub fn resolve_path(cli_path: Option<PathBuf>) -> PathBuf {
        cli_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn settings(&self) -> Settings {
        let mut settings = Settings::new(self.api.base_url.clone());
        settings.request_timeout = Duration::from_millis(self.api.timeout_ms);
        settings.renewal_timeout = Duration::from_millis(self.api.renewal_timeout_ms);
        settings.renewal_path = self.api.renewal_path.clone();
        settings.login_path = self.api.login_path.clone();
        settings
    }
}
