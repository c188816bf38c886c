//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The account password is read from QUIZPREP_PASSWORD or a password file,
//! never from the TOML, so it cannot leak through a shared config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use api_client::ClientConfig;
use api_client::endpoints::{DEFAULT_BASE_URL, DEFAULT_TIER_GATED, DEFAULT_TIMEOUT_SECS};
use common::Secret;
use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_CONFIG_FILE: &str = "quizprep.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// REST API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_tier_gated")]
    pub tier_gated_paths: Vec<String>,
}

/// Durable session settings
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_tier_gated() -> Vec<String> {
    DEFAULT_TIER_GATED.iter().map(|p| p.to_string()).collect()
}

fn default_session_path() -> PathBuf {
    PathBuf::from("session.json")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            tier_gated_paths: default_tier_gated(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Load `path` if it exists; otherwise use defaults. A path the user
    /// named explicitly must exist.
    pub fn load_or_default(path: &Path, explicit: bool) -> common::Result<Self> {
        if explicit || path.exists() {
            Self::load(path)
        } else {
            Config::default().finish()
        }
    }

    /// Apply env overrides and validate.
    fn finish(mut self) -> common::Result<Self> {
        if let Ok(url) = std::env::var("QUIZPREP_API_URL") {
            self.api.base_url = url;
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api.base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if let Some(bad) = self.api.tier_gated_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(common::Error::Config(format!(
                "api.tier_gated_paths entries must start with '/', got: {bad}"
            )));
        }

        Ok(self)
    }

    /// Resolve config file path from CLI arg or QUIZPREP_CONFIG env var.
    /// The flag reports whether the user named the path.
    pub fn resolve_path(cli_path: Option<&Path>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (p.to_path_buf(), true);
        }
        if let Ok(p) = std::env::var("QUIZPREP_CONFIG") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            tier_gated_paths: self.api.tier_gated_paths.clone(),
            ..ClientConfig::default()
        }
    }
}

/// Resolve the account password.
///
/// Resolution order:
/// 1. QUIZPREP_PASSWORD env var
/// 2. `password_file` contents, trimmed
pub fn resolve_password(password_file: Option<&Path>) -> Result<Secret<String>> {
    if let Ok(password) = std::env::var("QUIZPREP_PASSWORD") {
        return Ok(Secret::new(password));
    }
    let Some(path) = password_file else {
        return Err(Error::PasswordMissing);
    };
    let contents = std::fs::read_to_string(path).map_err(|source| Error::PasswordFile {
        path: path.to_path_buf(),
        source,
    })?;
    let password = contents.trim().to_owned();
    if password.is_empty() {
        return Err(Error::PasswordMissing);
    }
    Ok(Secret::new(password))
}
