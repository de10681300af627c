//! Backend connection settings
//!
//! Loaded from `~/.daily-meals/config.yaml`, then overridden by environment
//! variables, then by command-line flags in `main`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_QUERY_LIMIT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SERVER_URL,
};

pub const SERVER_URL_ENV: &str = "DAILY_MEALS_SERVER_URL";
pub const APP_ID_ENV: &str = "DAILY_MEALS_APP_ID";
pub const JS_KEY_ENV: &str = "DAILY_MEALS_JS_KEY";
pub const REST_KEY_ENV: &str = "DAILY_MEALS_REST_KEY";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub application_id: Option<String>,
    pub javascript_key: Option<String>,
    pub rest_api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub query_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: String::from(DEFAULT_SERVER_URL),
            application_id: None,
            javascript_key: None,
            rest_api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl Config {
    /// `~/.daily-meals`, or `./.daily-meals` without a home directory
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join(CONFIG_FILE_NAME)
    }

    /// Read the config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(SERVER_URL_ENV) {
            self.server_url = url;
        }
        if let Some(id) = get(APP_ID_ENV) {
            self.application_id = Some(id);
        }
        if let Some(key) = get(JS_KEY_ENV) {
            self.javascript_key = Some(key);
        }
        if let Some(key) = get(REST_KEY_ENV) {
            self.rest_api_key = Some(key);
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Application id, required to talk to a real server
    pub fn require_application_id(&self) -> Result<&str> {
        self.application_id.as_deref().with_context(|| {
            format!(
                "no application id configured; set application_id in {} or {}",
                Self::default_path().display(),
                APP_ID_ENV
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "application_id: abc\nquery_limit: 50\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.application_id.as_deref(), Some("abc"));
        assert_eq!(config.query_limit, 50);
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let vars: HashMap<&str, &str> = [
            (SERVER_URL_ENV, "http://localhost:1337/parse"),
            (APP_ID_ENV, "from-env"),
            (REST_KEY_ENV, ""),
        ]
        .into_iter()
        .collect();

        let config = Config {
            application_id: Some("from-file".into()),
            rest_api_key: Some("file-key".into()),
            ..Config::default()
        }
        .with_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server_url, "http://localhost:1337/parse");
        assert_eq!(config.application_id.as_deref(), Some("from-env"));
        assert_eq!(config.rest_api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn test_application_id_is_required() {
        assert!(Config::default().require_application_id().is_err());
    }
}
