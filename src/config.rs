//! Configuration Management
//!
//! Persistent CLI defaults, provider credentials, and the location of the
//! engine state file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Public Sentry API endpoint
pub const DEFAULT_API_URL: &str = "https://sentry.io/api/0/";

/// Environment variable holding the auth token
pub const TOKEN_ENV: &str = "SENTRY_TOKEN";

/// Environment variable overriding the API URL
pub const API_URL_ENV: &str = "SENTRY_API_URL";

/// Engine configuration variable carrying the auth token
pub const TOKEN_VARIABLE: &str = "sentry:config:token";

/// Engine configuration variable carrying the API URL
pub const API_URL_VARIABLE: &str = "sentry:config:apiURL";

const APP_DIR: &str = "sentry-iac";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Sentry API base URL
    #[serde(default)]
    pub api_url: Option<String>,
    /// Default organization slug
    #[serde(default)]
    pub organization: Option<String>,
    /// Default team slug
    #[serde(default)]
    pub team: Option<String>,
    /// Stack name used in resource URNs
    #[serde(default)]
    pub stack: Option<String>,
    /// Project name used in resource URNs
    #[serde(default)]
    pub project: Option<String>,
}

impl Config {
    /// Directory holding config, state and logs
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective API URL (CLI > environment > config > default)
    pub fn effective_api_url(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| std::env::var(API_URL_ENV).ok().filter(|v| !v.is_empty()))
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Get effective stack (CLI > config > "dev")
    pub fn effective_stack(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.stack.clone())
            .unwrap_or_else(|| "dev".to_string())
    }

    /// Get effective project (config > "sentry-iac")
    pub fn effective_project(&self) -> String {
        self.project
            .clone()
            .unwrap_or_else(|| APP_DIR.to_string())
    }

    /// Path of the engine state file for a stack
    pub fn state_path(stack: &str) -> PathBuf {
        let file = format!("{}.state.json", stack);
        if let Some(dir) = Self::config_dir() {
            return dir.join(file);
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(format!(".{}", APP_DIR)).join(file);
        }
        PathBuf::from(file)
    }
}

/// Credentials and endpoint of the Sentry provider
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub token: String,
    pub api_url: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(token: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: api_url.into(),
        }
    }

    /// Build from engine configuration variables
    pub fn from_variables(vars: &HashMap<String, String>) -> Result<Self> {
        let token = vars
            .get(TOKEN_VARIABLE)
            .filter(|t| !t.is_empty())
            .cloned()
            .with_context(|| format!("missing provider configuration '{}'", TOKEN_VARIABLE))?;
        let api_url = vars
            .get(API_URL_VARIABLE)
            .filter(|u| !u.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Ok(Self { token, api_url })
    }

    /// Resolve from CLI flags, environment and the config file
    pub fn resolve(config: &Config, token: Option<&str>, api_url: Option<&str>) -> Result<Self> {
        let token = token
            .map(str::to_string)
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .filter(|t| !t.is_empty())
            .with_context(|| {
                format!("No Sentry token configured. Set {} or use --token", TOKEN_ENV)
            })?;
        Ok(Self {
            token,
            api_url: config.effective_api_url(api_url),
        })
    }

    /// Names of the settings that differ from `other`
    pub fn diff(&self, other: &ProviderConfig) -> Vec<&'static str> {
        let mut diffs = Vec::new();
        if self.token != other.token {
            diffs.push("sentryToken");
        }
        if self.api_url != other.api_url {
            diffs.push("sentryApiURL");
        }
        diffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_variables() {
        let vars = HashMap::from([
            (TOKEN_VARIABLE.to_string(), "secret".to_string()),
            (API_URL_VARIABLE.to_string(), "https://self-hosted/api/0/".to_string()),
        ]);
        let config = ProviderConfig::from_variables(&vars).unwrap();
        assert_eq!(config.token, "secret");
        assert_eq!(config.api_url, "https://self-hosted/api/0/");
    }

    #[test]
    fn test_from_variables_defaults_url_and_requires_token() {
        let vars = HashMap::from([(TOKEN_VARIABLE.to_string(), "secret".to_string())]);
        assert_eq!(
            ProviderConfig::from_variables(&vars).unwrap().api_url,
            DEFAULT_API_URL
        );

        let err = ProviderConfig::from_variables(&HashMap::new()).unwrap_err();
        assert!(err.to_string().contains(TOKEN_VARIABLE));
    }

    #[test]
    fn test_provider_config_diff() {
        let a = ProviderConfig::new("t1", DEFAULT_API_URL);
        let b = ProviderConfig::new("t2", "https://other/api/0/");
        assert_eq!(a.diff(&a.clone()), Vec::<&str>::new());
        assert_eq!(a.diff(&b), vec!["sentryToken", "sentryApiURL"]);
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", ProviderConfig::new("very-secret", DEFAULT_API_URL));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let path = std::env::temp_dir()
            .join(format!("sentry-iac-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let config = Config {
            organization: Some("acme".to_string()),
            stack: Some("prod".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
        assert_eq!(Config::load_from(&path).effective_stack(None), "prod");
        assert_eq!(Config::load_from(&path).effective_stack(Some("qa")), "qa");
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_effective_api_url_prefers_cli() {
        let config = Config {
            api_url: Some("https://from-config/api/0/".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.effective_api_url(Some("https://from-cli/api/0/")),
            "https://from-cli/api/0/"
        );
    }
}
