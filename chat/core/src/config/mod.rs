//! TOML Configuration File Support
//!
//! Client configuration is read from `~/.config/ragchat/client.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - config: `$XDG_CONFIG_HOME/ragchat/client.toml`
//! - sessions: `$XDG_DATA_HOME/ragchat/sessions.json`
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! endpoint = "http://localhost:8000/api/chat"
//! health_path = "/health"
//! connect_timeout_ms = 10000
//!
//! [render]
//! interval_ms = 40
//!
//! [storage]
//! path = "/home/me/.local/share/ragchat/sessions.json"
//!
//! [sessions]
//! title_max_chars = 30
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::DEFAULT_RENDER_INTERVAL;
use crate::session::{FileSessionStore, DEFAULT_TITLE_MAX_CHARS};

/// Default chat endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/chat";

/// Default health path, resolved against the endpoint's host
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session file used when no data directory can be determined
const FALLBACK_STORE_FILE: &str = "ragchat-sessions.json";

const ENV_ENDPOINT: &str = "RAGCHAT_ENDPOINT";
const ENV_HEALTH_PATH: &str = "RAGCHAT_HEALTH_PATH";
const ENV_CONNECT_TIMEOUT_MS: &str = "RAGCHAT_CONNECT_TIMEOUT_MS";
const ENV_RENDER_INTERVAL_MS: &str = "RAGCHAT_RENDER_INTERVAL_MS";
const ENV_STORE_PATH: &str = "RAGCHAT_STORE_PATH";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Chat endpoint URL
    pub endpoint: Option<String>,

    /// Health check path on the endpoint's host
    pub health_path: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// Render section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderToml {
    /// Minimum spacing between throttled renders in milliseconds
    pub interval_ms: Option<u64>,
}

/// Storage section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Session file path
    pub path: Option<PathBuf>,
}

/// Sessions section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsToml {
    /// Characters of the first query kept in a derived title
    pub title_max_chars: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Server configuration section
    pub server: ServerToml,

    /// Render configuration section
    pub render: RenderToml,

    /// Storage configuration section
    pub storage: StorageToml,

    /// Sessions configuration section
    pub sessions: SessionsToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved client configuration
///
/// Use [`load_config`] to load it with proper priority handling.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Chat endpoint URL
    pub endpoint: String,

    /// Health check path
    pub health_path: String,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Minimum spacing between throttled renders
    pub render_interval: Duration,

    /// Session file path
    pub store_path: PathBuf,

    /// Characters of the first query kept in a derived title
    pub title_max_chars: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            render_interval: DEFAULT_RENDER_INTERVAL,
            store_path: FileSessionStore::default_path()
                .unwrap_or_else(|| PathBuf::from(FALLBACK_STORE_FILE)),
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the highest-priority layer that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an empty endpoint, a zero
    /// render interval or a zero title length.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server.endpoint must not be empty".to_string(),
            ));
        }
        if self.render_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "render.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.title_max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.title_max_chars must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/ragchat/client.toml` or
/// `~/.config/ragchat/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ragchat").join("client.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// merged values fail validation. A missing config file is not an error.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// if the merged values fail validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref endpoint) = toml.server.endpoint {
        config.endpoint.clone_from(endpoint);
    }
    if let Some(ref path) = toml.server.health_path {
        config.health_path.clone_from(path);
    }
    if let Some(ms) = toml.server.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }

    if let Some(ms) = toml.render.interval_ms {
        config.render_interval = Duration::from_millis(ms);
    }

    if let Some(ref path) = toml.storage.path {
        config.store_path.clone_from(path);
    }

    if let Some(max_chars) = toml.sessions.title_max_chars {
        config.title_max_chars = max_chars;
    }
}

/// Apply environment variable overrides to the config
///
/// `lookup` is `std::env::var` in production; tests pass a map so they do
/// not race on the process environment.
fn apply_env_config<F>(config: &mut ClientConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = lookup(ENV_ENDPOINT) {
        config.endpoint = endpoint;
        config.source = ConfigSource::Env;
    }
    if let Some(path) = lookup(ENV_HEALTH_PATH) {
        config.health_path = path;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = lookup(ENV_CONNECT_TIMEOUT_MS) {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.connect_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %timeout, "Ignoring invalid {}", ENV_CONNECT_TIMEOUT_MS);
        }
    }
    if let Some(interval) = lookup(ENV_RENDER_INTERVAL_MS) {
        if let Ok(ms) = interval.parse::<u64>() {
            config.render_interval = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %interval, "Ignoring invalid {}", ENV_RENDER_INTERVAL_MS);
        }
    }
    if let Some(path) = lookup(ENV_STORE_PATH) {
        config.store_path = PathBuf::from(path);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Endpoint override
    pub endpoint: Option<String>,

    /// Session file override
    pub store_path: Option<PathBuf>,

    /// Render interval override (milliseconds)
    pub render_interval_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set endpoint override
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Set session file override
    #[must_use]
    pub fn with_store_path(mut self, path: PathBuf) -> Self {
        self.store_path = Some(path);
        self
    }

    /// Set render interval override
    #[must_use]
    pub fn with_render_interval_ms(mut self, ms: u64) -> Self {
        self.render_interval_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration and re-validate it
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override is out of range.
    pub fn apply(&self, config: &mut ClientConfig) -> Result<(), ConfigError> {
        if self.endpoint.is_some() || self.store_path.is_some() || self.render_interval_ms.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref endpoint) = self.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(ref path) = self.store_path {
            config.store_path.clone_from(path);
        }
        if let Some(ms) = self.render_interval_ms {
            config.render_interval = Duration::from_millis(ms);
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.endpoint, "http://localhost:8000/api/chat");
        assert_eq!(config.health_path, "/health");
        assert_eq!(config.connect_timeout, Duration::from_millis(10_000));
        assert_eq!(config.render_interval, Duration::from_millis(40));
        assert_eq!(config.title_max_chars, 30);
        assert!(config.store_path.ends_with("sessions.json"));
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("ragchat/client.toml"));
        }
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[server]
endpoint = "http://rag.internal:9000/api/chat"
health_path = "/status"
connect_timeout_ms = 2500

[render]
interval_ms = 16

[storage]
path = "/tmp/ragchat/sessions.json"

[sessions]
title_max_chars = 12
"#;

        let parsed: ClientToml = toml::from_str(toml_str).unwrap();
        let mut config = ClientConfig::default();
        apply_toml_config(&mut config, &parsed);

        assert_eq!(config.endpoint, "http://rag.internal:9000/api/chat");
        assert_eq!(config.health_path, "/status");
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.render_interval, Duration::from_millis(16));
        assert_eq!(config.store_path, PathBuf::from("/tmp/ragchat/sessions.json"));
        assert_eq!(config.title_max_chars, 12);
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let parsed: ClientToml = toml::from_str("[render]\ninterval_ms = 100\n").unwrap();
        let mut config = ClientConfig::default();
        apply_toml_config(&mut config, &parsed);

        assert_eq!(config.render_interval, Duration::from_millis(100));
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.title_max_chars, DEFAULT_TITLE_MAX_CHARS);
    }

    #[test]
    fn test_parse_ignores_unknown_render_keys() {
        let parsed: ClientToml =
            toml::from_str("[render]\ninterval_ms = 25\nnear_end_threshold = 50\n").unwrap();
        let mut config = ClientConfig::default();
        apply_toml_config(&mut config, &parsed);

        assert_eq!(config.render_interval, Duration::from_millis(25));
    }

    #[test]
    fn test_parse_empty_toml() {
        let parsed: ClientToml = toml::from_str("").unwrap();
        assert!(parsed.server.endpoint.is_none());
        assert!(parsed.storage.path.is_none());
    }

    // =========================================================================
    // File Loading Tests
    // =========================================================================

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[sessions]\ntitle_max_chars = 20").unwrap();

        let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.title_max_chars, 20);
        assert_eq!(config.config_file_path, Some(file.path().to_path_buf()));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_path(Some(dir.path().join("absent.toml"))).unwrap();

        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nendpoint = ").unwrap();

        let result = load_config_from_path(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_value_in_file_fails_validation() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[render]\ninterval_ms = 0").unwrap();

        let result = load_config_from_path(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    // =========================================================================
    // Environment Override Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file_values() {
        let parsed: ClientToml =
            toml::from_str("[server]\nendpoint = \"http://from-file/api/chat\"\n").unwrap();
        let mut config = ClientConfig::default();
        apply_toml_config(&mut config, &parsed);

        apply_env_config(
            &mut config,
            env_from(&[
                ("RAGCHAT_ENDPOINT", "http://from-env/api/chat"),
                ("RAGCHAT_RENDER_INTERVAL_MS", "25"),
                ("RAGCHAT_STORE_PATH", "/var/tmp/s.json"),
            ]),
        );

        assert_eq!(config.endpoint, "http://from-env/api/chat");
        assert_eq!(config.render_interval, Duration::from_millis(25));
        assert_eq!(config.store_path, PathBuf::from("/var/tmp/s.json"));
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_invalid_env_number_is_ignored() {
        let mut config = ClientConfig::default();
        apply_env_config(
            &mut config,
            env_from(&[("RAGCHAT_CONNECT_TIMEOUT_MS", "soon")]),
        );

        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    // =========================================================================
    // CLI Override Tests
    // =========================================================================

    #[test]
    fn test_cli_overrides_win() {
        let mut config = ClientConfig::default();
        apply_env_config(
            &mut config,
            env_from(&[("RAGCHAT_ENDPOINT", "http://from-env/api/chat")]),
        );

        ConfigOverrides::new()
            .with_endpoint("http://from-cli/api/chat".to_string())
            .with_store_path(PathBuf::from("/tmp/cli.json"))
            .apply(&mut config)
            .unwrap();

        assert_eq!(config.endpoint, "http://from-cli/api/chat");
        assert_eq!(config.store_path, PathBuf::from("/tmp/cli.json"));
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = ClientConfig::default();
        ConfigOverrides::new().apply(&mut config).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_override_validation() {
        let mut config = ClientConfig::default();
        let result = ConfigOverrides::new()
            .with_endpoint("   ".to_string())
            .apply(&mut config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
