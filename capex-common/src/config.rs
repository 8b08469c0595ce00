//! Configuration management for the CapEx planner.
//!
//! The planner reads a single configuration file at `~/.capex/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (CAPEX_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `CAPEX_DATA_PATH` → data.source_path
//! - `CAPEX_ENCODER_PATH` → artifacts.encoder_path
//! - `CAPEX_MODEL_PATH` → artifacts.model_path
//! - `CAPEX_BIND_ADDRESS` → service.host
//! - `CAPEX_PORT` → service.port
//! - `CAPEX_USERNAME` → auth.username
//! - `CAPEX_PASSWORD_SHA256` → auth.password_sha256
//! - `CAPEX_LOG_LEVEL` → observability.log_level

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ResultExt};

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    directories::UserDirs::new()
        .map_or_else(|| PathBuf::from(".capex"), |dirs| dirs.home_dir().join(".capex"))
        .join("config.json")
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::full(raw).map_or_else(|_| raw.to_string(), |s| s.into_owned()))
}

/// Hex-encoded SHA-256 digest of a password.
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

// ============================================================================
// Data Source Configuration
// ============================================================================

/// Location of the CapEx records table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Path to the CSV records file
    #[serde(default = "default_source_path")]
    pub source_path: String,

    /// Field delimiter (single ASCII character)
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source_path: default_source_path(),
            delimiter: default_delimiter(),
        }
    }
}

impl DataConfig {
    /// Resolved path of the records file.
    pub fn resolved_path(&self) -> PathBuf {
        expand_path(&self.source_path)
    }
}

fn default_source_path() -> String {
    "sample_data.csv".into()
}

fn default_delimiter() -> char {
    ','
}

// ============================================================================
// Artifact Configuration
// ============================================================================

/// Locations of the pre-trained encoder and ROI model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Market label encoder (JSON)
    #[serde(default = "default_encoder_path")]
    pub encoder_path: String,

    /// ROI regression model (JSON)
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            encoder_path: default_encoder_path(),
            model_path: default_model_path(),
        }
    }
}

impl ArtifactsConfig {
    /// Resolved encoder path.
    pub fn encoder(&self) -> PathBuf {
        expand_path(&self.encoder_path)
    }

    /// Resolved model path.
    pub fn model(&self) -> PathBuf {
        expand_path(&self.model_path)
    }
}

fn default_encoder_path() -> String {
    "market_encoder.json".into()
}

fn default_model_path() -> String {
    "roi_model.json".into()
}

// ============================================================================
// Auth Configuration
// ============================================================================

/// Dashboard login configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Username accepted at login
    #[serde(default)]
    pub username: Option<String>,

    /// Hex SHA-256 digest of the password
    #[serde(default)]
    pub password_sha256: Option<String>,

    /// Idle timeout after which a session is invalidated
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: None,
            password_sha256: None,
            session_timeout_secs: default_session_timeout_secs(),
        }
    }
}

impl AuthConfig {
    /// Whether both halves of the credential pair are present.
    pub fn is_configured(&self) -> bool {
        self.username.is_some() && self.password_sha256.is_some()
    }

    /// Check a username/password pair against the configured credentials.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password_sha256) {
            (Some(expected_user), Some(expected_digest)) => {
                let digest = password_digest(password);
                let user_ok = expected_user == username;
                let pass_ok = digest.eq_ignore_ascii_case(expected_digest);
                user_ok && pass_ok
            }
            _ => false,
        }
    }
}

fn default_session_timeout_secs() -> i64 {
    1800
}

// ============================================================================
// Service Configuration
// ============================================================================

/// HTTP service bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Bind address.
    /// Default: "127.0.0.1" (local only)
    #[serde(default = "default_bind_address")]
    pub host: String,

    /// Port number
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4480
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Records source
    #[serde(default)]
    pub data: DataConfig,

    /// Encoder and model artifacts
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Dashboard login
    #[serde(default)]
    pub auth: AuthConfig,

    /// HTTP service
    #[serde(default)]
    pub service: ServiceConfig,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("CAPEX_DATA_PATH") {
            self.data.source_path = path;
        }
        if let Ok(path) = std::env::var("CAPEX_ENCODER_PATH") {
            self.artifacts.encoder_path = path;
        }
        if let Ok(path) = std::env::var("CAPEX_MODEL_PATH") {
            self.artifacts.model_path = path;
        }

        if let Ok(bind) = std::env::var("CAPEX_BIND_ADDRESS") {
            self.service.host = bind;
        }
        if let Ok(port) = std::env::var("CAPEX_PORT") {
            if let Ok(p) = port.parse() {
                self.service.port = p;
            }
        }

        if let Ok(user) = std::env::var("CAPEX_USERNAME") {
            self.auth.username = Some(user);
        }
        if let Ok(digest) = std::env::var("CAPEX_PASSWORD_SHA256") {
            self.auth.password_sha256 = Some(digest);
        }

        if let Ok(level) = std::env::var("CAPEX_LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }

    /// Socket address string for the HTTP service.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.host, self.service.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.service.port, 4480);
        assert_eq!(config.service.host, "127.0.0.1");
        assert_eq!(config.auth.session_timeout_secs, 1800);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.data.delimiter, ',');
        assert!(!config.auth.is_configured());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"data": {{"source_path": "/srv/capex.csv"}}, "service": {{"port": 9000}}}}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.data.source_path, "/srv/capex.csv");
        assert_eq!(config.service.port, 9000);
        assert_eq!(config.service.host, "127.0.0.1");
        assert_eq!(config.artifacts.model_path, "roi_model.json");
    }

    #[test]
    fn test_observability_aliases() {
        let config: Config =
            serde_json::from_str(r#"{"observability": {"level": "debug", "format": "json"}}"#)
                .unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_load_from_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read config from"));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_auth_verify() {
        let auth = AuthConfig {
            username: Some("planner".into()),
            password_sha256: Some(password_digest("s3cret")),
            ..Default::default()
        };
        assert!(auth.is_configured());
        assert!(auth.verify("planner", "s3cret"));
        assert!(!auth.verify("planner", "wrong"));
        assert!(!auth.verify("other", "s3cret"));
    }

    #[test]
    fn test_auth_verify_accepts_uppercase_digest() {
        let auth = AuthConfig {
            username: Some("planner".into()),
            password_sha256: Some(password_digest("s3cret").to_uppercase()),
            ..Default::default()
        };
        assert!(auth.verify("planner", "s3cret"));
    }

    #[test]
    fn test_unconfigured_auth_rejects_everything() {
        let auth = AuthConfig::default();
        assert!(!auth.verify("", ""));
    }

    #[test]
    fn test_password_digest_is_stable_hex() {
        let digest = password_digest("123456");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
        );
    }

    #[test]
    fn test_bind_address() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "127.0.0.1:4480");
    }
}
