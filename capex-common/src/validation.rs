//! Configuration validation for the CapEx planner.
//!
//! Checks that required values are present and within valid ranges
//! before any service starts.

use thiserror::Error;

use crate::config::{AuthConfig, Config, DataConfig, ObservabilityConfig, ServiceConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.data.validate() {
            errors.push(e);
        }
        if let Err(e) = self.auth.validate() {
            errors.push(e);
        }
        if let Err(e) = self.service.validate() {
            errors.push(e);
        }
        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for DataConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.source_path.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "data.source_path".into(),
            });
        }
        if !self.delimiter.is_ascii() {
            return Err(ValidationError::InvalidValue {
                field: "data.delimiter".into(),
                reason: "must be a single ASCII character".into(),
            });
        }
        Ok(())
    }
}

impl Validate for AuthConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.username.is_none() {
            return Err(ValidationError::MissingField {
                field: "auth.username".into(),
            });
        }

        match &self.password_sha256 {
            None => {
                return Err(ValidationError::MissingField {
                    field: "auth.password_sha256".into(),
                })
            }
            Some(digest) => {
                let is_hex = digest.chars().all(|c| c.is_ascii_hexdigit());
                if digest.len() != 64 || !is_hex {
                    return Err(ValidationError::InvalidValue {
                        field: "auth.password_sha256".into(),
                        reason: "must be a 64-character hex SHA-256 digest".into(),
                    });
                }
            }
        }

        if self.session_timeout_secs <= 0 {
            return Err(ValidationError::InvalidValue {
                field: "auth.session_timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidValue {
                field: "service.port".into(),
                reason: "must be between 1 and 65535".into(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "service.host".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        const FORMATS: &[&str] = &["json", "pretty"];

        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("expected one of {LEVELS:?}"),
            });
        }
        if !FORMATS.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("expected one of {FORMATS:?}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::password_digest;
    use test_case::test_case;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.auth.username = Some("planner".into());
        config.auth.password_sha256 = Some(password_digest("pw"));
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_credentials() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field } if field == "auth.username"));
    }

    #[test]
    fn test_bad_digest() {
        let mut config = valid_config();
        config.auth.password_sha256 = Some("123456".into());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_multiple_errors_collected() {
        let mut config = valid_config();
        config.service.port = 0;
        config.observability.log_level = "loud".into();
        match config.validate() {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test_case("info", "pretty" ; "defaults")]
    #[test_case("DEBUG", "json" ; "uppercase level")]
    #[test_case("error", "JSON" ; "uppercase format")]
    fn test_observability_accepts(level: &str, format: &str) {
        let config = ObservabilityConfig {
            log_level: level.into(),
            log_format: format.into(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_source_path() {
        let data = DataConfig {
            source_path: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(
            data.validate(),
            Err(ValidationError::MissingField { .. })
        ));
    }
}
