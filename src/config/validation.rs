//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (token length > 0, bind address parses)
//! - Check that custom headers and their user-agent patterns are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use regex::Regex;
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::obfuscation::PathGenerator;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("http.secret_path must be set")]
    MissingSecretPath,

    #[error("http.secret_path must be a single path segment, got {0:?}")]
    InvalidSecretPath(String),

    #[error("{field} is not a socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.request_timeout_secs must be positive")]
    ZeroTimeout,

    #[error("obfuscation settings rejected: {0}")]
    Obfuscation(String),

    #[error("custom header {index}: {reason}")]
    CustomHeader { index: usize, reason: String },

    #[error("{field} is not a valid header value")]
    InvalidHeaderValue { field: &'static str },
}

/// Check a deserialized config. Collects every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let secret = &config.http.secret_path;
    if secret.is_empty() {
        errors.push(ValidationError::MissingSecretPath);
    } else if secret.contains(['/', '{', '}', '?', '#']) || secret == "." || secret == ".." {
        errors.push(ValidationError::InvalidSecretPath(secret.clone()));
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let obf = &config.obfuscation;
    if let Err(e) = PathGenerator::new(&obf.alphabet, obf.token_length) {
        errors.push(ValidationError::Obfuscation(e.to_string()));
    }
    if obf.max_attempts == 0 {
        errors.push(ValidationError::Obfuscation(
            "max_attempts must be positive".into(),
        ));
    }

    if HeaderValue::from_str(&config.http.profile_title).is_err() {
        errors.push(ValidationError::InvalidHeaderValue { field: "http.profile_title" });
    }
    if HeaderValue::from_str(&config.http.profile_update_interval).is_err() {
        errors.push(ValidationError::InvalidHeaderValue {
            field: "http.profile_update_interval",
        });
    }

    let mut seen = HashSet::new();
    for (index, header) in config.http.custom_headers.iter().enumerate() {
        let reason = if HeaderName::from_bytes(header.name.as_bytes()).is_err() {
            Some(format!("invalid name {:?}", header.name))
        } else if HeaderValue::from_str(&header.value).is_err() {
            Some(format!("invalid value for {:?}", header.name))
        } else if let Some(Err(e)) = header.user_agent.as_deref().map(Regex::new) {
            Some(format!("user_agent pattern does not compile: {e}"))
        } else {
            None
        };
        if let Some(reason) = reason {
            errors.push(ValidationError::CustomHeader { index, reason });
        }
        let key = (header.name.to_ascii_lowercase(), header.user_agent.clone());
        if !seen.insert(key) {
            tracing::warn!(name = %header.name, "Duplicate custom header; both will be sent");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CustomHeaderConfig;

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.http.secret_path = "s3cret".into();
        config
    }

    #[test]
    fn test_defaults_with_secret_pass() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn test_missing_secret() {
        let errors = validate_config(&AppConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingSecretPath]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid();
        config.http.secret_path = "a/b".into();
        config.listener.bind_address = "not-an-address".into();
        config.obfuscation.token_length = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], ValidationError::InvalidSecretPath(_)));
        assert!(matches!(errors[1], ValidationError::InvalidAddress { .. }));
        assert!(matches!(errors[2], ValidationError::Obfuscation(_)));
    }

    #[test]
    fn test_alphabet_must_be_unreserved() {
        let mut config = valid();
        config.obfuscation.alphabet = "ab/".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_custom_header_checks() {
        let mut config = valid();
        config.http.custom_headers = vec![
            CustomHeaderConfig {
                name: "bad name".into(),
                value: "x".into(),
                user_agent: None,
            },
            CustomHeaderConfig {
                name: "announce".into(),
                value: "x".into(),
                user_agent: Some("(unclosed".into()),
            },
            CustomHeaderConfig {
                name: "ok".into(),
                value: "fine".into(),
                user_agent: Some("^Happ".into()),
            },
        ];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ValidationError::CustomHeader { index: 0, .. }));
        assert!(matches!(errors[1], ValidationError::CustomHeader { index: 1, .. }));
    }
}
