//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, log levels and storage paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MgmtConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::MgmtConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &MgmtConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("`{}` is not a socket address", config.admin.bind_address),
            ));
        }
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    if config.storage.config_dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("storage.config_dir", "must not be empty"));
    }
    if let Some(records) = &config.storage.records_file {
        if records.file_name().is_none() {
            errors.push(ValidationError::new(
                "storage.records_file",
                format!("`{}` does not name a file", records.display()),
            ));
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("expected one of {}", LOG_LEVELS.join(", ")),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&MgmtConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = MgmtConfig::default();
        config.admin.bind_address = "localhost".into();
        config.admin.api_key = " ".into();
        config.observability.log_level = "loud".into();
        config.storage.records_file = Some("/".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "admin.bind_address",
                "admin.api_key",
                "storage.records_file",
                "observability.log_level"
            ]
        );
    }

    #[test]
    fn test_disabled_admin_skips_admin_checks() {
        let mut config = MgmtConfig::default();
        config.admin.enabled = false;
        config.admin.bind_address = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
