//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::MgmtConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<MgmtConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: MgmtConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mgmt.toml");

        fs::write(&path, "[admin]\napi_key = \"secret\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.admin.api_key, "secret");

        fs::write(&path, "[observability]\nlog_level = \"chatty\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("observability.log_level"));

        fs::write(&path, "[admin\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
        assert!(matches!(
            load_config(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
