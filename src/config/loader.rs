//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::HarnessConfig;
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
pub fn load_config(path: &Path) -> Result<HarnessConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<HarnessConfig, ConfigError> {
    let config: HarnessConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RequiredState;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.protocol.port, 9877);
        assert_eq!(config.probe.path, "/greeting");
        assert_eq!(config.probe.expected_body, "Hello");
        assert!(!config.observability.verbose);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [protocol]
            port = 9443
            override_path = "/opt/boot/negotiation.toml"

            [observability]
            verbose = true

            [[modules]]
            id = "net.composer.boot"
            required_state = "active_only"
            "#,
        )
        .unwrap();

        assert_eq!(config.protocol.port, 9443);
        assert_eq!(
            config.protocol.override_path.as_deref(),
            Some(Path::new("/opt/boot/negotiation.toml"))
        );
        assert!(config.observability.verbose);
        assert_eq!(config.modules.len(), 1);
        assert_eq!(config.modules[0].required_state, RequiredState::ActiveOnly);
    }

    #[test]
    fn semantic_errors_are_reported() {
        let err = parse_config(
            r#"
            [site]
            http_port = 9000
            [protocol]
            port = 9000
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("protocol.port"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = parse_config("[protocol\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
