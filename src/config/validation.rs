//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, distinct ports)
//! - Detect unknown connectors and malformed probe paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HarnessConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Filesystem checks (override archive, certificates) are not done here;
//!   the deployment builder and TLS loaders own those

use std::fmt;

use crate::config::schema::HarnessConfig;
use crate::deployment::presets::connectors;

/// Connector names the boot module understands.
pub const KNOWN_CONNECTORS: &[&str] = &[connectors::HTTP, connectors::NEGOTIATED_TLS];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human readable reason.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &HarnessConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.site.host.trim().is_empty() {
        errors.push(ValidationError::new("site.host", "must not be empty"));
    }

    for connector in &config.site.connectors {
        if !KNOWN_CONNECTORS.contains(&connector.as_str()) {
            errors.push(ValidationError::new(
                "site.connectors",
                format!("unknown connector '{}'", connector),
            ));
        }
    }

    if config.protocol.port != 0 && config.protocol.port == config.site.http_port {
        errors.push(ValidationError::new(
            "protocol.port",
            format!("collides with site.http_port {}", config.site.http_port),
        ));
    }

    if config.protocol.override_path.is_none() && config.protocol.override_key.trim().is_empty() {
        errors.push(ValidationError::new(
            "protocol.override_key",
            "must be set when protocol.override_path is absent",
        ));
    }

    if config.protocol.expected_protocol.is_empty() {
        errors.push(ValidationError::new("protocol.expected_protocol", "must not be empty"));
    }

    if config.protocol.capability.is_empty() {
        errors.push(ValidationError::new("protocol.capability", "must not be empty"));
    }

    if !config.probe.path.starts_with('/') {
        errors.push(ValidationError::new("probe.path", "must start with '/'"));
    }

    for (field, value) in [
        ("timeouts.boot_secs", config.timeouts.boot_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.read_secs", config.timeouts.read_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    for (i, module) in config.modules.iter().enumerate() {
        if module.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("modules[{}].id", i), "must not be empty"));
        }
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
    use crate::config::schema::RequiredModuleConfig;
    use crate::config::RequiredState;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&HarnessConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = HarnessConfig::default();
        config.site.connectors.push("spdy".into());
        config.probe.path = "greeting".into();
        config.timeouts.read_secs = 0;
        config.modules.clear();
        config
            .modules
            .push(RequiredModuleConfig::new("", RequiredState::ActiveOnly));

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["site.connectors", "probe.path", "timeouts.read_secs", "modules[0].id"]
        );
    }

    #[test]
    fn ephemeral_ports_do_not_collide() {
        let mut config = HarnessConfig::default();
        config.site.http_port = 0;
        config.protocol.port = 0;
        assert!(validate_config(&config).is_ok());
    }
}
