//! Assembly of the ordered option sequence for one deployment.
//!
//! # Responsibilities
//! - Merge site/bootstrap options with the core module presets
//! - Validate the negotiation override archive before anything boots
//! - Emit protocol, test-support and logging options in a fixed order
//!
//! # Design Decisions
//! - Settings are an explicit value scoped to one run, never globals
//! - Override validation is synchronous and side-effect free
//! - Logging overrides go last so they win over earlier defaults

use std::path::PathBuf;

use thiserror::Error;

use crate::config::HarnessConfig;
use crate::deployment::environment::Environment;
use crate::deployment::option::{DeployOption, DeploymentSpec};
use crate::deployment::presets::{self, keys};

/// Fatal pre-boot configuration problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The environment key naming the override archive is unset or empty.
    #[error("negotiation override path is not configured: set '{key}' to the override archive")]
    MissingOverrideKey { key: String },

    /// The configured override archive does not exist.
    #[error("unable to find the negotiation override archive at {}", .path.display())]
    OverrideNotFound { path: PathBuf },
}

/// Host/port descriptor of the composed server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDescriptor {
    pub host: String,
    pub http_port: u16,
    pub connectors: Vec<String>,
    pub tls_cert: PathBuf,
    pub tls_key: PathBuf,
}

/// Everything the builder needs to know about one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSettings {
    pub site: SiteDescriptor,
    pub verbose: bool,
    pub protocol_port: u16,
    /// Explicit override archive; consulted before `override_key`.
    pub override_path: Option<PathBuf>,
    pub override_key: String,
    pub process_flags: Vec<String>,
    pub include_test_support: bool,
}

impl DeploymentSettings {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            site: SiteDescriptor {
                host: config.site.host.clone(),
                http_port: config.site.http_port,
                connectors: config.site.connectors.clone(),
                tls_cert: config.tls.cert_path.clone(),
                tls_key: config.tls.key_path.clone(),
            },
            verbose: config.observability.verbose,
            protocol_port: config.protocol.port,
            override_path: config.protocol.override_path.clone(),
            override_key: config.protocol.override_key.clone(),
            process_flags: config.deployment.process_flags.clone(),
            include_test_support: config.deployment.include_test_support,
        }
    }
}

/// Log level emitted for a verbosity switch.
pub fn log_level(verbose: bool) -> &'static str {
    if verbose {
        "INFO"
    } else {
        "WARN"
    }
}

/// Builds [`DeploymentSpec`]s from settings and an environment.
pub struct DeploymentSpecBuilder<'a> {
    settings: DeploymentSettings,
    env: &'a dyn Environment,
}

impl<'a> DeploymentSpecBuilder<'a> {
    pub fn new(settings: DeploymentSettings, env: &'a dyn Environment) -> Self {
        Self { settings, env }
    }

    pub fn settings(&self) -> &DeploymentSettings {
        &self.settings
    }

    /// Site descriptor, container log level and core module dependencies.
    pub fn base_options(&self) -> Vec<DeployOption> {
        let site = &self.settings.site;
        let mut options = vec![
            DeployOption::system_property(keys::HOST, &site.host),
            DeployOption::system_property(keys::HTTP_PORT, site.http_port),
            DeployOption::system_property(keys::CONNECTORS, site.connectors.join(",")),
            DeployOption::system_property(keys::TLS_CERT, site.tls_cert.display()),
            DeployOption::system_property(keys::TLS_KEY, site.tls_key.display()),
            DeployOption::system_property(
                keys::CONTAINER_LOG_LEVEL,
                log_level(self.settings.verbose),
            ),
        ];
        options.extend(presets::core_dependencies());
        options.extend(presets::http_service());
        options
    }

    /// Locate the negotiation override archive.
    pub fn resolve_override_path(&self) -> Result<PathBuf, ConfigurationError> {
        let path = match &self.settings.override_path {
            Some(path) => path.clone(),
            None => {
                let key = &self.settings.override_key;
                match self.env.lookup(key) {
                    Some(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
                    _ => {
                        return Err(ConfigurationError::MissingOverrideKey { key: key.clone() });
                    }
                }
            }
        };

        if !self.env.exists(&path) {
            return Err(ConfigurationError::OverrideNotFound { path });
        }
        Ok(path)
    }

    /// Boot injection, protocol port and negotiation/codec modules.
    pub fn protocol_options(&self) -> Result<Vec<DeployOption>, ConfigurationError> {
        let override_path = self.resolve_override_path()?;

        let mut options = vec![
            DeployOption::boot_classpath(override_path),
            DeployOption::system_property(keys::PROTOCOL_PORT, self.settings.protocol_port),
        ];
        options.extend(presets::protocol_modules());
        Ok(options)
    }

    /// Modules only the probes need.
    pub fn test_support_options(&self) -> Vec<DeployOption> {
        if self.settings.include_test_support {
            presets::test_support()
        } else {
            Vec::new()
        }
    }

    /// Log level overrides. Always emitted last.
    pub fn logging_options(&self) -> Vec<DeployOption> {
        let level = log_level(self.settings.verbose);
        vec![
            DeployOption::system_property(keys::CONTAINER_LOG_LEVEL, level),
            DeployOption::system_property(keys::ENGINE_LOG_LEVEL, level),
        ]
    }

    /// The full ordered option sequence.
    pub fn build(&self) -> Result<DeploymentSpec, ConfigurationError> {
        // Fails before any option is assembled.
        let protocol = self.protocol_options()?;

        let mut options = self.base_options();
        options.extend(protocol);
        options.extend(
            self.settings
                .process_flags
                .iter()
                .map(|raw| DeployOption::process_flag(raw)),
        );
        options.extend(self.test_support_options());
        options.extend(self.logging_options());

        tracing::debug!(
            options = options.len(),
            protocol_port = self.settings.protocol_port,
            "Deployment spec assembled"
        );
        Ok(DeploymentSpec::new(options))
    }
}
