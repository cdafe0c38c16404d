//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for one harness run.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment key consulted for the negotiation override archive when the
/// config file does not name one.
pub const DEFAULT_OVERRIDE_KEY: &str = "COMPOSITION_NEGOTIATION_BOOT";

/// Capability the negotiation override must provide from the boot scope.
pub const DEFAULT_NEGOTIATION_CAPABILITY: &str = "net.composer.negotiation.Negotiator";

/// Root configuration for the harness.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Host, plain HTTP port and connector plan of the composed server.
    pub site: SiteConfig,

    /// Negotiated protocol connector and its boot override.
    pub protocol: ProtocolConfig,

    /// Certificate material shared by the server connector and the probe.
    pub tls: TlsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Live probe expectations.
    pub probe: ProbeConfig,

    /// Extra deployment knobs.
    pub deployment: DeploymentConfig,

    /// Modules that get a named diagnosis, with their activation tier.
    pub modules: Vec<RequiredModuleConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            protocol: ProtocolConfig::default(),
            tls: TlsConfig::default(),
            observability: ObservabilityConfig::default(),
            timeouts: TimeoutConfig::default(),
            probe: ProbeConfig::default(),
            deployment: DeploymentConfig::default(),
            modules: vec![
                RequiredModuleConfig::new("net.composer.h2.client", RequiredState::ResolvedOrActive),
                RequiredModuleConfig::new("net.composer.boot", RequiredState::ActiveOnly),
                RequiredModuleConfig::new("net.composer.negotiation.server", RequiredState::ActiveOnly),
            ],
        }
    }
}

/// Site descriptor for the composed server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Host the connectors bind to and the probe connects to.
    pub host: String,

    /// Plain HTTP connector port (0 = ephemeral).
    pub http_port: u16,

    /// Connectors the boot module configures, e.g. `["http", "negotiated-tls"]`.
    pub connectors: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            http_port: 8080,
            connectors: vec!["http".to_string(), "negotiated-tls".to_string()],
        }
    }
}

/// Negotiated protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// TLS connector port (0 = ephemeral).
    pub port: u16,

    /// Explicit path to the negotiation override archive.
    /// Takes precedence over the environment key.
    pub override_path: Option<PathBuf>,

    /// Environment key naming the override archive path.
    pub override_key: String,

    /// ALPN identifier the server must select (e.g. "h2").
    pub expected_protocol: String,

    /// Capability the override archive provides from the boot scope.
    pub capability: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            port: 9877,
            override_path: None,
            override_key: DEFAULT_OVERRIDE_KEY.to_string(),
            expected_protocol: "h2".to_string(),
            capability: DEFAULT_NEGOTIATION_CAPABILITY.to_string(),
        }
    }
}

/// TLS configuration for the connector and the probe.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,

    /// Trust anchors for the probe (PEM). Defaults to `cert_path`.
    pub ca_path: Option<PathBuf>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("tls/server.crt"),
            key_path: PathBuf::from("tls/server.key"),
            ca_path: None,
        }
    }
}

impl TlsConfig {
    /// Trust anchor file used by the probe.
    pub fn trust_anchor_path(&self) -> &PathBuf {
        self.ca_path.as_ref().unwrap_or(&self.cert_path)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Verbose runs log at INFO, quiet runs at WARN.
    pub verbose: bool,
}

/// Timeout configuration for boot and the live probe.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for a container boot in seconds.
    pub boot_secs: u64,

    /// TCP connect plus TLS handshake timeout in seconds.
    pub connect_secs: u64,

    /// Request plus body read timeout in seconds.
    pub read_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            boot_secs: 30,
            connect_secs: 5,
            read_secs: 10,
        }
    }
}

/// What the live probe requests and expects back.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Request path.
    pub path: String,

    /// Exact expected response body.
    pub expected_body: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: "/greeting".to_string(),
            expected_body: "Hello".to_string(),
        }
    }
}

/// Deployment knobs outside the fixed presets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Process flags passed to the container as-is.
    pub process_flags: Vec<String>,

    /// Install the probe-support library module.
    pub include_test_support: bool,

    /// Module catalog file; the built-in catalog is used when absent.
    pub catalog_path: Option<PathBuf>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            process_flags: Vec::new(),
            include_test_support: true,
            catalog_path: None,
        }
    }
}

/// Activation tier a module must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequiredState {
    /// Only `ACTIVE` is acceptable (services).
    ActiveOnly,
    /// `RESOLVED` or `ACTIVE` (passive libraries).
    #[default]
    ResolvedOrActive,
}

/// A module that gets a named diagnosis.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequiredModuleConfig {
    /// Symbolic name.
    pub id: String,

    #[serde(default)]
    pub required_state: RequiredState,
}

impl RequiredModuleConfig {
    pub fn new(id: impl Into<String>, required_state: RequiredState) -> Self {
        Self {
            id: id.into(),
            required_state,
        }
    }
}
