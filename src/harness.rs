//! Harness orchestration: build, boot, verify, tear down.
//!
//! # Flow
//! ```text
//! HarnessConfig + Environment
//!     → DeploymentSpecBuilder::build()      (fails fast, nothing acquired yet)
//!     → probe trust anchors                 (before boot)
//!     → catalog + LocalContainer::boot()    (bounded by timeouts.boot_secs)
//!     → LifecycleVerifier / negotiation probe
//!     → RunningContainer::shutdown()
//!     → VerificationReport
//! ```

use std::time::Duration;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::container::catalog::CatalogError;
use crate::container::{BootError, ContainerHandle, LocalContainer, ModuleContainer};
use crate::deployment::presets::connectors;
use crate::deployment::{
    ConfigurationError, DeploymentSettings, DeploymentSpec, DeploymentSpecBuilder, Environment, ProcessEnvironment,
};
use crate::net::tls::TlsError;
use crate::verify::{LifecycleVerifier, NegotiationTarget, ProtocolNegotiationProbe, VerificationReport};

/// Which externally triggerable checks to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Checks {
    #[default]
    All,
    Modules,
    Negotiation,
}

impl Checks {
    pub fn modules(self) -> bool {
        matches!(self, Checks::All | Checks::Modules)
    }

    pub fn negotiation(self) -> bool {
        matches!(self, Checks::All | Checks::Negotiation)
    }
}

/// Errors that stop a run before any verdict exists.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("failed to load module catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to load probe trust anchors: {0}")]
    Tls(#[from] TlsError),

    #[error("container boot failed: {0}")]
    Boot(#[from] BootError),

    #[error("container did not boot within {0}s")]
    BootTimeout(u64),
}

/// One configured deployment, ready to plan or run.
pub struct Harness {
    config: HarnessConfig,
    env: Box<dyn Environment>,
}

impl Harness {
    /// Harness reading the override key from the process environment.
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_environment(config, ProcessEnvironment::new())
    }

    pub fn with_environment(config: HarnessConfig, env: impl Environment + 'static) -> Self {
        Self {
            config,
            env: Box::new(env),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The option list a run would boot.
    pub fn plan(&self) -> Result<DeploymentSpec, ConfigurationError> {
        let settings = DeploymentSettings::from_config(&self.config);
        DeploymentSpecBuilder::new(settings, self.env.as_ref()).build()
    }

    pub async fn run(&self, checks: Checks) -> Result<VerificationReport, HarnessError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("harness_run", %run_id, ?checks);
        self.run_inner(checks).instrument(span).await
    }

    async fn run_inner(&self, checks: Checks) -> Result<VerificationReport, HarnessError> {
        let spec = self.plan()?;
        tracing::info!(options = spec.len(), "Deployment planned");

        let probe = if checks.negotiation() {
            Some(ProtocolNegotiationProbe::from_config(&self.config)?)
        } else {
            None
        };

        let boot_secs = self.config.timeouts.boot_secs;
        let boot = async {
            let container = LocalContainer::from_config(&self.config).await?;
            Ok::<_, HarnessError>(container.boot(spec.options()).await?)
        };
        let handle = tokio::time::timeout(Duration::from_secs(boot_secs), boot)
            .await
            .map_err(|_| HarnessError::BootTimeout(boot_secs))??;
        tracing::info!(boot_archives = ?handle.boot_archives(), "Container ready");

        let mut report = VerificationReport::default();
        if checks.modules() {
            report.extend(LifecycleVerifier::from_config(&self.config).run(&handle));
        }
        if let Some(probe) = probe {
            let target = self.negotiation_target(&handle);
            report.extend(probe.run(handle.resolver(), &target).await);
        }

        handle.shutdown().await;

        let failed = report.failures().count();
        tracing::info!(verdict = %report.verdict(), checks = report.results.len(), failed, "Run complete");
        Ok(report)
    }

    /// Configured endpoint, with an ephemeral port replaced by the bound one.
    fn negotiation_target(&self, handle: &dyn ContainerHandle) -> NegotiationTarget {
        let mut port = self.config.protocol.port;
        if port == 0 {
            if let Some(addr) = handle.connector_address(connectors::NEGOTIATED_TLS) {
                port = addr.port();
            }
        }
        NegotiationTarget {
            host: self.config.site.host.clone(),
            port,
            path: self.config.probe.path.clone(),
            expected_body: self.config.probe.expected_body.clone(),
        }
    }
}
