//! Lifecycle verification of installed modules.
//!
//! # Responsibilities
//! - Diagnose configured modules by name, absence included
//! - Scan every module the container reports
//! - Never cache: each call re-queries the container

use crate::config::{HarnessConfig, RequiredModuleConfig, RequiredState};
use crate::container::{ContainerHandle, Module, ModuleState};
use crate::verify::result::{ProbeFailure, ProbeResult};

/// Whether `state` satisfies a required tier.
pub fn satisfies(tier: RequiredState, state: ModuleState) -> bool {
    match tier {
        RequiredState::ActiveOnly => state == ModuleState::Active,
        RequiredState::ResolvedOrActive => matches!(state, ModuleState::Active | ModuleState::Resolved),
    }
}

fn expected(tier: RequiredState) -> &'static str {
    match tier {
        RequiredState::ActiveOnly => "ACTIVE",
        RequiredState::ResolvedOrActive => "RESOLVED or ACTIVE",
    }
}

/// Checks module states against required tiers.
#[derive(Debug, Clone, Default)]
pub struct LifecycleVerifier {
    required: Vec<RequiredModuleConfig>,
}

impl LifecycleVerifier {
    pub fn new(required: Vec<RequiredModuleConfig>) -> Self {
        Self { required }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.modules.clone())
    }

    /// Tier for a module; unnamed modules accept RESOLVED or ACTIVE.
    pub fn tier_of(&self, id: &str) -> RequiredState {
        self.required
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.required_state)
            .unwrap_or_default()
    }

    fn judge(&self, name: String, module: &Module) -> ProbeResult {
        let tier = self.tier_of(&module.id);
        if satisfies(tier, module.state) {
            ProbeResult::pass(name, format!("{} {} is {}", module.id, module.version, module.state))
        } else {
            ProbeResult::fail(
                name,
                ProbeFailure::ModuleState {
                    module: module.id.clone(),
                    state: module.state,
                    expected: expected(tier).to_string(),
                    cause: module.failure.clone(),
                },
            )
        }
    }

    /// Named diagnosis of one module.
    pub fn diagnose(&self, container: &dyn ContainerHandle, id: &str) -> ProbeResult {
        let name = format!("module {}", id);
        match container.find_module(id) {
            Some(module) => self.judge(name, &module),
            None => ProbeResult::fail(name, ProbeFailure::NotInstalled { module: id.to_string() }),
        }
    }

    /// One result per installed module, in install order.
    pub fn verify_all(&self, container: &dyn ContainerHandle) -> Vec<ProbeResult> {
        container
            .list_modules()
            .iter()
            .map(|module| self.judge(format!("scan {}", module.id), module))
            .collect()
    }

    /// Named diagnoses first, then the full scan.
    pub fn run(&self, container: &dyn ContainerHandle) -> Vec<ProbeResult> {
        let mut results: Vec<ProbeResult> = self
            .required
            .iter()
            .map(|m| self.diagnose(container, &m.id))
            .collect();
        results.extend(self.verify_all(container));

        let failed = results.iter().filter(|r| !r.passed()).count();
        tracing::info!(checks = results.len(), failed, "Lifecycle verification finished");
        results
    }
}
