//! Registry of installed modules.
//!
//! # Responsibilities
//! - Own every module's state; callers only get snapshots
//! - Enforce the lifecycle state machine on every change
//! - Report modules in install order for reproducible diagnostics

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::container::module::{Module, ModuleState, TransitionError};

#[derive(Debug)]
struct Entry {
    seq: u64,
    module: Module,
    provides: Vec<String>,
}

/// Concurrent module registry keyed by symbolic name.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    entries: DashMap<String, Entry>,
    next_seq: AtomicU64,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a module in `INSTALLED` state. Returns false if the symbolic
    /// name is already present; the existing entry is left untouched.
    pub fn install(&self, module: Module, provides: Vec<String>) -> bool {
        if self.entries.contains_key(&module.id) {
            return false;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(module = %module.id, version = %module.version, "Module installed");
        self.entries.insert(
            module.id.clone(),
            Entry {
                seq,
                module: Module {
                    state: ModuleState::Installed,
                    ..module
                },
                provides,
            },
        );
        true
    }

    /// Snapshot of one module.
    pub fn get(&self, id: &str) -> Option<Module> {
        self.entries.get(id).map(|e| e.module.clone())
    }

    pub fn state(&self, id: &str) -> Option<ModuleState> {
        self.entries.get(id).map(|e| e.module.state)
    }

    /// Snapshots of every module, in install order.
    pub fn list(&self) -> Vec<Module> {
        let mut entries: Vec<(u64, Module)> = self
            .entries
            .iter()
            .map(|e| (e.seq, e.module.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, m)| m).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move a module to `to`, returning the previous state.
    pub fn transition(&self, id: &str, to: ModuleState) -> Result<ModuleState, TransitionError> {
        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| TransitionError::UnknownModule(id.to_string()))?;
        let from = entry.module.state;
        if !from.can_transition_to(to) {
            return Err(TransitionError::Illegal {
                id: id.to_string(),
                from,
                to,
            });
        }
        entry.module.state = to;
        tracing::trace!(module = %id, %from, %to, "Module state changed");
        Ok(from)
    }

    /// Move a module to `FAILED` and record why.
    pub fn fail(&self, id: &str, cause: impl Into<String>) -> Result<(), TransitionError> {
        let cause = cause.into();
        self.transition(id, ModuleState::Failed)?;
        tracing::warn!(module = %id, cause = %cause, "Module failed");
        self.record_failure(id, cause);
        Ok(())
    }

    /// Record a failure cause without changing state.
    pub fn record_failure(&self, id: &str, cause: impl Into<String>) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            entry.module.failure = Some(cause.into());
        }
    }

    /// First wired module, in install order, that provides `capability`.
    pub fn provider_of(&self, capability: &str) -> Option<String> {
        let mut providers: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|e| e.module.state.is_wired() && e.provides.iter().any(|p| p == capability))
            .map(|e| (e.seq, e.module.id.clone()))
            .collect();
        providers.sort_by_key(|(seq, _)| *seq);
        providers.into_iter().next().map(|(_, id)| id)
    }
}
