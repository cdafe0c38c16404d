//! Module snapshots and the lifecycle state machine.
//!
//! # States
//! ```text
//! INSTALLED → RESOLVED → STARTING → ACTIVE
//!                                     ↓
//!                                  STOPPING → UNINSTALLED
//!
//! any non-terminal state → FAILED → UNINSTALLED
//! INSTALLED | RESOLVED → UNINSTALLED
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::deployment::ModuleCoordinate;

/// Lifecycle state of an installed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleState {
    Installed,
    Resolved,
    Starting,
    Active,
    Stopping,
    Uninstalled,
    Failed,
}

impl ModuleState {
    /// Whether the state machine allows `self → next`.
    pub fn can_transition_to(self, next: ModuleState) -> bool {
        use ModuleState::*;

        match (self, next) {
            (Uninstalled, _) => false,
            (Failed, Failed) => false,
            (_, Failed) => true,
            (Installed, Resolved | Uninstalled) => true,
            (Resolved, Starting | Uninstalled) => true,
            (Starting, Active) => true,
            (Active, Stopping) => true,
            (Stopping, Uninstalled | Resolved) => true,
            (Failed, Uninstalled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleState::Installed => "INSTALLED",
            ModuleState::Resolved => "RESOLVED",
            ModuleState::Starting => "STARTING",
            ModuleState::Active => "ACTIVE",
            ModuleState::Stopping => "STOPPING",
            ModuleState::Uninstalled => "UNINSTALLED",
            ModuleState::Failed => "FAILED",
        }
    }

    /// Resolved modules may serve classes and capabilities to others.
    pub fn is_wired(self) -> bool {
        matches!(
            self,
            ModuleState::Resolved | ModuleState::Starting | ModuleState::Active
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("module '{0}' is not installed")]
    UnknownModule(String),

    #[error("module '{id}' cannot move from {from} to {to}")]
    Illegal {
        id: String,
        from: ModuleState,
        to: ModuleState,
    },
}

/// Read-only view of an installed module at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    /// Symbolic name.
    pub id: String,
    pub version: String,
    pub state: ModuleState,
    pub coordinate: ModuleCoordinate,
    /// Last recorded resolution or activation failure.
    pub failure: Option<String>,
}

impl Module {
    pub fn new(id: impl Into<String>, version: impl Into<String>, coordinate: ModuleCoordinate) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            state: ModuleState::Installed,
            coordinate,
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ModuleState::*;
    use super::*;

    #[test]
    fn happy_path_is_allowed() {
        for (from, to) in [
            (Installed, Resolved),
            (Resolved, Starting),
            (Starting, Active),
            (Active, Stopping),
            (Stopping, Uninstalled),
        ] {
            assert!(from.can_transition_to(to), "{from} -> {to}");
        }
    }

    #[test]
    fn every_live_state_can_fail() {
        for state in [Installed, Resolved, Starting, Active, Stopping] {
            assert!(state.can_transition_to(Failed), "{state}");
        }
        assert!(!Failed.can_transition_to(Failed));
        assert!(!Uninstalled.can_transition_to(Failed));
    }

    #[test]
    fn skipping_states_is_rejected() {
        assert!(!Installed.can_transition_to(Active));
        assert!(!Installed.can_transition_to(Starting));
        assert!(!Resolved.can_transition_to(Active));
        assert!(!Active.can_transition_to(Uninstalled));
        assert!(!Uninstalled.can_transition_to(Installed));
    }

    #[test]
    fn states_render_upper_case() {
        assert_eq!(Failed.to_string(), "FAILED");
        assert_eq!(serde_json::to_value(Active).unwrap(), "ACTIVE");
    }
}
