//! Probe results and the aggregate report.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::container::ModuleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Pass,
    Fail,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => f.write_str("PASS"),
            Outcome::Fail => f.write_str("FAIL"),
        }
    }
}

/// Coarse bucket a failure falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    ModuleState,
    Isolation,
    Connectivity,
    Timeout,
    Negotiation,
    Content,
}

impl FailureCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCategory::ModuleState => "module_state",
            FailureCategory::Isolation => "isolation",
            FailureCategory::Connectivity => "connectivity",
            FailureCategory::Timeout => "timeout",
            FailureCategory::Negotiation => "negotiation",
            FailureCategory::Content => "content",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum ProbeFailure {
    #[error("module not installed")]
    NotInstalled { module: String },

    #[error("module is {state}, expected {expected}{}", .cause.as_ref().map(|c| format!(" (last failure: {c})")).unwrap_or_default())]
    ModuleState {
        module: String,
        state: ModuleState,
        expected: String,
        cause: Option<String>,
    },

    #[error("{identifier} cannot be resolved from any loader")]
    IsolationNotFound { identifier: String },

    #[error("{identifier} was found in {loader}, not the primordial loader")]
    IsolationViolation { identifier: String, loader: String },

    #[error("cannot connect to {target}: {reason}")]
    Connectivity { target: String, reason: String },

    #[error("{phase} did not complete within {millis}ms")]
    Timeout { phase: String, millis: u64 },

    #[error("TLS handshake failed: {reason}")]
    Negotiation { reason: String },

    #[error("negotiated {negotiated}, expected {expected}")]
    ProtocolMismatch { expected: String, negotiated: String },

    #[error("server answered status {status}")]
    Status { status: u16 },

    #[error("body mismatch: expected {expected:?}, got {actual:?}")]
    ContentMismatch { expected: String, actual: String },
}

impl ProbeFailure {
    pub fn category(&self) -> FailureCategory {
        match self {
            ProbeFailure::NotInstalled { .. } | ProbeFailure::ModuleState { .. } => FailureCategory::ModuleState,
            ProbeFailure::IsolationNotFound { .. } | ProbeFailure::IsolationViolation { .. } => {
                FailureCategory::Isolation
            }
            ProbeFailure::Connectivity { .. } => FailureCategory::Connectivity,
            ProbeFailure::Timeout { .. } => FailureCategory::Timeout,
            ProbeFailure::Negotiation { .. } | ProbeFailure::ProtocolMismatch { .. } => FailureCategory::Negotiation,
            ProbeFailure::Status { .. } | ProbeFailure::ContentMismatch { .. } => FailureCategory::Content,
        }
    }
}

/// Verdict of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub name: String,
    pub outcome: Outcome,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ProbeFailure>,
}

impl ProbeResult {
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Pass,
            detail: detail.into(),
            failure: None,
        }
    }

    /// Failed result whose detail leads with the failure category.
    pub fn fail(name: impl Into<String>, failure: ProbeFailure) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Fail,
            detail: format!("[{}] {}", failure.category(), failure),
            failure: Some(failure),
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }

    pub fn category(&self) -> Option<FailureCategory> {
        self.failure.as_ref().map(ProbeFailure::category)
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.outcome, self.name, self.detail)
    }
}

/// Every result of one run, in reporting order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub results: Vec<ProbeResult>,
}

impl VerificationReport {
    pub fn new(results: Vec<ProbeResult>) -> Self {
        Self { results }
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = ProbeResult>) {
        self.results.extend(results);
    }

    /// Pass iff every result passed. An empty report passes.
    pub fn verdict(&self) -> Outcome {
        if self.results.iter().all(ProbeResult::passed) {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    /// Process exit code: 0 on pass, 1 on any failure.
    pub fn exit_code(&self) -> u8 {
        match self.verdict() {
            Outcome::Pass => 0,
            Outcome::Fail => 1,
        }
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{}", result)?;
        }
        let failed = self.failures().count();
        write!(
            f,
            "{}: {} checks, {} failed",
            self.verdict(),
            self.results.len(),
            failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_detail_names_category() {
        let result = ProbeResult::fail(
            "live negotiation",
            ProbeFailure::ProtocolMismatch {
                expected: "h2".into(),
                negotiated: "http/1.1".into(),
            },
        );
        assert_eq!(result.detail, "[negotiation] negotiated http/1.1, expected h2");
        assert_eq!(result.category(), Some(FailureCategory::Negotiation));
    }

    #[test]
    fn module_state_detail_carries_cause() {
        let failure = ProbeFailure::ModuleState {
            module: "b".into(),
            state: ModuleState::Failed,
            expected: "ACTIVE".into(),
            cause: Some("activator error".into()),
        };
        assert_eq!(
            failure.to_string(),
            "module is FAILED, expected ACTIVE (last failure: activator error)"
        );
    }

    #[test]
    fn one_failure_fails_the_report() {
        let mut report = VerificationReport::default();
        assert_eq!(report.verdict(), Outcome::Pass);
        assert_eq!(report.exit_code(), 0);

        report.extend([
            ProbeResult::pass("a", "ACTIVE"),
            ProbeResult::fail("b", ProbeFailure::Status { status: 503 }),
        ]);
        assert_eq!(report.verdict(), Outcome::Fail);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failures().count(), 1);
        assert!(report.to_string().ends_with("FAIL: 2 checks, 1 failed"));
    }

    #[test]
    fn categories_are_distinct_per_probe_stage() {
        let categories = [
            ProbeFailure::Connectivity {
                target: "localhost:1".into(),
                reason: "refused".into(),
            }
            .category(),
            ProbeFailure::Timeout {
                phase: "connect".into(),
                millis: 10,
            }
            .category(),
            ProbeFailure::Negotiation { reason: "alert".into() }.category(),
            ProbeFailure::ContentMismatch {
                expected: "Hello".into(),
                actual: "Hi".into(),
            }
            .category(),
        ];
        let unique: std::collections::HashSet<_> = categories.iter().collect();
        assert_eq!(unique.len(), categories.len());
    }
}
