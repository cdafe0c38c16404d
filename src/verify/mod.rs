//! Post-boot verification.
//!
//! # Data Flow
//! ```text
//! ContainerHandle (read-only)
//!     → lifecycle.rs (named diagnoses, then full module scan)
//!     → negotiation.rs (boot isolation, then live TLS request)
//!     → result.rs (ProbeResult sequence → VerificationReport → verdict)
//! ```
//!
//! # Design Decisions
//! - Verifiers never mutate the container
//! - Every result is collected; nothing short-circuits after boot

pub mod lifecycle;
pub mod negotiation;
pub mod result;

pub use lifecycle::LifecycleVerifier;
pub use negotiation::{NegotiationTarget, ProbeTimeouts, ProtocolNegotiationProbe};
pub use result::{FailureCategory, Outcome, ProbeFailure, ProbeResult, VerificationReport};
