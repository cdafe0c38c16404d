//! Composition harness library.
//!
//! Describes a modular server deployment as an ordered option list, boots it
//! in a module container and verifies the result structurally (module
//! lifecycle states) and functionally (negotiated TLS protocol and a real
//! request).

// Core subsystems
pub mod config;
pub mod container;
pub mod deployment;
pub mod harness;
pub mod verify;

// Collaborators
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::HarnessConfig;
pub use harness::{Checks, Harness, HarnessError};
pub use verify::{Outcome, ProbeResult, VerificationReport};
