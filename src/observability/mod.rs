//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Container boot, verifiers, harness run:
//!     → tracing events (module id, state, loader, failure category)
//!     → logging.rs subscriber (human-readable fmt output on stderr)
//! ```
//!
//! # Design Decisions
//! - RUST_LOG wins over the verbose flag when set
//! - Every harness run carries a run id span

pub mod logging;

pub use logging::init_logging;
