//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Boot (container/local.rs):
//!     Deployment options → Install → Resolve → Start → Bind connectors
//!
//! Teardown (shutdown.rs):
//!     Trigger → Connectors stop accepting → Drain → Modules uninstalled
//! ```
//!
//! # Design Decisions
//! - Ordered teardown: connectors first, then module states
//! - TLS connectors get a bounded drain period

pub mod shutdown;

pub use shutdown::Shutdown;
