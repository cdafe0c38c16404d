//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HarnessConfig (validated, immutable)
//!     → handed to the deployment builder, container and probes of one run
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded and scoped to a single run
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::HarnessConfig;
pub use schema::ProbeConfig;
pub use schema::ProtocolConfig;
pub use schema::RequiredModuleConfig;
pub use schema::RequiredState;
pub use schema::SiteConfig;
pub use schema::TimeoutConfig;
pub use schema::TlsConfig;
