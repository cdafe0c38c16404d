//! Declarative deployment description.
//!
//! # Data Flow
//! ```text
//! HarnessConfig
//!     → builder.rs (DeploymentSettings + Environment lookups)
//!         → base options (site descriptor, core engine, HTTP service)
//!         → protocol options (boot injection, port, negotiation + codec)
//!         → process flags, test support
//!         → logging overrides (last, so they win)
//!     → option.rs (DeploymentSpec: ordered, immutable)
//!     → handed to ModuleContainer::boot
//! ```
//!
//! # Design Decisions
//! - Missing override configuration is a typed error, raised before boot
//! - Options are never deduplicated here; the container owns that policy

pub mod builder;
pub mod environment;
pub mod option;
pub mod presets;

pub use builder::{log_level, ConfigurationError, DeploymentSettings, DeploymentSpecBuilder, SiteDescriptor};
pub use environment::{Environment, ProcessEnvironment, StaticEnvironment};
pub use option::{Activation, DeployOption, DeploymentSpec, ModuleCoordinate, OptionKind, VersionConstraint};
