//! Module container subsystem.
//!
//! # Data Flow
//! ```text
//! [DeployOption]
//!     → local.rs (bootstrap: boot archives, properties, flags)
//!         → registry.rs (install, resolve, start; state machine in module.rs)
//!         → catalog.rs (coordinate → descriptor, role, requirements)
//!         → loader.rs (primordial and per-module scopes)
//!     → RunningContainer (queryable handle, connectors bound)
//! ```
//!
//! # Design Decisions
//! - Verifiers only see the read-only [`ContainerHandle`] surface
//! - Module state is re-read from the registry on every query
//! - Post-install problems are recorded on modules, not returned as errors

use std::future::Future;
use std::net::SocketAddr;

use crate::deployment::DeployOption;

pub mod catalog;
pub mod loader;
pub mod local;
pub mod module;
pub mod registry;

pub use catalog::{ModuleCatalog, ModuleDescriptor, ModuleRole};
pub use loader::{CapabilityResolver, LoaderScope, ResolvedCapability};
pub use local::{BootError, LocalContainer, ProcessFlag, RunningContainer};
pub use module::{Module, ModuleState};
pub use registry::ModuleRegistry;

/// Read-only view of a booted container.
pub trait ContainerHandle: Send + Sync {
    /// Every installed module, in install order.
    fn list_modules(&self) -> Vec<Module>;

    fn find_module(&self, id: &str) -> Option<Module>;

    /// Module-aware capability resolver.
    fn resolver(&self) -> &dyn CapabilityResolver;

    /// Effective value of a system property after last-wins merging.
    fn system_property(&self, key: &str) -> Option<String>;

    /// Bound address of a named connector, if it is listening.
    fn connector_address(&self, name: &str) -> Option<SocketAddr>;
}

/// Something that can turn an option list into a running composition.
pub trait ModuleContainer {
    type Handle: ContainerHandle;

    fn boot(&self, options: &[DeployOption]) -> impl Future<Output = Result<Self::Handle, BootError>> + Send;
}
