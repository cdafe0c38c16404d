//! In-process reference container.
//!
//! # Boot phases
//! ```text
//! 1. Bootstrap   injected archives → primordial boot path; process flags
//! 2. Properties  system properties, last wins; connector plan parsed
//! 3. Install     coordinate → catalog descriptor → INSTALLED
//! 4. Resolve     requirements wired + boot imports visible → RESOLVED
//! 5. Start       Start/Undefined modules, install order → ACTIVE | FAILED
//! 6. Launch      boot module binds the connector plan on the engine
//! ```
//!
//! Phases 1-3 abort the boot with a [`BootError`]. From phase 4 on, problems
//! are recorded on the module that hit them and the boot carries on, so the
//! verifiers see the whole picture.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::Level;

use crate::config::HarnessConfig;
use crate::container::catalog::{CatalogError, ModuleCatalog, ModuleDescriptor, ModuleRole};
use crate::container::loader::{ArchiveError, BootArchive, BootClasspath, CapabilityResolver, ContainerResolver};
use crate::container::module::{Module, ModuleState, TransitionError};
use crate::container::registry::ModuleRegistry;
use crate::container::{ContainerHandle, ModuleContainer};
use crate::deployment::presets::{connectors, ids, keys};
use crate::deployment::{Activation, DeployOption, ModuleCoordinate, VersionConstraint};
use crate::http::Engine;
use crate::net::tls;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_PROTOCOL_PORT: u16 = 9877;
const DEFAULT_GREETING_PATH: &str = "/greeting";
const DEFAULT_GREETING_BODY: &str = "Hello";
const DEFAULT_LOG_LEVEL: Level = Level::INFO;

/// Fatal boot problems. Nothing is left running when one is returned.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("no module in the catalog for coordinate {0}")]
    UnknownModule(ModuleCoordinate),

    #[error("module {coordinate} is available at version {found}, but {wanted} was requested")]
    VersionMismatch {
        coordinate: ModuleCoordinate,
        wanted: String,
        found: String,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("invalid value '{value}' for property {key}: {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        reason: String,
    },

    #[error("illegal module state change: {0}")]
    Transition(#[from] TransitionError),
}

/// A `flag` or `flag=value` passed to the container process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFlag {
    pub flag: String,
    pub value: Option<String>,
}

/// Connectors the boot module will bind, read from system properties.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectorPlan {
    host: String,
    http_port: u16,
    protocol_port: u16,
    connectors: Vec<String>,
    tls_cert: PathBuf,
    tls_key: PathBuf,
}

impl ConnectorPlan {
    fn from_properties(properties: &HashMap<String, String>) -> Result<Self, BootError> {
        let connectors = match properties.get(keys::CONNECTORS) {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>(),
            None => vec![connectors::HTTP.to_string()],
        };
        if let Some(unknown) = connectors
            .iter()
            .find(|c| c.as_str() != connectors::HTTP && c.as_str() != connectors::NEGOTIATED_TLS)
        {
            return Err(BootError::InvalidProperty {
                key: keys::CONNECTORS.to_string(),
                value: properties.get(keys::CONNECTORS).cloned().unwrap_or_default(),
                reason: format!("unknown connector '{}'", unknown),
            });
        }

        Ok(Self {
            host: properties
                .get(keys::HOST)
                .cloned()
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            http_port: port_property(properties, keys::HTTP_PORT, DEFAULT_HTTP_PORT)?,
            protocol_port: port_property(properties, keys::PROTOCOL_PORT, DEFAULT_PROTOCOL_PORT)?,
            connectors,
            tls_cert: properties.get(keys::TLS_CERT).map(PathBuf::from).unwrap_or_default(),
            tls_key: properties.get(keys::TLS_KEY).map(PathBuf::from).unwrap_or_default(),
        })
    }
}

fn port_property(properties: &HashMap<String, String>, key: &str, default: u16) -> Result<u16, BootError> {
    match properties.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| BootError::InvalidProperty {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Log thresholds applied inside the container, last property wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevels {
    /// Threshold for the container's own lifecycle events.
    pub container: Level,
    /// Threshold handed to the HTTP engine's request tracing.
    pub engine: Level,
}

impl LogLevels {
    fn from_properties(properties: &HashMap<String, String>) -> Result<Self, BootError> {
        Ok(Self {
            container: level_property(properties, keys::CONTAINER_LOG_LEVEL)?,
            engine: level_property(properties, keys::ENGINE_LOG_LEVEL)?,
        })
    }

    /// Whether the container emits its own events at `level`.
    pub fn container_logs(&self, level: Level) -> bool {
        level <= self.container
    }
}

impl Default for LogLevels {
    fn default() -> Self {
        Self {
            container: DEFAULT_LOG_LEVEL,
            engine: DEFAULT_LOG_LEVEL,
        }
    }
}

fn level_property(properties: &HashMap<String, String>, key: &str) -> Result<Level, BootError> {
    match properties.get(key) {
        None => Ok(DEFAULT_LOG_LEVEL),
        Some(raw) => raw.trim().parse::<Level>().map_err(|e| BootError::InvalidProperty {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

struct Planned {
    descriptor: ModuleDescriptor,
    activation: Activation,
}

/// A later `Start` upgrades an earlier reference; anything else keeps it.
fn merge_activation(earlier: Activation, later: Activation) -> Activation {
    match later {
        Activation::Start => Activation::Start,
        _ => earlier,
    }
}

/// Mutable state shared by activators during one boot.
struct Runtime<'a> {
    registry: &'a ModuleRegistry,
    plan: ConnectorPlan,
    log_levels: LogLevels,
    properties: &'a HashMap<String, String>,
    engine: Option<Engine>,
    /// Modules that import capabilities from the boot path.
    bootstraps: HashSet<String>,
    boot_module: Option<String>,
    negotiation_server: Option<String>,
}

impl Runtime<'_> {
    fn property_or(&self, key: &str, default: &str) -> String {
        self.properties
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn activate(&mut self, descriptor: &ModuleDescriptor) -> Result<(), String> {
        match descriptor.role {
            ModuleRole::Library => Ok(()),
            ModuleRole::HttpEngine => {
                if self.engine.is_none() {
                    self.engine = Some(Engine::with_log_level(self.log_levels.engine));
                }
                Ok(())
            }
            ModuleRole::HttpService => {
                let engine = self.engine.as_ref().ok_or("no HTTP engine is active")?;
                let path = self.property_or(keys::GREETING_PATH, DEFAULT_GREETING_PATH);
                let body = self.property_or(keys::GREETING_BODY, DEFAULT_GREETING_BODY);
                engine.routes().register(path, body);
                Ok(())
            }
            ModuleRole::Boot => {
                if self.engine.is_none() {
                    return Err("no HTTP engine is active".to_string());
                }
                self.boot_module = Some(descriptor.symbolic_name.clone());
                Ok(())
            }
            ModuleRole::NegotiationServer => {
                for required in descriptor.requires.iter().filter(|r| self.bootstraps.contains(*r)) {
                    match self.registry.state(required) {
                        Some(ModuleState::Active) => {}
                        state => {
                            return Err(format!(
                                "negotiation bootstrap {} is {}, expected ACTIVE",
                                required,
                                state.map_or("not installed", ModuleState::as_str)
                            ))
                        }
                    }
                }
                self.negotiation_server = Some(descriptor.symbolic_name.clone());
                Ok(())
            }
        }
    }

    /// ALPN offer for the TLS connector, in preference order.
    fn alpn_offer(&self) -> Vec<&'static str> {
        let server_active = self
            .negotiation_server
            .as_deref()
            .and_then(|id| self.registry.state(id))
            == Some(ModuleState::Active);
        let h2_library = self
            .registry
            .state(ids::H2_HTTP_SERVER)
            .is_some_and(ModuleState::is_wired);

        if server_active && h2_library {
            vec![tls::H2, tls::HTTP_1_1]
        } else {
            vec![tls::HTTP_1_1]
        }
    }

    /// Bind every planned connector. The first failure fails the boot module.
    fn launch(&mut self) -> Result<(), TransitionError> {
        let Some(boot_id) = self.boot_module.clone() else {
            tracing::warn!("No boot module is active, no connectors bound");
            return Ok(());
        };
        let alpn = self.alpn_offer();
        let plan = self.plan.clone();
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };

        for name in &plan.connectors {
            let bound = match name.as_str() {
                connectors::HTTP => engine
                    .bind_plain(name, &plan.host, plan.http_port)
                    .map_err(|e| format!("cannot bind {} connector on port {}: {}", name, plan.http_port, e)),
                _ => tls::server_config(&plan.tls_cert, &plan.tls_key, &alpn)
                    .map_err(|e| format!("cannot configure TLS for {}: {}", name, e))
                    .and_then(|config| {
                        tracing::info!(connector = %name, alpn = ?alpn, "ALPN offer");
                        engine
                            .bind_tls(name, &plan.host, plan.protocol_port, config)
                            .map_err(|e| {
                                format!("cannot bind {} connector on port {}: {}", name, plan.protocol_port, e)
                            })
                    }),
            };
            if let Err(cause) = bound {
                self.registry.fail(&boot_id, cause)?;
                break;
            }
        }
        Ok(())
    }
}

/// Boots deployments against a module catalog, in this process.
#[derive(Debug, Clone)]
pub struct LocalContainer {
    catalog: Arc<ModuleCatalog>,
}

impl LocalContainer {
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    /// Container over the catalog file named in `config`, or the built-in one.
    pub async fn from_config(config: &HarnessConfig) -> Result<Self, CatalogError> {
        let catalog = match &config.deployment.catalog_path {
            Some(path) => ModuleCatalog::read(path.clone()).await?,
            None => ModuleCatalog::builtin(),
        };
        Ok(Self::new(catalog))
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    async fn bootstrap(
        options: &[DeployOption],
        log_levels: LogLevels,
    ) -> Result<(BootClasspath, Vec<ProcessFlag>), BootError> {
        let mut boot_path = BootClasspath::new();
        let mut flags = Vec::new();
        for option in options {
            match option {
                DeployOption::BootClasspathInjection { path } => {
                    let archive = BootArchive::read(path.clone()).await?;
                    if log_levels.container_logs(Level::INFO) {
                        tracing::info!(
                            archive = %archive.name,
                            path = %path.display(),
                            "Boot archive prepended"
                        );
                    }
                    boot_path.prepend(archive);
                }
                DeployOption::ProcessFlag { flag, value } => {
                    if log_levels.container_logs(Level::DEBUG) {
                        tracing::debug!(flag = %flag, value = ?value, "Process flag");
                    }
                    flags.push(ProcessFlag {
                        flag: flag.clone(),
                        value: value.clone(),
                    });
                }
                _ => {}
            }
        }
        Ok((boot_path, flags))
    }

    fn collect_properties(options: &[DeployOption]) -> HashMap<String, String> {
        let mut properties = HashMap::new();
        for option in options {
            if let DeployOption::SystemProperty { key, value } = option {
                if let Some(previous) = properties.insert(key.clone(), value.clone()) {
                    tracing::debug!(property = %key, %previous, %value, "Property overridden");
                }
            }
        }
        properties
    }

    fn install(&self, options: &[DeployOption], registry: &ModuleRegistry) -> Result<Vec<Planned>, BootError> {
        let mut plan: Vec<Planned> = Vec::new();
        for option in options {
            let DeployOption::ModuleReference {
                coordinate,
                version,
                activation,
            } = option
            else {
                continue;
            };

            let descriptor = self
                .catalog
                .lookup(coordinate)
                .ok_or_else(|| BootError::UnknownModule(coordinate.clone()))?;
            if !version.accepts(&descriptor.version) {
                let wanted = match version {
                    VersionConstraint::Exact(v) => v.clone(),
                    VersionConstraint::AsInProject => descriptor.version.clone(),
                };
                return Err(BootError::VersionMismatch {
                    coordinate: coordinate.clone(),
                    wanted,
                    found: descriptor.version.clone(),
                });
            }

            if let Some(existing) = plan.iter_mut().find(|p| &p.descriptor.coordinate == coordinate) {
                existing.activation = merge_activation(existing.activation, *activation);
                continue;
            }

            let module = Module::new(&descriptor.symbolic_name, &descriptor.version, coordinate.clone());
            if !registry.install(module, descriptor.provides.clone()) {
                tracing::warn!(
                    module = %descriptor.symbolic_name,
                    coordinate = %coordinate,
                    "Symbolic name already installed, reference ignored"
                );
                continue;
            }
            plan.push(Planned {
                descriptor: descriptor.clone(),
                activation: *activation,
            });
        }
        Ok(plan)
    }

    /// First unmet requirement of a module, if any.
    fn unmet_requirement(
        descriptor: &ModuleDescriptor,
        registry: &ModuleRegistry,
        resolver: &ContainerResolver,
    ) -> Option<String> {
        for required in &descriptor.requires {
            match registry.state(required) {
                None => return Some(format!("missing requirement {}", required)),
                Some(state) if !state.is_wired() => {
                    return Some(format!("requirement {} is {}", required, state));
                }
                Some(_) => {}
            }
        }
        for capability in &descriptor.boot_imports {
            if resolver.resolve_boot(capability).is_none() {
                return Some(format!("{} is not visible from the primordial loader", capability));
            }
        }
        None
    }

    /// Resolve until nothing changes; record why the rest stayed installed.
    fn resolve(plan: &[Planned], registry: &ModuleRegistry, resolver: &ContainerResolver) -> Result<(), BootError> {
        loop {
            let mut progressed = false;
            for planned in plan {
                let id = &planned.descriptor.symbolic_name;
                if registry.state(id) != Some(ModuleState::Installed) {
                    continue;
                }
                if Self::unmet_requirement(&planned.descriptor, registry, resolver).is_none() {
                    registry.transition(id, ModuleState::Resolved)?;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        for planned in plan {
            let id = &planned.descriptor.symbolic_name;
            if registry.state(id) == Some(ModuleState::Installed) {
                if let Some(cause) = Self::unmet_requirement(&planned.descriptor, registry, resolver) {
                    tracing::warn!(module = %id, cause = %cause, "Module left unresolved");
                    registry.record_failure(id, cause);
                }
            }
        }
        Ok(())
    }

    fn start(plan: &[Planned], runtime: &mut Runtime<'_>) -> Result<(), BootError> {
        let registry = runtime.registry;
        for planned in plan {
            if planned.activation == Activation::NoStart {
                continue;
            }
            let id = &planned.descriptor.symbolic_name;
            match registry.state(id) {
                Some(ModuleState::Resolved) => {}
                Some(ModuleState::Installed) => {
                    let cause = match registry.get(id).and_then(|m| m.failure) {
                        Some(reason) => format!("cannot start: unresolved ({})", reason),
                        None => "cannot start: unresolved".to_string(),
                    };
                    registry.record_failure(id, cause);
                    continue;
                }
                _ => continue,
            }

            registry.transition(id, ModuleState::Starting)?;
            match runtime.activate(&planned.descriptor) {
                Ok(()) => {
                    registry.transition(id, ModuleState::Active)?;
                    if runtime.log_levels.container_logs(Level::DEBUG) {
                        tracing::debug!(module = %id, "Module active");
                    }
                }
                Err(cause) => registry.fail(id, cause)?,
            }
        }
        Ok(())
    }

    async fn boot_now(&self, options: &[DeployOption]) -> Result<RunningContainer, BootError> {
        let properties = Self::collect_properties(options);
        let log_levels = LogLevels::from_properties(&properties)?;
        let plan = ConnectorPlan::from_properties(&properties)?;
        let (boot_path, process_flags) = Self::bootstrap(options, log_levels).await?;

        let registry = Arc::new(ModuleRegistry::new());
        let resolver = ContainerResolver::new(Arc::new(boot_path), Arc::clone(&registry));

        let planned = self.install(options, &registry)?;
        Self::resolve(&planned, &registry, &resolver)?;

        let mut runtime = Runtime {
            registry: &registry,
            plan,
            log_levels,
            properties: &properties,
            engine: None,
            bootstraps: planned
                .iter()
                .filter(|p| !p.descriptor.boot_imports.is_empty())
                .map(|p| p.descriptor.symbolic_name.clone())
                .collect(),
            boot_module: None,
            negotiation_server: None,
        };
        Self::start(&planned, &mut runtime)?;
        runtime.launch()?;
        let engine = runtime.engine.take();

        if log_levels.container_logs(Level::INFO) {
            tracing::info!(
                modules = registry.len(),
                active = registry
                    .list()
                    .iter()
                    .filter(|m| m.state == ModuleState::Active)
                    .count(),
                "Container booted"
            );
        }

        Ok(RunningContainer {
            registry,
            resolver,
            properties,
            process_flags,
            log_levels,
            engine,
        })
    }
}

impl Default for LocalContainer {
    fn default() -> Self {
        Self::new(ModuleCatalog::builtin())
    }
}

impl ModuleContainer for LocalContainer {
    type Handle = RunningContainer;

    async fn boot(&self, options: &[DeployOption]) -> Result<RunningContainer, BootError> {
        self.boot_now(options).await
    }
}

/// A booted composition. Dropping it without [`shutdown`](Self::shutdown)
/// leaves connector tasks running until the runtime stops.
pub struct RunningContainer {
    registry: Arc<ModuleRegistry>,
    resolver: ContainerResolver,
    properties: HashMap<String, String>,
    process_flags: Vec<ProcessFlag>,
    log_levels: LogLevels,
    engine: Option<Engine>,
}

impl RunningContainer {
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn process_flags(&self) -> &[ProcessFlag] {
        &self.process_flags
    }

    /// Thresholds in force after last-wins property merging.
    pub fn log_levels(&self) -> LogLevels {
        self.log_levels
    }

    pub fn boot_archives(&self) -> Vec<&Path> {
        self.resolver.boot_path().archives().iter().map(|a| a.path.as_path()).collect()
    }

    /// Stop connectors, then take every module down to `UNINSTALLED`.
    pub async fn shutdown(self) {
        if let Some(engine) = self.engine {
            engine.stop().await;
        }

        let mut modules = self.registry.list();
        modules.reverse();
        for module in modules {
            let steps: &[ModuleState] = match module.state {
                ModuleState::Active => &[ModuleState::Stopping, ModuleState::Uninstalled],
                ModuleState::Uninstalled => &[],
                _ => &[ModuleState::Uninstalled],
            };
            for step in steps {
                if let Err(e) = self.registry.transition(&module.id, *step) {
                    tracing::warn!(module = %module.id, error = %e, "Module did not stop cleanly");
                    break;
                }
            }
        }
        if self.log_levels.container_logs(Level::INFO) {
            tracing::info!("Container stopped");
        }
    }
}

impl ContainerHandle for RunningContainer {
    fn list_modules(&self) -> Vec<Module> {
        self.registry.list()
    }

    fn find_module(&self, id: &str) -> Option<Module> {
        self.registry.get(id)
    }

    fn resolver(&self) -> &dyn CapabilityResolver {
        &self.resolver
    }

    fn system_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn connector_address(&self, name: &str) -> Option<SocketAddr> {
        self.engine.as_ref().and_then(|e| e.address(name))
    }
}
