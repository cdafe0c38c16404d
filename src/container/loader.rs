//! Capability resolution scopes.
//!
//! Two kinds of scope exist. The primordial scope is fed by archives
//! injected on the boot path before any module is installed; it has no
//! parent. Every wired module has its own scope whose parent is the
//! primordial one. Resolution is parent-first: the boot path is searched
//! before any module.
//!
//! A boot archive is a TOML manifest:
//! ```toml
//! name = "negotiation-boot"
//! version = "8.1.0"
//! provides = ["net.composer.negotiation.Negotiator"]
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::container::registry::ModuleRegistry;

/// A scope that defines capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum LoaderScope {
    /// The boot path. Not revocable, visible to everything.
    Primordial,
    /// An isolated per-module scope.
    Module { id: String },
}

impl LoaderScope {
    /// Delegation parent. `None` only for the primordial scope.
    pub fn parent(&self) -> Option<LoaderScope> {
        match self {
            LoaderScope::Primordial => None,
            LoaderScope::Module { .. } => Some(LoaderScope::Primordial),
        }
    }

    pub fn is_primordial(&self) -> bool {
        self.parent().is_none()
    }
}

impl fmt::Display for LoaderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderScope::Primordial => f.write_str("primordial loader"),
            LoaderScope::Module { id } => write!(f, "module loader {}", id),
        }
    }
}

/// Where a capability was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCapability {
    pub identifier: String,
    pub scope: LoaderScope,
    /// Archive path or module id that defines it.
    pub origin: String,
}

/// Module-aware capability lookup.
pub trait CapabilityResolver: Send + Sync {
    fn resolve(&self, identifier: &str) -> Option<ResolvedCapability>;
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read boot archive {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("boot archive {} is not a valid manifest: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ArchiveManifest {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    provides: Vec<String>,
}

/// An archive loaded onto the boot path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootArchive {
    pub path: PathBuf,
    pub name: String,
    pub version: Option<String>,
    pub provides: Vec<String>,
}

impl BootArchive {
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let content = fs::read_to_string(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: ArchiveManifest =
            toml::from_str(&content).map_err(|source| ArchiveError::Manifest {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            name: manifest.name,
            version: manifest.version,
            provides: manifest.provides,
        })
    }

    /// [`load`](Self::load) on the blocking pool, so the caller can be cancelled.
    pub async fn read(path: PathBuf) -> Result<Self, ArchiveError> {
        let joined = path.clone();
        tokio::task::spawn_blocking(move || Self::load(&path))
            .await
            .map_err(|e| ArchiveError::Io {
                path: joined,
                source: std::io::Error::other(e),
            })?
    }

    pub fn defines(&self, identifier: &str) -> bool {
        self.provides.iter().any(|p| p == identifier)
    }
}

/// Archives on the primordial boot path, in search order.
#[derive(Debug, Clone, Default)]
pub struct BootClasspath {
    archives: Vec<BootArchive>,
}

impl BootClasspath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an archive in front of everything already on the path.
    pub fn prepend(&mut self, archive: BootArchive) {
        self.archives.insert(0, archive);
    }

    pub fn archives(&self) -> &[BootArchive] {
        &self.archives
    }

    pub fn resolve(&self, identifier: &str) -> Option<ResolvedCapability> {
        self.archives
            .iter()
            .find(|a| a.defines(identifier))
            .map(|a| ResolvedCapability {
                identifier: identifier.to_string(),
                scope: LoaderScope::Primordial,
                origin: a.path.display().to_string(),
            })
    }
}

/// Parent-first resolver over the boot path and the live module registry.
#[derive(Debug, Clone)]
pub struct ContainerResolver {
    boot: Arc<BootClasspath>,
    registry: Arc<ModuleRegistry>,
}

impl ContainerResolver {
    pub fn new(boot: Arc<BootClasspath>, registry: Arc<ModuleRegistry>) -> Self {
        Self { boot, registry }
    }

    pub fn boot_path(&self) -> &BootClasspath {
        &self.boot
    }

    /// Lookup restricted to the primordial scope.
    pub fn resolve_boot(&self, identifier: &str) -> Option<ResolvedCapability> {
        self.boot.resolve(identifier)
    }
}

impl CapabilityResolver for ContainerResolver {
    fn resolve(&self, identifier: &str) -> Option<ResolvedCapability> {
        self.boot.resolve(identifier).or_else(|| {
            self.registry
                .provider_of(identifier)
                .map(|id| ResolvedCapability {
                    identifier: identifier.to_string(),
                    scope: LoaderScope::Module { id: id.clone() },
                    origin: id,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::module::{Module, ModuleState};
    use crate::deployment::ModuleCoordinate;

    fn archive(name: &str, provides: &[&str]) -> BootArchive {
        BootArchive {
            path: PathBuf::from(format!("/boot/{name}.toml")),
            name: name.to_string(),
            version: None,
            provides: provides.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn only_the_primordial_scope_has_no_parent() {
        assert!(LoaderScope::Primordial.is_primordial());
        let module = LoaderScope::Module { id: "m".into() };
        assert_eq!(module.parent(), Some(LoaderScope::Primordial));
        assert_eq!(module.to_string(), "module loader m");
    }

    #[test]
    fn later_injections_are_searched_first() {
        let mut boot = BootClasspath::new();
        boot.prepend(archive("first", &["cap"]));
        boot.prepend(archive("second", &["cap"]));

        let found = boot.resolve("cap").unwrap();
        assert_eq!(found.origin, "/boot/second.toml");
        assert_eq!(found.scope, LoaderScope::Primordial);
    }

    #[test]
    fn boot_path_wins_over_module_scope() {
        let registry = Arc::new(ModuleRegistry::new());
        registry.install(
            Module::new("shim", "1.0.0", ModuleCoordinate::new("g", "shim")),
            vec!["cap".into()],
        );
        registry.transition("shim", ModuleState::Resolved).unwrap();

        let mut boot = BootClasspath::new();
        let module_only = ContainerResolver::new(Arc::new(boot.clone()), registry.clone());
        assert_eq!(
            module_only.resolve("cap").unwrap().scope,
            LoaderScope::Module { id: "shim".into() }
        );
        assert!(module_only.resolve_boot("cap").is_none());

        boot.prepend(archive("negotiation", &["cap"]));
        let resolver = ContainerResolver::new(Arc::new(boot), registry);
        assert_eq!(resolver.resolve("cap").unwrap().scope, LoaderScope::Primordial);
        assert!(resolver.resolve("other").is_none());
    }

    #[test]
    fn archive_manifest_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("negotiation.toml");
        fs::write(&path, "name = \"negotiation-boot\"\nprovides = [\"cap\"]\n").unwrap();

        let archive = BootArchive::load(&path).unwrap();
        assert_eq!(archive.name, "negotiation-boot");
        assert!(archive.defines("cap"));

        fs::write(&path, "not toml [").unwrap();
        assert!(matches!(
            BootArchive::load(&path),
            Err(ArchiveError::Manifest { .. })
        ));
        assert!(matches!(
            BootArchive::load(&dir.path().join("missing.toml")),
            Err(ArchiveError::Io { .. })
        ));
    }
}
