//! Module catalog: what each coordinate installs.
//!
//! A catalog file is TOML:
//! ```toml
//! [[module]]
//! coordinate = "net.composer.engine:engine-server"
//! symbolic_name = "net.composer.engine.server"
//! version = "1.0.0"
//! role = "http_engine"
//! requires = ["net.composer.engine.http"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::schema::DEFAULT_NEGOTIATION_CAPABILITY;
use crate::deployment::presets::{self, ids};
use crate::deployment::ModuleCoordinate;

/// Version carried by every built-in module.
pub const BUILTIN_VERSION: &str = "1.0.0";

/// What a module does when started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleRole {
    /// Passive code; starting it only flips the state.
    #[default]
    Library,
    /// Creates the shared route table.
    HttpEngine,
    /// Reads the connector plan from system properties.
    Boot,
    /// Publishes the greeting resource on the engine.
    HttpService,
    /// Enables `h2` advertisement on the TLS connector.
    NegotiationServer,
}

/// Static description of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub coordinate: ModuleCoordinate,
    pub symbolic_name: String,
    pub version: String,
    #[serde(default)]
    pub role: ModuleRole,
    /// Symbolic names that must resolve first.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Capabilities served from this module's own scope.
    #[serde(default)]
    pub provides: Vec<String>,
    /// Capabilities that must be visible from the boot scope.
    #[serde(default)]
    pub boot_imports: Vec<String>,
}

impl ModuleDescriptor {
    fn builtin(group: &str, artifact: &str, symbolic_name: &str, role: ModuleRole) -> Self {
        Self {
            coordinate: ModuleCoordinate::new(group, artifact),
            symbolic_name: symbolic_name.to_string(),
            version: BUILTIN_VERSION.to_string(),
            role,
            requires: Vec::new(),
            provides: Vec::new(),
            boot_imports: Vec::new(),
        }
    }

    fn requires(mut self, ids: &[&str]) -> Self {
        self.requires = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    fn provides(mut self, capabilities: &[&str]) -> Self {
        self.provides = capabilities.iter().map(|s| s.to_string()).collect();
        self
    }

    fn boot_imports(mut self, capabilities: &[&str]) -> Self {
        self.boot_imports = capabilities.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("coordinate {0} is listed more than once")]
    DuplicateCoordinate(ModuleCoordinate),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "module")]
    modules: Vec<ModuleDescriptor>,
}

/// Coordinate-indexed module descriptors.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: Vec<ModuleDescriptor>,
}

impl ModuleCatalog {
    pub fn new(modules: Vec<ModuleDescriptor>) -> Result<Self, CatalogError> {
        for (i, module) in modules.iter().enumerate() {
            if modules[..i].iter().any(|m| m.coordinate == module.coordinate) {
                return Err(CatalogError::DuplicateCoordinate(module.coordinate.clone()));
            }
        }
        Ok(Self { modules })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::new(file.modules)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// [`load`](Self::load) on the blocking pool.
    pub async fn read(path: PathBuf) -> Result<Self, CatalogError> {
        let shown = path.display().to_string();
        tokio::task::spawn_blocking(move || Self::load(&path))
            .await
            .map_err(|e| CatalogError::Io {
                path: shown,
                source: std::io::Error::other(e),
            })?
    }

    pub fn lookup(&self, coordinate: &ModuleCoordinate) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|m| &m.coordinate == coordinate)
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    /// Catalog of every module the presets reference, plus the shim.
    pub fn builtin() -> Self {
        use ModuleRole::*;

        let cap = DEFAULT_NEGOTIATION_CAPABILITY;
        let modules = vec![
            ModuleDescriptor::builtin(presets::ENGINE_GROUP, "engine-util", ids::ENGINE_UTIL, Library),
            ModuleDescriptor::builtin(presets::ENGINE_GROUP, "engine-io", ids::ENGINE_IO, Library)
                .requires(&[ids::ENGINE_UTIL]),
            ModuleDescriptor::builtin(presets::ENGINE_GROUP, "engine-http", ids::ENGINE_HTTP, Library)
                .requires(&[ids::ENGINE_UTIL, ids::ENGINE_IO]),
            ModuleDescriptor::builtin(presets::ENGINE_GROUP, "engine-server", ids::ENGINE_SERVER, HttpEngine)
                .requires(&[ids::ENGINE_UTIL, ids::ENGINE_IO, ids::ENGINE_HTTP]),
            ModuleDescriptor::builtin(presets::BOOT_GROUP, "module-boot", ids::BOOT, Boot)
                .requires(&[ids::ENGINE_SERVER]),
            ModuleDescriptor::builtin(presets::SERVICE_GROUP, "http-service", ids::HTTP_SERVICE, HttpService)
                .requires(&[ids::ENGINE_SERVER]),
            ModuleDescriptor::builtin(presets::NEGOTIATION_GROUP, "negotiation-boot", ids::NEGOTIATION_BOOT, Library)
                .boot_imports(&[cap]),
            ModuleDescriptor::builtin(
                presets::NEGOTIATION_GROUP,
                "negotiation-server",
                ids::NEGOTIATION_SERVER,
                NegotiationServer,
            )
            .requires(&[ids::NEGOTIATION_BOOT, ids::ENGINE_SERVER]),
            ModuleDescriptor::builtin(presets::NEGOTIATION_GROUP, "negotiation-shim", ids::NEGOTIATION_SHIM, Library)
                .provides(&[cap]),
            ModuleDescriptor::builtin(presets::H2_GROUP, "h2-core", ids::H2_CORE, Library),
            ModuleDescriptor::builtin(presets::H2_GROUP, "h2-client", ids::H2_CLIENT, Library)
                .requires(&[ids::H2_CORE]),
            ModuleDescriptor::builtin(presets::H2_GROUP, "h2-server", ids::H2_SERVER, Library)
                .requires(&[ids::H2_CORE]),
            ModuleDescriptor::builtin(presets::H2_GROUP, "h2-http-common", ids::H2_HTTP_COMMON, Library)
                .requires(&[ids::H2_CORE]),
            ModuleDescriptor::builtin(presets::H2_GROUP, "h2-http-server", ids::H2_HTTP_SERVER, Library)
                .requires(&[ids::H2_SERVER, ids::H2_HTTP_COMMON, ids::ENGINE_SERVER]),
            ModuleDescriptor::builtin(presets::TEST_GROUP, "probe-support", ids::TEST_SUPPORT, Library),
        ];
        Self { modules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::{presets, DeployOption};

    #[test]
    fn builtin_covers_every_preset_reference() {
        let catalog = ModuleCatalog::builtin();
        let references = presets::core_dependencies()
            .into_iter()
            .chain(presets::http_service())
            .chain(presets::protocol_modules())
            .chain(presets::test_support())
            .chain(std::iter::once(presets::negotiation_shim()));

        for option in references {
            if let DeployOption::ModuleReference { coordinate, .. } = option {
                assert!(catalog.lookup(&coordinate).is_some(), "{coordinate}");
            }
        }
        assert!(ModuleCatalog::new(catalog.modules().to_vec()).is_ok());
    }

    #[test]
    fn parses_catalog_file() {
        let catalog = ModuleCatalog::from_toml_str(
            r#"
            [[module]]
            coordinate = "acme:engine"
            symbolic_name = "acme.engine"
            version = "3.1.0"
            role = "http_engine"

            [[module]]
            coordinate = "acme:alpn"
            symbolic_name = "acme.alpn"
            version = "3.1.0"
            requires = ["acme.engine"]
            boot_imports = ["acme.alpn.Provider"]
            "#,
        )
        .unwrap();

        let alpn = catalog.lookup(&ModuleCoordinate::new("acme", "alpn")).unwrap();
        assert_eq!(alpn.role, ModuleRole::Library);
        assert_eq!(alpn.requires, vec!["acme.engine"]);
        assert_eq!(alpn.boot_imports, vec!["acme.alpn.Provider"]);
        assert_eq!(
            catalog.lookup(&ModuleCoordinate::new("acme", "engine")).unwrap().role,
            ModuleRole::HttpEngine
        );
    }

    #[test]
    fn rejects_duplicate_coordinates() {
        let err = ModuleCatalog::from_toml_str(
            r#"
            [[module]]
            coordinate = "acme:engine"
            symbolic_name = "acme.engine"
            version = "1"

            [[module]]
            coordinate = "acme:engine"
            symbolic_name = "acme.engine2"
            version = "2"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCoordinate(_)));
    }

    #[test]
    fn rejects_malformed_coordinates() {
        let err = ModuleCatalog::from_toml_str(
            r#"
            [[module]]
            coordinate = "no-colon"
            symbolic_name = "x"
            version = "1"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }
}
