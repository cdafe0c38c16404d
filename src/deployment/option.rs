//! Declarative deployment directives.
//!
//! A [`DeploymentSpec`] is an ordered list of [`DeployOption`]s. The
//! container interprets them; nothing here deduplicates or reorders.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discriminant of a [`DeployOption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionKind {
    ModuleReference,
    SystemProperty,
    BootClasspathInjection,
    ProcessFlag,
}

/// Whether a referenced module is started right after install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Start,
    NoStart,
    /// Container default applies.
    #[default]
    Undefined,
}

/// Version requirement of a module reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionConstraint {
    /// Whatever version the container's catalog carries.
    #[default]
    AsInProject,
    Exact(String),
}

impl VersionConstraint {
    /// Check a concrete version against this constraint.
    pub fn accepts(&self, version: &str) -> bool {
        match self {
            VersionConstraint::AsInProject => true,
            VersionConstraint::Exact(wanted) => wanted == version,
        }
    }
}

/// `group:artifact` coordinate of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleCoordinate {
    group: String,
    artifact: String,
}

impl ModuleCoordinate {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }
}

impl fmt::Display for ModuleCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

/// Error returned when a coordinate string is not `group:artifact`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid module coordinate '{0}', expected group:artifact")]
pub struct InvalidCoordinate(pub String);

impl FromStr for ModuleCoordinate {
    type Err = InvalidCoordinate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((group, artifact))
                if !group.is_empty() && !artifact.is_empty() && !artifact.contains(':') =>
            {
                Ok(Self::new(group, artifact))
            }
            _ => Err(InvalidCoordinate(s.to_string())),
        }
    }
}

impl TryFrom<String> for ModuleCoordinate {
    type Error = InvalidCoordinate;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleCoordinate> for String {
    fn from(value: ModuleCoordinate) -> Self {
        value.to_string()
    }
}

/// One atomic directive describing desired runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeployOption {
    ModuleReference {
        coordinate: ModuleCoordinate,
        version: VersionConstraint,
        activation: Activation,
    },
    SystemProperty {
        key: String,
        value: String,
    },
    /// Prepend an archive to the primordial boot path, not the module path.
    BootClasspathInjection {
        path: PathBuf,
    },
    ProcessFlag {
        flag: String,
        value: Option<String>,
    },
}

impl DeployOption {
    /// Reference a module at the catalog's version.
    pub fn module(coordinate: ModuleCoordinate, activation: Activation) -> Self {
        DeployOption::ModuleReference {
            coordinate,
            version: VersionConstraint::AsInProject,
            activation,
        }
    }

    pub fn system_property(key: impl Into<String>, value: impl ToString) -> Self {
        DeployOption::SystemProperty {
            key: key.into(),
            value: value.to_string(),
        }
    }

    pub fn boot_classpath(path: impl Into<PathBuf>) -> Self {
        DeployOption::BootClasspathInjection { path: path.into() }
    }

    /// Parse `flag` or `flag=value`.
    pub fn process_flag(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((flag, value)) => DeployOption::ProcessFlag {
                flag: flag.to_string(),
                value: Some(value.to_string()),
            },
            None => DeployOption::ProcessFlag {
                flag: raw.to_string(),
                value: None,
            },
        }
    }

    pub fn kind(&self) -> OptionKind {
        match self {
            DeployOption::ModuleReference { .. } => OptionKind::ModuleReference,
            DeployOption::SystemProperty { .. } => OptionKind::SystemProperty,
            DeployOption::BootClasspathInjection { .. } => OptionKind::BootClasspathInjection,
            DeployOption::ProcessFlag { .. } => OptionKind::ProcessFlag,
        }
    }

    /// Identifier of the directive: coordinate, property name or flag name.
    pub fn key(&self) -> String {
        match self {
            DeployOption::ModuleReference { coordinate, .. } => coordinate.to_string(),
            DeployOption::SystemProperty { key, .. } => key.clone(),
            DeployOption::BootClasspathInjection { .. } => "bootclasspath".to_string(),
            DeployOption::ProcessFlag { flag, .. } => flag.clone(),
        }
    }

    /// Builder-style version pin for module references. No-op otherwise.
    pub fn with_version(mut self, wanted: impl Into<String>) -> Self {
        if let DeployOption::ModuleReference { version, .. } = &mut self {
            *version = VersionConstraint::Exact(wanted.into());
        }
        self
    }
}

impl fmt::Display for DeployOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployOption::ModuleReference {
                coordinate,
                version,
                activation,
            } => {
                let version = match version {
                    VersionConstraint::AsInProject => "as-in-project",
                    VersionConstraint::Exact(v) => v.as_str(),
                };
                write!(f, "module {} [{}] {:?}", coordinate, version, activation)
            }
            DeployOption::SystemProperty { key, value } => write!(f, "property {}={}", key, value),
            DeployOption::BootClasspathInjection { path } => {
                write!(f, "bootclasspath/p {}", path.display())
            }
            DeployOption::ProcessFlag { flag, value: None } => write!(f, "flag {}", flag),
            DeployOption::ProcessFlag {
                flag,
                value: Some(value),
            } => write!(f, "flag {}={}", flag, value),
        }
    }
}

/// The complete ordered option sequence for one deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentSpec {
    options: Vec<DeployOption>,
}

impl DeploymentSpec {
    pub fn new(options: Vec<DeployOption>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &[DeployOption] {
        &self.options
    }

    pub fn into_options(self) -> Vec<DeployOption> {
        self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Boot path injections in option order.
    pub fn boot_classpath(&self) -> Vec<&Path> {
        self.options
            .iter()
            .filter_map(|o| match o {
                DeployOption::BootClasspathInjection { path } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    /// Last value bound to a system property.
    pub fn system_property(&self, wanted: &str) -> Option<&str> {
        self.options.iter().rev().find_map(|o| match o {
            DeployOption::SystemProperty { key, value } if key == wanted => Some(value.as_str()),
            _ => None,
        })
    }

    /// Activation of the first reference to a coordinate.
    pub fn activation_of(&self, wanted: &ModuleCoordinate) -> Option<Activation> {
        self.options.iter().find_map(|o| match o {
            DeployOption::ModuleReference {
                coordinate,
                activation,
                ..
            } if coordinate == wanted => Some(*activation),
            _ => None,
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_parses_group_and_artifact() {
        let c: ModuleCoordinate = "net.composer.h2:h2-client".parse().unwrap();
        assert_eq!(c.group(), "net.composer.h2");
        assert_eq!(c.artifact(), "h2-client");
        assert_eq!(c.to_string(), "net.composer.h2:h2-client");
    }

    #[test]
    fn coordinate_rejects_malformed_input() {
        for raw in ["", "no-colon", ":artifact", "group:", "a:b:c"] {
            assert!(raw.parse::<ModuleCoordinate>().is_err(), "{raw}");
        }
    }

    #[test]
    fn process_flag_splits_value() {
        assert_eq!(
            DeployOption::process_flag("-Xmx512m"),
            DeployOption::ProcessFlag {
                flag: "-Xmx512m".into(),
                value: None
            }
        );
        assert_eq!(
            DeployOption::process_flag("trace=modules"),
            DeployOption::ProcessFlag {
                flag: "trace".into(),
                value: Some("modules".into())
            }
        );
    }

    #[test]
    fn duplicates_are_kept_and_last_property_wins() {
        let spec = DeploymentSpec::new(vec![
            DeployOption::system_property("engine.log.level", "WARN"),
            DeployOption::system_property("engine.log.level", "INFO"),
        ]);
        assert_eq!(spec.len(), 2);
        assert_eq!(spec.system_property("engine.log.level"), Some("INFO"));
    }

    #[test]
    fn version_pin_applies_to_module_references() {
        let coordinate = ModuleCoordinate::new("g", "a");
        let option = DeployOption::module(coordinate, Activation::Start).with_version("2.0.0");
        match option {
            DeployOption::ModuleReference { version, .. } => {
                assert!(version.accepts("2.0.0"));
                assert!(!version.accepts("1.0.0"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn serializes_as_tagged_json() {
        let option = DeployOption::system_property("server.protocol.port", 9877);
        let json = serde_json::to_value(&option).unwrap();
        assert_eq!(json["kind"], "system_property");
        assert_eq!(json["value"], "9877");
    }
}
