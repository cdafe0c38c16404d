//! Environment lookups used while building a deployment.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Named lookups and file existence checks.
pub trait Environment: Send + Sync {
    /// Value bound to `key`, if any.
    fn lookup(&self, key: &str) -> Option<String>;

    /// Whether `path` exists.
    fn exists(&self, path: &Path) -> bool;
}

/// The real process environment and filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl ProcessEnvironment {
    pub fn new() -> Self {
        Self
    }
}

impl Environment for ProcessEnvironment {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Fully in-memory environment.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    vars: HashMap<String, String>,
    files: HashSet<PathBuf>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(path.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn lookup(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_environment_reads_variables_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let env = ProcessEnvironment::new();
        assert!(env.exists(dir.path()));
        assert!(!env.exists(&dir.path().join("absent.toml")));
        assert!(env.lookup("COMPOSITION_HARNESS_SURELY_UNSET").is_none());
    }

    #[test]
    fn static_environment_only_knows_what_it_was_given() {
        let env = StaticEnvironment::new()
            .with_var("KEY", "/boot/negotiation.toml")
            .with_file("/boot/negotiation.toml");
        assert_eq!(env.lookup("KEY").as_deref(), Some("/boot/negotiation.toml"));
        assert!(env.lookup("OTHER").is_none());
        assert!(env.exists(Path::new("/boot/negotiation.toml")));
        assert!(!env.exists(Path::new("/boot/other.toml")));
    }
}
