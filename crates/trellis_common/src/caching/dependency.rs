//! Cache dependencies: a cached value is discarded once its dependency
//! reports a change since the value was stored.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheDependency {
    /// Modification time of a file
    FileModified {
        path: PathBuf,
        #[serde(default)]
        data: Option<String>,
    },
    /// Value of an environment variable
    EnvVar {
        name: String,
        #[serde(default)]
        data: Option<String>,
    },
}

impl CacheDependency {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        CacheDependency::FileModified {
            path: path.into(),
            data: None,
        }
    }

    pub fn env_var(name: impl Into<String>) -> Self {
        CacheDependency::EnvVar {
            name: name.into(),
            data: None,
        }
    }

    /// Current state of whatever the dependency watches
    pub fn generate_data(&self) -> Option<String> {
        match self {
            CacheDependency::FileModified { path, .. } => fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos().to_string()),
            CacheDependency::EnvVar { name, .. } => env::var(name).ok(),
        }
    }

    /// Data recorded by the last `evaluate`
    pub fn data(&self) -> Option<&str> {
        match self {
            CacheDependency::FileModified { data, .. } | CacheDependency::EnvVar { data, .. } => {
                data.as_deref()
            }
        }
    }

    /// Record the current state
    pub fn evaluate(&mut self) {
        let current = self.generate_data();
        match self {
            CacheDependency::FileModified { data, .. } | CacheDependency::EnvVar { data, .. } => {
                *data = current;
            }
        }
    }

    pub fn has_changed(&self) -> bool {
        self.generate_data().as_deref() != self.data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_file_dependency() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "a").unwrap();

        let mut dependency = CacheDependency::file(&path);
        dependency.evaluate();
        assert!(dependency.data().is_some());
        assert!(!dependency.has_changed());

        let later = SystemTime::now() + Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();
        assert!(dependency.has_changed());
    }

    #[test]
    fn test_env_dependency() {
        let name = "TRELLIS_CACHE_DEPENDENCY_TEST";
        env::set_var(name, "one");
        let mut dependency = CacheDependency::env_var(name);
        dependency.evaluate();
        assert!(!dependency.has_changed());
        env::set_var(name, "two");
        assert!(dependency.has_changed());
        env::remove_var(name);
    }

    #[test]
    fn test_serde_tagged() {
        let mut dependency = CacheDependency::env_var("HOME_NOT_SET_FOR_TEST");
        dependency.evaluate();
        let json = serde_json::to_value(&dependency).unwrap();
        assert_eq!(json["kind"], "env_var");
        let back: CacheDependency = serde_json::from_value(json).unwrap();
        assert_eq!(back, dependency);
    }
}
