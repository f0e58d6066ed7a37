//! Path aliases: `root.segment.segment` -> filesystem path.
//!
//! The root segment must be a registered alias. Remaining segments are
//! joined onto it; a trailing `*` names the directory itself. Resolved
//! aliases are cached by their full string.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone)]
pub struct AliasTable {
    roots: HashMap<String, PathBuf>,
    resolved: HashMap<String, PathBuf>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias -> path`, or remove it when `path` is `None`.
    ///
    /// Relative paths are made absolute against the current directory.
    /// Existence is not checked.
    pub fn register(&mut self, alias: &str, path: Option<&Path>) {
        self.resolved
            .retain(|key, _| key != alias && !key.starts_with(&format!("{}.", alias)));

        match path {
            Some(path) if !path.as_os_str().is_empty() => {
                self.roots.insert(alias.to_string(), absolutize(path));
            }
            _ => {
                self.roots.remove(alias);
            }
        }
    }

    /// Translate an alias into a path. `None` if the root alias is unknown.
    pub fn resolve(&mut self, alias: &str) -> Option<PathBuf> {
        if let Some(path) = self.roots.get(alias) {
            return Some(path.clone());
        }
        if let Some(path) = self.resolved.get(alias) {
            return Some(path.clone());
        }

        let (root, rest) = alias.split_once('.')?;
        let mut path = self.roots.get(root)?.clone();

        let mut segments: Vec<&str> = rest.split('.').collect();
        if segments.last() == Some(&"*") {
            segments.pop();
        }
        for segment in segments.into_iter().filter(|s| !s.is_empty()) {
            path.push(segment);
        }

        self.resolved.insert(alias.to_string(), path.clone());
        Some(path)
    }

    pub fn get(&self, alias: &str) -> Option<&Path> {
        self.roots.get(alias).map(|p| p.as_path())
    }

    /// Registered root aliases, sorted by name
    pub fn roots(&self) -> Vec<(String, PathBuf)> {
        let mut roots: Vec<_> = self
            .roots
            .iter()
            .map(|(alias, path)| (alias.clone(), path.clone()))
            .collect();
        roots.sort();
        roots
    }
}

pub(crate) fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
