//! Class registry: class name -> factory.
//!
//! Classes are either native factories registered in code, or presets
//! loaded from a "class unit" file. A unit is a TOML file `<Name>.toml`:
//!
//! ```toml
//! extends = "FileLogRoute"   # registered base class (required)
//! class = "AuditLogRoute"    # declared name, checked in debug mode
//! logFile = "audit.log"      # any other key is a default property
//! ```
//!
//! Loading a unit binds its file base name to a derived factory that
//! builds the base class and applies the defaults before the caller's
//! own properties.

use crate::base::component::Component;
use crate::error::{Result, TrellisError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Constructor for a class; receives the extra construction arguments.
pub type Factory = Arc<dyn Fn(&[Value]) -> Result<Box<dyn Component>> + Send + Sync>;

/// Extension of class unit files
pub const UNIT_EXTENSION: &str = "toml";

/// Preset chains deeper than this are treated as cycles
const MAX_PRESET_DEPTH: usize = 16;

#[derive(Clone)]
enum ClassEntry {
    Native(Factory),
    Preset { base: String, defaults: Map<String, Value> },
    /// Known unit file, not read yet
    Deferred(PathBuf),
}

/// Resolved class: the native factory plus preset defaults collected
/// along the `extends` chain (outermost preset wins).
#[derive(Clone)]
pub struct ResolvedClass {
    pub factory: Factory,
    pub defaults: Map<String, Value>,
}

#[derive(Default)]
pub struct ClassRegistry {
    classes: HashMap<String, ClassEntry>,
    imports: HashMap<String, String>,
    include_paths: Vec<PathBuf>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, factory: Factory) {
        self.classes
            .insert(name.to_string(), ClassEntry::Native(factory));
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Remember that `name` lives in `path` without reading it.
    /// An already known class is left alone.
    pub fn defer(&mut self, name: &str, path: PathBuf) {
        self.classes
            .entry(name.to_string())
            .or_insert(ClassEntry::Deferred(path));
    }

    pub fn imported(&self, alias: &str) -> Option<&str> {
        self.imports.get(alias).map(|s| s.as_str())
    }

    pub fn record_import(&mut self, alias: &str, class: &str) {
        self.imports.insert(alias.to_string(), class.to_string());
    }

    /// Directories searched for `<Name>.toml` when a class is unknown
    pub fn add_include_path(&mut self, dir: PathBuf) {
        if !self.include_paths.contains(&dir) {
            self.include_paths.push(dir);
        }
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    /// Read a unit file and bind it under its file base name.
    pub fn load_unit(&mut self, path: &Path, debug_mode: bool) -> Result<String> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| TrellisError::Config(format!("\"{}\" is not a class unit", path.display())))?
            .to_string();

        let text = fs::read_to_string(path).map_err(|e| {
            TrellisError::Config(format!(
                "class unit \"{}\" cannot be read: {}",
                path.display(),
                e
            ))
        })?;

        let mut table = match toml::from_str::<Value>(&text)? {
            Value::Object(map) => map,
            _ => {
                return Err(TrellisError::Config(format!(
                    "class unit \"{}\" must be a table",
                    path.display()
                )))
            }
        };

        let base = match table.remove("extends") {
            Some(Value::String(base)) => base,
            _ => {
                return Err(TrellisError::Config(format!(
                    "class unit \"{}\" must name the class it extends",
                    path.display()
                )))
            }
        };

        if let Some(declared) = table.remove("class") {
            if debug_mode && declared.as_str() != Some(name.as_str()) {
                return Err(TrellisError::ClassNameMismatch {
                    class: declared.as_str().unwrap_or_default().to_string(),
                    file: path.display().to_string(),
                });
            }
        }

        debug!(class = %name, base = %base, "loaded class unit {}", path.display());
        self.classes.insert(
            name.clone(),
            ClassEntry::Preset {
                base,
                defaults: table,
            },
        );
        Ok(name)
    }

    /// Resolve a class name to its factory, loading units on demand.
    pub fn resolve(&mut self, name: &str, debug_mode: bool) -> Result<ResolvedClass> {
        self.resolve_depth(name, debug_mode, 0)
    }

    fn resolve_depth(&mut self, name: &str, debug_mode: bool, depth: usize) -> Result<ResolvedClass> {
        if depth > MAX_PRESET_DEPTH {
            return Err(TrellisError::Config(format!(
                "class \"{}\" extends itself",
                name
            )));
        }

        let entry = match self.classes.get(name) {
            Some(entry) => entry.clone(),
            None => {
                let path = self.search_include_paths(name).ok_or_else(|| {
                    TrellisError::UnknownClass(name.to_string())
                })?;
                ClassEntry::Deferred(path)
            }
        };

        match entry {
            ClassEntry::Native(factory) => Ok(ResolvedClass {
                factory,
                defaults: Map::new(),
            }),
            ClassEntry::Preset { base, defaults } => {
                let mut resolved = self.resolve_depth(&base, debug_mode, depth + 1)?;
                for (key, value) in defaults {
                    resolved.defaults.insert(key, value);
                }
                Ok(resolved)
            }
            ClassEntry::Deferred(path) => {
                let loaded = self.load_unit(&path, debug_mode)?;
                if loaded != name {
                    return Err(TrellisError::Config(format!(
                        "class unit \"{}\" does not define \"{}\"",
                        path.display(),
                        name
                    )));
                }
                self.resolve_depth(name, debug_mode, depth + 1)
            }
        }
    }

    fn search_include_paths(&self, name: &str) -> Option<PathBuf> {
        self.include_paths
            .iter()
            .map(|dir| dir.join(format!("{}.{}", name, UNIT_EXTENSION)))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::context::AppContext;
    use std::any::Any;
    use tempfile::TempDir;

    struct Probe {
        label: String,
    }

    impl Component for Probe {
        fn class_name(&self) -> &str {
            "Probe"
        }
        fn init(&mut self, _ctx: &mut AppContext) -> Result<()> {
            Ok(())
        }
        fn is_initialized(&self) -> bool {
            true
        }
        fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
            match name {
                "label" => {
                    self.label = value.as_str().unwrap_or_default().to_string();
                    Ok(())
                }
                _ => Err(TrellisError::unknown_property("Probe", name)),
            }
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn registry() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry.register(
            "Probe",
            Arc::new(|_args: &[Value]| -> Result<Box<dyn Component>> {
                Ok(Box::new(Probe {
                    label: String::new(),
                }))
            }),
        );
        registry
    }

    #[test]
    fn test_unknown_class() {
        let mut registry = registry();
        let err = registry.resolve("Missing", false).err().unwrap();
        assert!(matches!(err, TrellisError::UnknownClass(name) if name == "Missing"));
    }

    #[test]
    fn test_preset_defaults_chain() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Base.toml"), "extends = \"Probe\"\nlabel = \"base\"\nx = 1\n").unwrap();
        fs::write(dir.path().join("Leaf.toml"), "extends = \"Base\"\nlabel = \"leaf\"\n").unwrap();

        let mut registry = registry();
        registry.add_include_path(dir.path().to_path_buf());
        let resolved = registry.resolve("Leaf", false).unwrap();
        assert_eq!(resolved.defaults.get("label"), Some(&Value::from("leaf")));
        assert_eq!(resolved.defaults.get("x"), Some(&Value::from(1)));
        assert!(registry.is_known("Base"));
    }

    #[test]
    fn test_declared_name_checked_in_debug() {
        let dir = TempDir::new().unwrap();
        let unit = dir.path().join("Audit.toml");
        fs::write(&unit, "extends = \"Probe\"\nclass = \"Other\"\n").unwrap();

        let mut registry = registry();
        assert!(registry.load_unit(&unit, false).is_ok());
        let err = registry.load_unit(&unit, true).unwrap_err();
        assert!(matches!(err, TrellisError::ClassNameMismatch { .. }));
    }

    #[test]
    fn test_unit_without_extends_rejected() {
        let dir = TempDir::new().unwrap();
        let unit = dir.path().join("Bare.toml");
        fs::write(&unit, "label = \"x\"\n").unwrap();
        assert!(matches!(
            registry().load_unit(&unit, false),
            Err(TrellisError::Config(_))
        ));
    }

    #[test]
    fn test_self_extending_preset() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Loop.toml"), "extends = \"Loop\"\n").unwrap();
        let mut registry = registry();
        registry.add_include_path(dir.path().to_path_buf());
        assert!(matches!(
            registry.resolve("Loop", false),
            Err(TrellisError::Config(_))
        ));
    }

    #[test]
    fn test_deferred_missing_file_is_config_error() {
        let mut registry = registry();
        registry.defer("Ghost", PathBuf::from("/nonexistent/Ghost.toml"));
        assert!(matches!(
            registry.resolve("Ghost", false),
            Err(TrellisError::Config(_))
        ));
    }
}
