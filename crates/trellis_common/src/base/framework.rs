//! Framework context handle.
//!
//! Owns the process-wide tables (aliases, classes, the logger) behind
//! mutexes so the flush timer thread can share them. Cloning the handle
//! shares the same tables; the entry point creates one and passes it
//! down.

use crate::base::alias::{absolutize, AliasTable};
use crate::base::class_registry::{ClassRegistry, Factory, UNIT_EXTENSION};
use crate::base::component::{Component, ComponentConfig};
use crate::caching::Cache;
use crate::error::{Result, TrellisError};
use crate::logging::{ConsoleLogRoute, EmailLogRoute, FileLogRoute, LogLevel, LogRouter, Logger};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Clone)]
pub struct Framework {
    aliases: Arc<Mutex<AliasTable>>,
    classes: Arc<Mutex<ClassRegistry>>,
    logger: Logger,
    debug: bool,
    app_bound: Arc<AtomicBool>,
}

impl Default for Framework {
    fn default() -> Self {
        Self::new()
    }
}

impl Framework {
    /// Fresh context with the built-in classes registered.
    pub fn new() -> Self {
        let framework = Self {
            aliases: Arc::new(Mutex::new(AliasTable::new())),
            classes: Arc::new(Mutex::new(ClassRegistry::new())),
            logger: Logger::new(),
            debug: false,
            app_bound: Arc::new(AtomicBool::new(false)),
        };
        framework.register_builtin_classes();
        framework
    }

    /// Debug mode enables trace messages and class unit name checks.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    fn register_builtin_classes(&self) {
        self.register_class("LogRouter", Arc::new(|_: &[Value]| -> Result<Box<dyn Component>> {
            Ok(Box::new(LogRouter::new()))
        }));
        self.register_class(
            "ConsoleLogRoute",
            Arc::new(|_: &[Value]| -> Result<Box<dyn Component>> {
                Ok(Box::new(ConsoleLogRoute::new()))
            }),
        );
        self.register_class(
            "FileLogRoute",
            Arc::new(|_: &[Value]| -> Result<Box<dyn Component>> {
                Ok(Box::new(FileLogRoute::new()))
            }),
        );
        self.register_class(
            "EmailLogRoute",
            Arc::new(|_: &[Value]| -> Result<Box<dyn Component>> {
                Ok(Box::new(EmailLogRoute::new()))
            }),
        );
        self.register_class(
            "MemoryCache",
            Arc::new(|_: &[Value]| -> Result<Box<dyn Component>> {
                Ok(Box::new(Cache::in_memory()))
            }),
        );
    }

    fn lock_aliases(&self) -> MutexGuard<'_, AliasTable> {
        self.aliases.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_classes(&self) -> MutexGuard<'_, ClassRegistry> {
        self.classes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register_class(&self, name: &str, factory: Factory) {
        self.lock_classes().register(name, factory);
    }

    pub fn is_class_known(&self, name: &str) -> bool {
        self.lock_classes().is_known(name)
    }

    // ========================================================================
    // Aliases
    // ========================================================================

    /// Register `alias -> path`; `None` or an empty path removes it.
    pub fn register_alias(&self, alias: &str, path: Option<&Path>) {
        self.lock_aliases().register(alias, path);
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<PathBuf> {
        self.lock_aliases().resolve(alias)
    }

    pub fn aliases(&self) -> Vec<(String, PathBuf)> {
        self.lock_aliases().roots()
    }

    /// Import a class or a directory by alias.
    ///
    /// An undotted alias is a plain class name and is returned as is.
    /// `x.y.*` adds the directory to the include path. Otherwise the last
    /// segment is the class name: with `force_load` its unit is read now,
    /// without it the unit is only remembered and read on first use.
    pub fn import(&self, alias: &str, force_load: bool) -> Result<String> {
        let imported = self.lock_classes().imported(alias).map(str::to_string);
        if let Some(class) = imported {
            if !force_load || self.is_class_known(&class) {
                return Ok(class);
            }
        }

        let (_, class_name) = match alias.rsplit_once('.') {
            Some(parts) => parts,
            None => return Ok(alias.to_string()),
        };

        if class_name != "*" && self.is_class_known(class_name) {
            self.lock_classes().record_import(alias, class_name);
            return Ok(class_name.to_string());
        }

        let path = self
            .resolve_alias(alias)
            .ok_or_else(|| TrellisError::InvalidAlias(alias.to_string()))?;

        if class_name == "*" {
            if !path.is_dir() {
                return Err(TrellisError::InvalidAlias(alias.to_string()));
            }
            self.lock_classes().add_include_path(path);
            return Ok(alias.to_string());
        }

        let unit = unit_path(&path);
        let mut classes = self.lock_classes();
        if force_load {
            if !unit.is_file() {
                return Err(TrellisError::InvalidAlias(alias.to_string()));
            }
            let loaded = classes.load_unit(&unit, self.debug)?;
            classes.record_import(alias, &loaded);
            Ok(loaded)
        } else {
            classes.defer(class_name, unit);
            classes.record_import(alias, class_name);
            Ok(class_name.to_string())
        }
    }

    /// Load a class unit file directly, returning the bound class name.
    pub fn load_class_unit(&self, path: &Path) -> Result<String> {
        self.lock_classes().load_unit(&absolutize(path), self.debug)
    }

    pub fn add_include_path(&self, dir: &Path) {
        self.lock_classes().add_include_path(absolutize(dir));
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Build a component from its configuration.
    ///
    /// The class is resolved (dotted names are imported and loaded), the
    /// factory is called with `args`, then preset defaults and the
    /// configured properties are assigned in that order. The component is
    /// not initialized.
    pub fn create_component(
        &self,
        config: &ComponentConfig,
        args: &[Value],
    ) -> Result<Box<dyn Component>> {
        let class = config.class.as_deref().ok_or(TrellisError::MissingClass)?;
        let class_name = if class.contains('.') {
            self.import(class, true)?
        } else {
            class.to_string()
        };

        // Factories may create components themselves; never call them locked.
        let resolved = self.lock_classes().resolve(&class_name, self.debug)?;
        let mut component = (resolved.factory)(args)?;

        for (name, value) in resolved.defaults.iter().chain(config.properties.iter()) {
            component.set_property(name, value)?;
        }

        debug!(class = %class_name, "created component");
        Ok(component)
    }

    // ========================================================================
    // Logging shortcuts
    // ========================================================================

    pub fn log(&self, message: &str, level: LogLevel, category: &str) {
        self.logger.log(message, level, category);
    }

    /// Trace message, recorded in debug mode only
    pub fn trace(&self, message: &str, category: &str) {
        if self.debug {
            self.logger.log(message, LogLevel::Trace, category);
        }
    }

    // ========================================================================
    // Application binding
    // ========================================================================

    pub(crate) fn bind_application(&self) -> Result<()> {
        self.app_bound
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| TrellisError::Lifecycle("Application can only be created once.".to_string()))
    }

    pub(crate) fn release_application(&self) {
        self.app_bound.store(false, Ordering::SeqCst);
    }

    pub fn has_application(&self) -> bool {
        self.app_bound.load(Ordering::SeqCst)
    }
}

fn unit_path(path: &Path) -> PathBuf {
    let mut file = path.as_os_str().to_os_string();
    file.push(".");
    file.push(UNIT_EXTENSION);
    PathBuf::from(file)
}
