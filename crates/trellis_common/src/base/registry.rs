//! Component registry: id -> pending configuration or live instance.
//!
//! Per id the state moves `Unregistered -> Configured -> Live`. A slot is
//! never both: creating the instance replaces the configuration. A live
//! instance that is replaced or unloaded is disposed first.

use crate::base::component::{Component, ComponentConfig};
use crate::base::context::AppContext;
use crate::error::{Result, TrellisError};
use std::collections::BTreeMap;
use tracing::debug;

enum Slot {
    Configured(ComponentConfig),
    Live {
        class: Option<String>,
        instance: Box<dyn Component>,
    },
}

/// What can be put under an id
pub enum ComponentSpec {
    Config(ComponentConfig),
    Instance(Box<dyn Component>),
}

impl From<ComponentConfig> for ComponentSpec {
    fn from(config: ComponentConfig) -> Self {
        ComponentSpec::Config(config)
    }
}

impl From<Box<dyn Component>> for ComponentSpec {
    fn from(instance: Box<dyn Component>) -> Self {
        ComponentSpec::Instance(instance)
    }
}

#[derive(Default)]
pub struct ComponentRegistry {
    slots: BTreeMap<String, Slot>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a component under `id`, or unload it when `spec` is `None`.
    ///
    /// An instance is stored as is and initialized if it has not been.
    /// A configuration naming a different class than the current one
    /// discards the current registration. Otherwise a live instance gets
    /// the new property values assigned, and a pending configuration is
    /// shallow-merged (`merge`) or replaced.
    pub fn set_component(
        &mut self,
        id: &str,
        spec: Option<ComponentSpec>,
        merge: bool,
        ctx: &mut AppContext,
    ) -> Result<()> {
        let config = match spec {
            None => {
                discard(id, self.slots.remove(id), ctx);
                return Ok(());
            }
            Some(ComponentSpec::Instance(mut instance)) => {
                if !instance.is_initialized() {
                    instance.init(ctx)?;
                }
                let class = Some(instance.class_name().to_string());
                let previous = self.slots.insert(id.to_string(), Slot::Live { class, instance });
                discard(id, previous, ctx);
                return Ok(());
            }
            Some(ComponentSpec::Config(config)) => config,
        };

        match self.slots.get_mut(id) {
            Some(Slot::Live { class, instance }) => {
                if config.class.is_some() && config.class != *class {
                    let previous = self.slots.insert(id.to_string(), Slot::Configured(config));
                    discard(id, previous, ctx);
                    return Ok(());
                }
                for (name, value) in &config.properties {
                    instance.set_property(name, value)?;
                }
            }
            Some(Slot::Configured(existing)) => {
                let class_changed = config.class.is_some()
                    && existing.class.is_some()
                    && config.class != existing.class;
                if merge && !class_changed {
                    existing.merge(config);
                } else {
                    *existing = config;
                }
            }
            None => {
                self.slots.insert(id.to_string(), Slot::Configured(config));
            }
        }
        Ok(())
    }

    /// Live instance for `id`, created from its configuration on first
    /// access when `create_if_null` is set. Disabled components are never
    /// created.
    pub fn get_component(
        &mut self,
        id: &str,
        create_if_null: bool,
        ctx: &mut AppContext,
    ) -> Result<Option<&mut dyn Component>> {
        let pending = match self.slots.get(id) {
            None => return Ok(None),
            Some(Slot::Live { .. }) => None,
            Some(Slot::Configured(config)) => Some(config.clone()),
        };

        if let Some(mut config) = pending {
            if !create_if_null || !config.is_enabled() {
                return Ok(None);
            }
            config.properties.remove("enabled");
            if config.class.is_none() {
                return Err(TrellisError::MissingClass);
            }
            let class = config.class.clone();
            let mut instance = ctx.framework().create_component(&config, &[])?;
            instance.init(ctx)?;
            debug!(id, "component created");
            self.slots
                .insert(id.to_string(), Slot::Live { class, instance });
        }

        match self.slots.get_mut(id) {
            Some(Slot::Live { instance, .. }) => Ok(Some(instance.as_mut())),
            _ => Ok(None),
        }
    }

    /// Registered (live or configured)
    pub fn has_component(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn is_live(&self, id: &str) -> bool {
        matches!(self.slots.get(id), Some(Slot::Live { .. }))
    }

    /// Pending configuration, if the component has not been created
    pub fn config(&self, id: &str) -> Option<&ComponentConfig> {
        match self.slots.get(id) {
            Some(Slot::Configured(config)) => Some(config),
            _ => None,
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.slots.keys().map(|k| k.as_str()).collect()
    }
}

/// Dispose the instance held by a removed slot.
fn discard(id: &str, slot: Option<Slot>, ctx: &mut AppContext) {
    if let Some(Slot::Live { mut instance, .. }) = slot {
        debug!(id, class = instance.class_name(), "disposing component");
        instance.dispose(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::framework::Framework;
    use crate::caching::Cache;
    use serde_json::json;

    fn ctx() -> AppContext {
        AppContext::new(Framework::new(), "Registry Test", "/tmp")
    }

    #[test]
    fn test_same_class_merges() {
        let mut ctx = ctx();
        let mut registry = ComponentRegistry::new();
        registry
            .set_component("cache", Some(ComponentConfig::new("MemoryCache").into()), true, &mut ctx)
            .unwrap();
        registry
            .set_component(
                "cache",
                Some(ComponentConfig::new("MemoryCache").with("keyPrefix", "p").into()),
                true,
                &mut ctx,
            )
            .unwrap();
        let config = registry.config("cache").unwrap();
        assert_eq!(config.properties.get("keyPrefix"), Some(&json!("p")));
    }

    #[test]
    fn test_class_change_discards() {
        let mut ctx = ctx();
        let mut registry = ComponentRegistry::new();
        registry
            .set_component(
                "log",
                Some(ComponentConfig::new("ConsoleLogRoute").with("levels", "error").into()),
                true,
                &mut ctx,
            )
            .unwrap();
        registry
            .set_component("log", Some(ComponentConfig::new("FileLogRoute").into()), true, &mut ctx)
            .unwrap();
        let config = registry.config("log").unwrap();
        assert_eq!(config.class.as_deref(), Some("FileLogRoute"));
        assert!(config.properties.get("levels").is_none());
    }

    #[test]
    fn test_live_instance_gets_new_properties() {
        let mut ctx = ctx();
        let mut registry = ComponentRegistry::new();
        registry
            .set_component("cache", Some(ComponentConfig::new("MemoryCache").into()), true, &mut ctx)
            .unwrap();
        assert!(registry.get_component("cache", true, &mut ctx).unwrap().is_some());
        assert!(registry.is_live("cache"));

        registry
            .set_component(
                "cache",
                Some(ComponentConfig::properties_only().with("keyPrefix", "live").into()),
                true,
                &mut ctx,
            )
            .unwrap();
        let component = registry.get_component("cache", true, &mut ctx).unwrap().unwrap();
        let cache = component.as_any_mut().downcast_mut::<Cache>().unwrap();
        assert_eq!(cache.key_prefix(), "live");
    }

    #[test]
    fn test_live_instance_discarded_on_class_change() {
        let mut ctx = ctx();
        let mut registry = ComponentRegistry::new();
        registry
            .set_component("c", Some(ComponentConfig::new("MemoryCache").into()), true, &mut ctx)
            .unwrap();
        registry.get_component("c", true, &mut ctx).unwrap();
        registry
            .set_component("c", Some(ComponentConfig::new("ConsoleLogRoute").into()), true, &mut ctx)
            .unwrap();
        assert!(!registry.is_live("c"));
        assert_eq!(
            registry.config("c").and_then(|c| c.class.as_deref()),
            Some("ConsoleLogRoute")
        );
    }

    #[test]
    fn test_discarded_instance_is_disposed() {
        use std::any::Any;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct Tracked {
            disposed: Arc<AtomicUsize>,
        }

        impl Component for Tracked {
            fn class_name(&self) -> &str {
                "Tracked"
            }
            fn init(&mut self, _ctx: &mut AppContext) -> Result<()> {
                Ok(())
            }
            fn is_initialized(&self) -> bool {
                true
            }
            fn dispose(&mut self, _ctx: &mut AppContext) {
                self.disposed.fetch_add(1, Ordering::SeqCst);
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let mut ctx = ctx();
        let mut registry = ComponentRegistry::new();
        let disposed = Arc::new(AtomicUsize::new(0));
        let tracked = || -> Box<dyn Component> {
            Box::new(Tracked {
                disposed: Arc::clone(&disposed),
            })
        };

        registry.set_component("t", Some(tracked().into()), true, &mut ctx).unwrap();
        registry
            .set_component("t", Some(ComponentConfig::new("MemoryCache").into()), true, &mut ctx)
            .unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        registry.set_component("t", Some(tracked().into()), true, &mut ctx).unwrap();
        registry.set_component("t", Some(tracked().into()), true, &mut ctx).unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 2);

        registry.set_component("t", None, true, &mut ctx).unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 3);

        // Same class: properties only, no teardown
        registry
            .set_component("t", Some(ComponentConfig::new("MemoryCache").into()), true, &mut ctx)
            .unwrap();
        registry.get_component("t", true, &mut ctx).unwrap();
        registry
            .set_component("t", Some(ComponentConfig::new("MemoryCache").with("keyPrefix", "p").into()), true, &mut ctx)
            .unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_disabled_component_not_created() {
        let mut ctx = ctx();
        let mut registry = ComponentRegistry::new();
        registry
            .set_component(
                "cache",
                Some(ComponentConfig::new("MemoryCache").with("enabled", false).into()),
                true,
                &mut ctx,
            )
            .unwrap();
        assert!(registry.get_component("cache", true, &mut ctx).unwrap().is_none());
        assert!(registry.has_component("cache"));
        assert!(!registry.is_live("cache"));
    }

    #[test]
    fn test_no_create_without_flag() {
        let mut ctx = ctx();
        let mut registry = ComponentRegistry::new();
        registry
            .set_component("cache", Some(ComponentConfig::new("MemoryCache").into()), true, &mut ctx)
            .unwrap();
        assert!(registry.get_component("cache", false, &mut ctx).unwrap().is_none());
        assert!(registry.get_component("missing", true, &mut ctx).unwrap().is_none());
    }

    #[test]
    fn test_unload() {
        let mut ctx = ctx();
        let mut registry = ComponentRegistry::new();
        registry
            .set_component("cache", Some(ComponentConfig::new("MemoryCache").into()), true, &mut ctx)
            .unwrap();
        registry.set_component("cache", None, true, &mut ctx).unwrap();
        assert!(!registry.has_component("cache"));
    }
}
