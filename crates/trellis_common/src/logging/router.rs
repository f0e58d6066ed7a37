//! Log router component.
//!
//! Builds the configured routes during `init` and subscribes them to the
//! logger: every flush calls `collect_logs(dump)` on each enabled route,
//! and the end of the application collects once more with `dump = true`.

use crate::base::component::{Component, ComponentConfig};
use crate::base::context::AppContext;
use crate::error::{Result, TrellisError};
use crate::logging::logger::{FlushObserver, ObserverId};
use crate::logging::Logger;
use serde_json::Value;
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

/// Routes shared between the router, the logger and the end hook
#[derive(Default)]
struct RouteSet {
    routes: Mutex<Vec<Box<dyn Component>>>,
}

impl RouteSet {
    fn lock(&self) -> MutexGuard<'_, Vec<Box<dyn Component>>> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn collect(&self, logger: &Logger, dump: bool) {
        for component in self.lock().iter_mut() {
            if let Some(route) = component.as_log_route() {
                if route.enabled() {
                    route.collect_logs(logger, dump);
                }
            }
        }
    }
}

impl FlushObserver for RouteSet {
    fn on_flush(&self, logger: &Logger, dump: bool) {
        self.collect(logger, dump);
    }
}

#[derive(Default)]
pub struct LogRouter {
    configs: Vec<ComponentConfig>,
    routes: Arc<RouteSet>,
    observer: Option<ObserverId>,
    initialized: bool,
}

impl LogRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue route configurations; they are built during `init`.
    pub fn add_routes(&mut self, configs: impl IntoIterator<Item = ComponentConfig>) {
        self.configs.extend(configs);
    }

    /// Number of routes (configured before init, built after)
    pub fn route_count(&self) -> usize {
        if self.initialized {
            self.routes.lock().len()
        } else {
            self.configs.len()
        }
    }

    /// Class names of the built routes, in order
    pub fn route_classes(&self) -> Vec<String> {
        self.routes
            .lock()
            .iter()
            .map(|route| route.class_name().to_string())
            .collect()
    }

    /// Run `f` on the route at `index` if it is a `T`.
    pub fn with_route<T: Component, R>(&self, index: usize, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut routes = self.routes.lock();
        routes
            .get_mut(index)
            .and_then(|route| route.as_any_mut().downcast_mut::<T>())
            .map(f)
    }

    /// Collect from `logger` into every enabled route.
    pub fn collect_logs(&self, logger: &Logger, dump: bool) {
        self.routes.collect(logger, dump);
    }

    /// Final collection: process everything pending.
    pub fn process_logs(&self, logger: &Logger) {
        let _guard = logger.begin_processing();
        self.routes.collect(logger, true);
    }
}

impl Component for LogRouter {
    fn class_name(&self) -> &str {
        "LogRouter"
    }

    fn init(&mut self, ctx: &mut AppContext) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let mut built = Vec::with_capacity(self.configs.len());
        for config in &self.configs {
            let mut route = ctx.framework().create_component(config, &[])?;
            if route.as_log_route().is_none() {
                return Err(TrellisError::Config(format!(
                    "\"{}\" is not a log route",
                    config.class.as_deref().unwrap_or_default()
                )));
            }
            route.init(ctx)?;
            built.push(route);
        }
        debug!(routes = built.len(), "log router initialized");
        *self.routes.lock() = built;

        let logger = ctx.logger().clone();
        self.observer = Some(logger.add_observer(self.routes.clone()));

        // Weak so a disposed router's routes are not written at the end
        let routes: Weak<RouteSet> = Arc::downgrade(&self.routes);
        ctx.on_end(Box::new(move || {
            let Some(routes) = routes.upgrade() else {
                return;
            };
            let _guard = logger.begin_processing();
            routes.collect(&logger, true);
        }));

        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Unsubscribe from the logger and drop the built routes.
    fn dispose(&mut self, ctx: &mut AppContext) {
        if let Some(id) = self.observer.take() {
            ctx.logger().remove_observer(id);
        }
        self.routes = Arc::new(RouteSet::default());
        self.initialized = false;
        debug!("log router disposed");
    }

    fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "routes" => {
                let items = match value {
                    Value::Array(items) => items.clone(),
                    Value::Object(map) => map.values().cloned().collect(),
                    _ => {
                        return Err(TrellisError::invalid_property(
                            "LogRouter",
                            name,
                            "expected a list of route configurations",
                        ))
                    }
                };
                let configs = items
                    .into_iter()
                    .map(ComponentConfig::from_value)
                    .collect::<Result<Vec<_>>>()?;
                self.add_routes(configs);
                Ok(())
            }
            _ => Err(TrellisError::unknown_property("LogRouter", name)),
        }
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "routes" => Some(Value::from(self.route_classes())),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
