//! Application: the component container bound to a framework context.
//!
//! One live application per `Framework`. Construction sets the base path
//! first (it anchors the `application` alias and the runtime directory),
//! then applies the rest of the configuration and preloads components.

use crate::base::alias::absolutize;
use crate::base::component::{Component, ComponentConfig};
use crate::base::config::AppConfig;
use crate::base::context::{AppContext, EndHook};
use crate::base::framework::Framework;
use crate::base::registry::{ComponentRegistry, ComponentSpec};
use crate::error::{Result, TrellisError};
use crate::logging::{LogLevel, Logger};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Category used for faults caught by the panic hook
pub const FAULT_CATEGORY: &str = "trellis.exception.uncaught";

/// Process exit statuses for abnormal terminations
pub mod exit_status {
    /// SIGHUP
    pub const HANGUP: i32 = 1;
    /// SIGINT
    pub const INTERRUPT: i32 = 2;
    /// SIGTERM
    pub const TERMINATE: i32 = 15;
    /// Uncaught fault (panic)
    pub const FAULT: i32 = 6;
}

pub struct Application {
    ctx: AppContext,
    components: ComponentRegistry,
    params: Map<String, Value>,
    extra: Map<String, Value>,
    disposed: bool,
}

impl Application {
    /// Build the application from `config`.
    ///
    /// Fails with `Lifecycle` if `framework` already has a live application.
    pub fn new(framework: Framework, config: AppConfig) -> Result<Self> {
        framework.bind_application()?;
        match Self::build(framework.clone(), config) {
            Ok(app) => Ok(app),
            Err(e) => {
                framework.release_application();
                Err(e)
            }
        }
    }

    fn build(framework: Framework, config: AppConfig) -> Result<Self> {
        let base_path = match &config.base_path {
            Some(path) => absolutize(path),
            None => std::env::current_dir()?,
        };
        if !base_path.is_dir() {
            return Err(TrellisError::InvalidDirectory {
                what: "Application base path",
                path: base_path.display().to_string(),
            });
        }
        framework.register_alias("application", Some(&base_path));

        let mut app = Self {
            ctx: AppContext::new(framework.clone(), config.name.clone(), base_path),
            components: ComponentRegistry::new(),
            params: Map::new(),
            extra: Map::new(),
            disposed: false,
        };

        if let Some(id) = config.id {
            app.ctx.set_id(id);
        }
        if let Some(runtime) = &config.runtime_path {
            app.ctx.set_runtime_path(runtime)?;
        }
        app.ctx.set_sendmail(config.sendmail);

        for (alias, path) in &config.aliases {
            framework.register_alias(alias, Some(path));
        }
        for alias in &config.import {
            framework.import(alias, false)?;
        }

        app.set_params(config.params);
        app.set_components(config.components, true)?;
        app.extra = config.extra;

        for id in &config.preload {
            app.get_component(id, true)?;
        }

        framework.trace("Application started", "trellis.base.Application");
        debug!(name = %app.ctx.name(), "application initialized");
        Ok(app)
    }

    pub fn framework(&self) -> &Framework {
        self.ctx.framework()
    }

    pub fn logger(&self) -> &Logger {
        self.ctx.logger()
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut AppContext {
        &mut self.ctx
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    pub fn id(&self) -> String {
        self.ctx.id()
    }

    pub fn base_path(&self) -> &Path {
        self.ctx.base_path()
    }

    pub fn runtime_path(&self) -> PathBuf {
        self.ctx.runtime_path()
    }

    pub fn set_runtime_path(&mut self, path: &Path) -> Result<()> {
        self.ctx.set_runtime_path(path)
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Merge user parameters into the existing ones.
    pub fn set_params(&mut self, params: Map<String, Value>) {
        for (key, value) in params {
            self.params.insert(key, value);
        }
    }

    /// Unrecognized configuration key
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    // ========================================================================
    // Components
    // ========================================================================

    pub fn set_component(&mut self, id: &str, spec: Option<ComponentSpec>, merge: bool) -> Result<()> {
        self.components.set_component(id, spec, merge, &mut self.ctx)
    }

    pub fn set_components(
        &mut self,
        components: BTreeMap<String, ComponentConfig>,
        merge: bool,
    ) -> Result<()> {
        for (id, config) in components {
            self.set_component(&id, Some(ComponentSpec::Config(config)), merge)?;
        }
        Ok(())
    }

    pub fn get_component(&mut self, id: &str, create_if_null: bool) -> Result<Option<&mut dyn Component>> {
        self.components.get_component(id, create_if_null, &mut self.ctx)
    }

    /// Typed access to a component, creating it if needed.
    pub fn component<T: Component>(&mut self, id: &str) -> Result<Option<&mut T>> {
        match self.get_component(id, true)? {
            None => Ok(None),
            Some(component) => component
                .as_any_mut()
                .downcast_mut::<T>()
                .map(Some)
                .ok_or_else(|| TrellisError::ComponentType(id.to_string())),
        }
    }

    pub fn has_component(&self, id: &str) -> bool {
        self.components.has_component(id)
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn log(&self, message: &str, level: LogLevel, category: &str) {
        self.ctx.logger().log(message, level, category);
    }

    /// Trace message, recorded in debug mode only
    pub fn trace(&self, message: &str, category: &str) {
        self.ctx.framework().trace(message, category);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn on_end(&mut self, hook: EndHook) {
        self.ctx.on_end(hook);
    }

    /// Run the end observers (once) and hand back the exit status.
    pub fn end(&mut self, code: i32) -> i32 {
        if !self.ctx.has_ended() {
            self.trace("Application closed", "trellis.base.Application");
        }
        self.ctx.run_end_hooks();
        code
    }

    /// Finish the application and release the framework context.
    ///
    /// Pending end observers run first; then flush observers are dropped
    /// and the logger buffer is cleared. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.end(0);
        let logger = self.ctx.logger();
        logger.set_flush_interval(Duration::ZERO);
        logger.clear_observers();
        logger.flush(false);
        self.ctx.framework().release_application();
    }

    /// Log panics at error level, flush them through the routes and exit
    /// with `exit_status::FAULT`.
    ///
    /// The previous hook runs before the exit so the panic message and
    /// backtrace still reach stderr.
    pub fn install_fault_hook(&self) {
        let logger = self.ctx.logger().clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let message = info.to_string();
            error!("uncaught fault: {}", message);
            logger.log(&message, LogLevel::Error, FAULT_CATEGORY);
            logger.flush(true);
            previous(info);
            std::process::exit(exit_status::FAULT);
        }));
    }

    /// Exit on SIGHUP, SIGINT or SIGTERM with the matching
    /// `exit_status`, dumping buffered logs through the routes first.
    ///
    /// The handlers are registered before this returns; a background
    /// thread waits for delivery.
    #[cfg(unix)]
    pub fn install_signal_handlers(&self) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()?;
        let (mut hangup, mut interrupt, mut terminate) = {
            let _enter = runtime.enter();
            (
                signal(SignalKind::hangup())?,
                signal(SignalKind::interrupt())?,
                signal(SignalKind::terminate())?,
            )
        };

        let logger = self.ctx.logger().clone();
        std::thread::Builder::new()
            .name("trellis-signals".to_string())
            .spawn(move || {
                let status = runtime.block_on(async {
                    tokio::select! {
                        _ = hangup.recv() => exit_status::HANGUP,
                        _ = interrupt.recv() => exit_status::INTERRUPT,
                        _ = terminate.recv() => exit_status::TERMINATE,
                    }
                });
                warn!(status, "terminated by signal");
                logger.flush(true);
                std::process::exit(status);
            })?;
        debug!("signal handlers installed");
        Ok(())
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.dispose();
    }
}
