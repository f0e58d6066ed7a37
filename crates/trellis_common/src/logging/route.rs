//! Log route base: shared filter state and the collect/process cycle.

use crate::base::component::Component;
use crate::base::property::{as_bool, as_list};
use crate::error::Result;
use crate::logging::filter::normalize_levels;
use crate::logging::{LogEntry, LogFilter, Logger};
use serde_json::Value;

/// State every route carries: enabled flag, filter and pending entries.
#[derive(Debug, Clone)]
pub struct RouteState {
    pub enabled: bool,
    pub filter: LogFilter,
    /// Entries collected but not processed yet
    pub logs: Vec<LogEntry>,
    pub initialized: bool,
}

impl Default for RouteState {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: LogFilter::default(),
            logs: Vec::new(),
            initialized: false,
        }
    }
}

impl RouteState {
    /// Apply one of the common route properties.
    ///
    /// Returns `Ok(false)` when `name` is not a common property so the
    /// route can handle it.
    pub fn set_property(&mut self, class: &str, name: &str, value: &Value) -> Result<bool> {
        match name {
            "enabled" => self.enabled = as_bool(class, name, value)?,
            "levels" => self.filter.levels = normalize_levels(as_list(class, name, value)?),
            "categories" => self.filter.categories = lowercase(as_list(class, name, value)?),
            "except" => self.filter.except = lowercase(as_list(class, name, value)?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "enabled" => Some(Value::Bool(self.enabled)),
            "levels" => Some(Value::from(self.filter.levels.join(","))),
            "categories" => Some(Value::from(self.filter.categories.clone())),
            "except" => Some(Value::from(self.filter.except.clone())),
            _ => None,
        }
    }
}

fn lowercase(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|s| s.to_lowercase()).collect()
}

/// `YYYY-MM-DD HH:MM:SS [level] [category] message\n`
pub fn format_log_message(entry: &LogEntry) -> String {
    format!(
        "{} [{}] [{}] {}\n",
        entry.formatted_time(),
        entry.level,
        entry.category,
        entry.message
    )
}

/// A log sink.
pub trait LogRoute: Component {
    fn state(&self) -> &RouteState;

    fn state_mut(&mut self) -> &mut RouteState;

    /// Render and persist `logs`. Failures stay inside the route.
    fn process_logs(&mut self, logs: &[LogEntry]);

    fn enabled(&self) -> bool {
        self.state().enabled
    }

    fn format_log_message(&self, entry: &LogEntry) -> String {
        format_log_message(entry)
    }

    /// Take the matching entries from `logger`; with `dump`, process and
    /// drop everything pending.
    fn collect_logs(&mut self, logger: &Logger, dump: bool) {
        let logs = logger.get_logs(&self.state().filter);
        self.state_mut().logs.extend(logs);

        if dump && !self.state().logs.is_empty() {
            let pending = std::mem::take(&mut self.state_mut().logs);
            self.process_logs(&pending);
        }
    }
}
