//! Console log route: one colored line per entry on stdout.

use crate::base::component::Component;
use crate::base::context::AppContext;
use crate::base::property::as_bool;
use crate::error::{Result, TrellisError};
use crate::logging::route::{LogRoute, RouteState};
use crate::logging::{LogEntry, LogLevel};
use owo_colors::OwoColorize;
use serde_json::Value;
use std::any::Any;
use std::io::{self, Write};
use tracing::debug;

pub struct ConsoleLogRoute {
    state: RouteState,
    colors: bool,
    writer: Box<dyn Write + Send>,
}

impl Default for ConsoleLogRoute {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleLogRoute {
    pub fn new() -> Self {
        Self {
            state: RouteState::default(),
            colors: true,
            writer: Box::new(io::stdout()),
        }
    }

    /// Write somewhere other than stdout
    pub fn with_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.writer = writer;
        self
    }

    pub fn colors(&self) -> bool {
        self.colors
    }

    fn render(&self, entry: &LogEntry) -> String {
        let time = entry.formatted_time();
        let tag = format!(" [{}] [{}] ", entry.level, entry.category);
        if !self.colors {
            return format!("{}{}{}\n", time, tag, entry.message);
        }
        let tag = match entry.level {
            LogLevel::Error => tag.red().to_string(),
            LogLevel::Warning => tag.yellow().to_string(),
            _ => tag.green().to_string(),
        };
        format!("{}{}{}\n", time.bright_black(), tag, entry.message)
    }
}

impl Component for ConsoleLogRoute {
    fn class_name(&self) -> &str {
        "ConsoleLogRoute"
    }

    fn init(&mut self, _ctx: &mut AppContext) -> Result<()> {
        self.state.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
        if self.state.set_property("ConsoleLogRoute", name, value)? {
            return Ok(());
        }
        match name {
            "colors" => self.colors = as_bool("ConsoleLogRoute", name, value)?,
            _ => return Err(TrellisError::unknown_property("ConsoleLogRoute", name)),
        }
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "colors" => Some(Value::Bool(self.colors)),
            _ => self.state.get_property(name),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_log_route(&mut self) -> Option<&mut dyn LogRoute> {
        Some(self)
    }
}

impl LogRoute for ConsoleLogRoute {
    fn state(&self) -> &RouteState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RouteState {
        &mut self.state
    }

    fn format_log_message(&self, entry: &LogEntry) -> String {
        self.render(entry)
    }

    fn process_logs(&mut self, logs: &[LogEntry]) {
        let text: String = logs.iter().map(|entry| self.render(entry)).collect();
        if let Err(e) = self
            .writer
            .write_all(text.as_bytes())
            .and_then(|_| self.writer.flush())
        {
            debug!("console log route write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_plain_lines_in_order() {
        let out = Shared::default();
        let mut route = ConsoleLogRoute::new().with_writer(Box::new(out.clone()));
        route.set_property("colors", &Value::Bool(false)).unwrap();
        route.process_logs(&[
            LogEntry::new("first", LogLevel::Info, "app"),
            LogEntry::new("second", LogLevel::Error, "db"),
        ]);
        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" [info] [app] first"));
        assert!(lines[1].ends_with(" [error] [db] second"));
    }

    #[test]
    fn test_error_is_red() {
        let route = ConsoleLogRoute::new();
        let line = route.render(&LogEntry::new("boom", LogLevel::Error, "app"));
        assert!(line.contains(&" [error] [app] ".red().to_string()));
        assert!(line.ends_with("boom\n"));
    }

    #[test]
    fn test_unknown_property() {
        let mut route = ConsoleLogRoute::new();
        assert!(route.set_property("logFile", &Value::from("x")).is_err());
        assert!(route.set_property("levels", &Value::from("error")).is_ok());
        assert_eq!(route.state().filter.levels, vec!["error"]);
    }
}
