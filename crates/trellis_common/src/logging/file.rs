//! File log route with size based rotation.
//!
//! Layout: `<logPath>/<logFile>` plus backups `<logFile>.1` (newest) up to
//! `<logFile>.<maxLogFiles>` (oldest). When the live file exceeds
//! `maxFileSize` KB before a write, backups shift up by one, the oldest
//! is deleted and the live file becomes `.1`.
//!
//! Writes hold an exclusive advisory lock. I/O failures are reported
//! through `tracing` and otherwise ignored.

use crate::base::component::Component;
use crate::base::context::AppContext;
use crate::base::property::{as_opt_string, as_string, as_u64};
use crate::error::{Result, TrellisError};
use crate::logging::route::{LogRoute, RouteState};
use crate::logging::LogEntry;
use serde_json::Value;
use std::any::Any;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default maximum size of the live file, in kilobytes
pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 1024;

/// Default number of backup files kept
pub const DEFAULT_MAX_LOG_FILES: u64 = 5;

pub const DEFAULT_LOG_FILE: &str = "application.log";

pub struct FileLogRoute {
    state: RouteState,
    log_path: Option<PathBuf>,
    log_file: String,
    max_file_size: u64,
    max_log_files: u64,
}

impl Default for FileLogRoute {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLogRoute {
    pub fn new() -> Self {
        Self {
            state: RouteState::default(),
            log_path: None,
            log_file: DEFAULT_LOG_FILE.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE_KB,
            max_log_files: DEFAULT_MAX_LOG_FILES,
        }
    }

    /// Directory holding the log files; resolved during `init`
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    /// Maximum live file size in KB (at least 1)
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Backups kept (at least 1)
    pub fn max_log_files(&self) -> u64 {
        self.max_log_files
    }

    pub fn set_max_file_size(&mut self, kb: u64) {
        self.max_file_size = kb.max(1);
    }

    pub fn set_max_log_files(&mut self, count: u64) {
        self.max_log_files = count.max(1);
    }

    /// Full path of the live log file
    pub fn file_path(&self) -> PathBuf {
        match &self.log_path {
            Some(dir) => dir.join(&self.log_file),
            None => PathBuf::from(&self.log_file),
        }
    }

    fn backup_path(&self, index: u64) -> PathBuf {
        let mut path = self.file_path().into_os_string();
        path.push(format!(".{}", index));
        PathBuf::from(path)
    }

    /// Shift backups up by one and move the live file to `.1`.
    pub fn rotate_files(&self) {
        let live = self.file_path();
        for index in (1..=self.max_log_files).rev() {
            let backup = self.backup_path(index);
            if !backup.is_file() {
                continue;
            }
            let result = if index == self.max_log_files {
                fs::remove_file(&backup)
            } else {
                fs::rename(&backup, self.backup_path(index + 1))
            };
            if let Err(e) = result {
                debug!("log rotation failed for {}: {}", backup.display(), e);
            }
        }
        if live.is_file() {
            if let Err(e) = fs::rename(&live, self.backup_path(1)) {
                debug!("log rotation failed for {}: {}", live.display(), e);
            }
        }
    }

    fn write_logs(&self, text: &str) -> io::Result<()> {
        let path = self.file_path();
        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if size > self.max_file_size * 1024 {
            self.rotate_files();
        }
        append_locked(&path, text)
    }
}

#[cfg(unix)]
fn append_locked(path: &Path, text: &str) -> io::Result<()> {
    use nix::fcntl::{Flock, FlockArg};

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut file = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| io::Error::from(errno))?;
    file.write_all(text.as_bytes())?;
    file.flush()
}

#[cfg(not(unix))]
fn append_locked(path: &Path, text: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()
}

impl Component for FileLogRoute {
    fn class_name(&self) -> &str {
        "FileLogRoute"
    }

    /// Resolve `logPath` against the base path (default: the runtime
    /// path) and check that it is a directory.
    fn init(&mut self, ctx: &mut AppContext) -> Result<()> {
        let dir = match &self.log_path {
            Some(path) => ctx.base_path().join(path),
            None => ctx.runtime_path(),
        };
        if !dir.is_dir() {
            return Err(TrellisError::InvalidDirectory {
                what: "FileLogRoute.logPath",
                path: dir.display().to_string(),
            });
        }
        self.log_path = Some(dir);
        self.state.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
        const CLASS: &str = "FileLogRoute";
        if self.state.set_property(CLASS, name, value)? {
            return Ok(());
        }
        match name {
            "logPath" => self.log_path = as_opt_string(CLASS, name, value)?.map(PathBuf::from),
            "logFile" => self.log_file = as_string(CLASS, name, value)?,
            "maxFileSize" => self.set_max_file_size(as_u64(CLASS, name, value)?),
            "maxLogFiles" => self.set_max_log_files(as_u64(CLASS, name, value)?),
            _ => return Err(TrellisError::unknown_property(CLASS, name)),
        }
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "logPath" => self
                .log_path
                .as_ref()
                .map(|p| Value::from(p.display().to_string())),
            "logFile" => Some(Value::from(self.log_file.clone())),
            "maxFileSize" => Some(Value::from(self.max_file_size)),
            "maxLogFiles" => Some(Value::from(self.max_log_files)),
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

impl LogRoute for FileLogRoute {
    fn state(&self) -> &RouteState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RouteState {
        &mut self.state
    }

    fn process_logs(&mut self, logs: &[LogEntry]) {
        let text: String = logs.iter().map(|entry| self.format_log_message(entry)).collect();
        if let Err(e) = self.write_logs(&text) {
            debug!("file log route write to {} failed: {}", self.file_path().display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::framework::Framework;
    use crate::logging::LogLevel;
    use tempfile::TempDir;

    fn route_in(dir: &TempDir) -> FileLogRoute {
        let mut route = FileLogRoute::new();
        route
            .set_property("logPath", &Value::from(dir.path().display().to_string()))
            .unwrap();
        let mut ctx = AppContext::new(Framework::new(), "Test", dir.path());
        route.init(&mut ctx).unwrap();
        route
    }

    #[test]
    fn test_defaults_and_minimums() {
        let mut route = FileLogRoute::new();
        assert_eq!(route.log_file(), "application.log");
        assert_eq!(route.max_file_size(), 1024);
        assert_eq!(route.max_log_files(), 5);
        route.set_property("maxFileSize", &Value::from(0)).unwrap();
        route.set_property("maxLogFiles", &Value::from(0)).unwrap();
        assert_eq!(route.max_file_size(), 1);
        assert_eq!(route.max_log_files(), 1);
    }

    #[test]
    fn test_init_requires_directory() {
        let dir = TempDir::new().unwrap();
        let mut ctx = AppContext::new(Framework::new(), "Test", dir.path());
        let mut route = FileLogRoute::new();
        assert!(matches!(
            route.init(&mut ctx),
            Err(TrellisError::InvalidDirectory { .. })
        ));

        fs::create_dir(dir.path().join("runtime")).unwrap();
        route.init(&mut ctx).unwrap();
        assert_eq!(route.log_path(), Some(dir.path().join("runtime").as_path()));
    }

    #[test]
    fn test_appends_formatted_lines() {
        let dir = TempDir::new().unwrap();
        let mut route = route_in(&dir);
        route.process_logs(&[LogEntry::new("one", LogLevel::Info, "app")]);
        route.process_logs(&[LogEntry::new("two", LogLevel::Error, "db")]);
        let text = fs::read_to_string(dir.path().join("application.log")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" [info] [app] one"));
        assert!(lines[1].ends_with(" [error] [db] two"));
    }

    #[test]
    fn test_rotation_shifts_backups() {
        let dir = TempDir::new().unwrap();
        let mut route = route_in(&dir);
        route.set_max_log_files(3);
        let base = dir.path().join("application.log");
        for (suffix, content) in [("", "live"), (".1", "one"), (".2", "two"), (".3", "three")] {
            fs::write(format!("{}{}", base.display(), suffix), content).unwrap();
        }

        route.rotate_files();

        let read = |suffix: &str| fs::read_to_string(format!("{}{}", base.display(), suffix)).ok();
        assert_eq!(read(""), None);
        assert_eq!(read(".1").as_deref(), Some("live"));
        assert_eq!(read(".2").as_deref(), Some("one"));
        assert_eq!(read(".3").as_deref(), Some("two"));
        assert_eq!(read(".4"), None);
    }

    #[test]
    fn test_rotates_when_over_size() {
        let dir = TempDir::new().unwrap();
        let mut route = route_in(&dir);
        route.set_max_file_size(1);
        let live = dir.path().join("application.log");
        fs::write(&live, vec![b'x'; 2048]).unwrap();

        route.process_logs(&[LogEntry::new("fresh", LogLevel::Info, "app")]);

        let text = fs::read_to_string(&live).unwrap();
        assert!(text.ends_with(" [info] [app] fresh\n"));
        assert_eq!(text.lines().count(), 1);
        assert_eq!(fs::metadata(dir.path().join("application.log.1")).unwrap().len(), 2048);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let mut route = route_in(&dir);
        fs::create_dir(dir.path().join("application.log")).unwrap();
        route.process_logs(&[LogEntry::new("lost", LogLevel::Info, "app")]);
    }
}
