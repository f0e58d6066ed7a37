//! Application context passed to components during `init`.

use crate::base::alias::absolutize;
use crate::base::framework::Framework;
use crate::error::{Result, TrellisError};
use crate::logging::Logger;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

pub type EndHook = Box<dyn FnMut() + Send>;

/// What a component may see of its owning application: identity, paths,
/// the framework handle and the end-of-application hook list.
pub struct AppContext {
    framework: Framework,
    name: String,
    id: Option<String>,
    base_path: PathBuf,
    runtime_path: Option<PathBuf>,
    sendmail: String,
    end_hooks: Vec<EndHook>,
    ended: bool,
}

impl AppContext {
    pub fn new(framework: Framework, name: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            framework,
            name: name.into(),
            id: None,
            base_path: absolutize(&base_path.into()),
            runtime_path: None,
            sendmail: "sendmail".to_string(),
            end_hooks: Vec::new(),
            ended: false,
        }
    }

    pub fn framework(&self) -> &Framework {
        &self.framework
    }

    pub fn logger(&self) -> &Logger {
        self.framework.logger()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Configured id, or the sha256 hex digest of base path + name.
    pub fn id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => {
                let mut hasher = Sha256::new();
                hasher.update(self.base_path.to_string_lossy().as_bytes());
                hasher.update(self.name.as_bytes());
                hex::encode(hasher.finalize())
            }
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Runtime directory; `<base>/runtime` unless set. Not validated here.
    pub fn runtime_path(&self) -> PathBuf {
        self.runtime_path
            .clone()
            .unwrap_or_else(|| self.base_path.join("runtime"))
    }

    /// Set the runtime directory. Relative paths resolve against the base path.
    pub fn set_runtime_path(&mut self, path: &Path) -> Result<()> {
        let resolved = self.base_path.join(path);
        if !resolved.is_dir() {
            return Err(TrellisError::InvalidDirectory {
                what: "Application runtime path",
                path: path.display().to_string(),
            });
        }
        self.runtime_path = Some(resolved);
        Ok(())
    }

    pub fn sendmail(&self) -> &str {
        &self.sendmail
    }

    pub fn set_sendmail(&mut self, path: impl Into<String>) {
        self.sendmail = path.into();
    }

    /// Register an observer for the end of the application.
    pub fn on_end(&mut self, hook: EndHook) {
        self.end_hooks.push(hook);
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Run end observers in registration order. Only the first call runs them.
    pub fn run_end_hooks(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        for mut hook in std::mem::take(&mut self.end_hooks) {
            hook();
        }
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("name", &self.name)
            .field("base_path", &self.base_path)
            .field("runtime_path", &self.runtime_path)
            .field("end_hooks", &self.end_hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[test]
    fn test_default_id_is_stable_hex() {
        let ctx = AppContext::new(Framework::new(), "Demo", "/srv/demo");
        let id = ctx.id();
        assert_eq!(id.len(), 64);
        assert_eq!(id, AppContext::new(Framework::new(), "Demo", "/srv/demo").id());
        assert_ne!(id, AppContext::new(Framework::new(), "Other", "/srv/demo").id());
    }

    #[test]
    fn test_runtime_path_default_and_validation() {
        let dir = TempDir::new().unwrap();
        let mut ctx = AppContext::new(Framework::new(), "Demo", dir.path());
        assert_eq!(ctx.runtime_path(), dir.path().join("runtime"));

        assert!(matches!(
            ctx.set_runtime_path(Path::new("missing")),
            Err(TrellisError::InvalidDirectory { .. })
        ));

        std::fs::create_dir(dir.path().join("var")).unwrap();
        ctx.set_runtime_path(Path::new("var")).unwrap();
        assert_eq!(ctx.runtime_path(), dir.path().join("var"));
    }

    #[test]
    fn test_end_hooks_run_once_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = AppContext::new(Framework::new(), "Demo", "/tmp");
        for n in 0..3 {
            let seen = Arc::clone(&seen);
            ctx.on_end(Box::new(move || seen.lock().unwrap().push(n)));
        }
        ctx.run_end_hooks();
        ctx.run_end_hooks();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert!(ctx.has_ended());
    }
}
