//! Console application: an `Application` plus a command runner.

use crate::base::application::Application;
use crate::base::config::AppConfig;
use crate::base::framework::Framework;
use crate::console::runner::{CommandSource, ConsoleCommandRunner};
use crate::error::{Result, TrellisError};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConsoleApplication {
    app: Application,
    runner: ConsoleCommandRunner,
}

impl ConsoleApplication {
    /// Build the application, register `commandMap` and scan the command
    /// path (`<basePath>/commands` when it exists) for command units.
    pub fn new(framework: Framework, mut config: AppConfig) -> Result<Self> {
        let command_map = std::mem::take(&mut config.command_map);
        let command_path = config.command_path.take();

        let app = Application::new(framework.clone(), config)?;
        let mut runner = ConsoleCommandRunner::new(framework);
        for (name, command) in command_map {
            runner.add_command(&name, CommandSource::Config(command));
        }

        let command_path = match command_path {
            Some(path) => Some(resolve_command_path(app.base_path(), &path)?),
            None => Some(app.base_path().join("commands")).filter(|p| p.is_dir()),
        };
        if let Some(dir) = command_path {
            debug!("scanning {} for commands", dir.display());
            runner.add_commands(&dir);
            runner.set_command_path(dir);
        }

        Ok(Self { app, runner })
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut Application {
        &mut self.app
    }

    pub fn runner(&self) -> &ConsoleCommandRunner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut ConsoleCommandRunner {
        &mut self.runner
    }

    /// Run the command line and end the application with its status.
    ///
    /// Usage errors go to stderr with their help text.
    pub fn run(&mut self, argv: &[String]) -> i32 {
        let code = match self.runner.run(argv, self.app.context_mut()) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("{}", e);
                e.exit_code()
            }
        };
        self.app.end(code)
    }
}

fn resolve_command_path(base: &Path, path: &Path) -> Result<PathBuf> {
    let resolved = base.join(path);
    if !resolved.is_dir() {
        return Err(TrellisError::InvalidDirectory {
            what: "The command path",
            path: path.display().to_string(),
        });
    }
    Ok(resolved)
}
