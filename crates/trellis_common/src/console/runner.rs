//! Console command runner: maps command names to command components.

use crate::base::component::{Component, ComponentConfig};
use crate::base::context::AppContext;
use crate::base::framework::Framework;
use crate::console::help::HelpCommand;
use crate::error::{Result, TrellisError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of command unit files found by `find_commands`
pub const COMMAND_UNIT_SUFFIX: &str = "Command.toml";

/// Where a command comes from
#[derive(Debug, Clone, PartialEq)]
pub enum CommandSource {
    Config(ComponentConfig),
    /// Class unit file declaring the command
    Unit(PathBuf),
}

pub struct ConsoleCommandRunner {
    framework: Framework,
    commands: BTreeMap<String, CommandSource>,
    script_name: String,
    command_path: Option<PathBuf>,
}

impl ConsoleCommandRunner {
    pub fn new(framework: Framework) -> Self {
        Self {
            framework,
            commands: BTreeMap::new(),
            script_name: String::new(),
            command_path: None,
        }
    }

    /// Base name of the program, set by `run`
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn command_path(&self) -> Option<&Path> {
        self.command_path.as_deref()
    }

    pub fn set_command_path(&mut self, path: PathBuf) {
        self.command_path = Some(path);
    }

    /// Register a command, replacing any existing one of that name
    pub fn add_command(&mut self, name: &str, source: CommandSource) {
        self.commands.insert(name.to_lowercase(), source);
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_lowercase())
    }

    /// Registered names, sorted
    pub fn command_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    /// `<Name>Command.toml` files in `dir`, keyed by lowercase name.
    /// An unreadable directory yields nothing.
    pub fn find_commands(dir: &Path) -> BTreeMap<String, PathBuf> {
        let mut found = BTreeMap::new();
        let Ok(entries) = fs::read_dir(dir) else {
            return found;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.len() <= COMMAND_UNIT_SUFFIX.len() {
                continue;
            }
            if let Some(name) = file_name.strip_suffix(COMMAND_UNIT_SUFFIX) {
                found.insert(name.to_lowercase(), entry.path());
            }
        }
        found
    }

    /// Add the commands found in `dir` without overriding existing names.
    pub fn add_commands(&mut self, dir: &Path) {
        for (name, path) in Self::find_commands(dir) {
            self.commands
                .entry(name)
                .or_insert(CommandSource::Unit(path));
        }
    }

    /// Build the command registered as `name`.
    ///
    /// `help` is always available. Unknown names give `None`.
    pub fn create_command(&self, name: &str) -> Result<Option<Box<dyn Component>>> {
        let name = name.to_lowercase();
        let args = [Value::String(name.clone())];

        let mut command = match self.commands.get(&name) {
            Some(CommandSource::Config(config)) => self.framework.create_component(config, &args)?,
            Some(CommandSource::Unit(path)) => {
                let class = self.framework.load_class_unit(path)?;
                self.framework
                    .create_component(&ComponentConfig::new(class), &args)?
            }
            None if name == "help" => Box::new(HelpCommand::new("help")),
            None => return Ok(None),
        };

        if command.as_command().is_none() {
            return Err(TrellisError::Config(format!(
                "\"{}\" is not a console command",
                command.class_name()
            )));
        }
        Ok(Some(command))
    }

    /// Run the command named by `argv[1]` (default `help`) with the
    /// remaining arguments. Unknown commands fall back to `help`.
    pub fn run(&mut self, argv: &[String], ctx: &mut AppContext) -> Result<i32> {
        self.script_name = argv
            .first()
            .map(|arg0| {
                Path::new(arg0)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| arg0.clone())
            })
            .unwrap_or_default();

        let name = argv.get(1).map(|s| s.as_str()).unwrap_or("help");
        let args = argv.get(2..).unwrap_or_default();

        let mut command = match self.create_command(name)? {
            Some(command) => command,
            None => {
                debug!(command = name, "unknown command, showing help");
                self.create_command("help")?
                    .ok_or_else(|| TrellisError::Config("help command unavailable".to_string()))?
            }
        };

        command.init(ctx)?;
        let runner: &ConsoleCommandRunner = self;
        match command.as_command() {
            Some(command) => command.run(args, runner),
            None => Err(TrellisError::Config(format!("\"{}\" is not a console command", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::command::{ActionParams, ActionSpec, ConsoleCommand};
    use crate::console::help::HelpCommand;
    use std::any::Any;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Echoes what it was given back through its exit status.
    struct CountCommand {
        name: String,
        verbose: bool,
        initialized: bool,
    }

    impl Component for CountCommand {
        fn class_name(&self) -> &str {
            "CountCommand"
        }
        fn init(&mut self, _ctx: &mut AppContext) -> Result<()> {
            self.initialized = true;
            Ok(())
        }
        fn is_initialized(&self) -> bool {
            self.initialized
        }
        fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
            match name {
                "verbose" => {
                    self.verbose = value.as_bool().unwrap_or(false);
                    Ok(())
                }
                _ => Err(TrellisError::unknown_property("CountCommand", name)),
            }
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn as_command(&mut self) -> Option<&mut dyn ConsoleCommand> {
            Some(self)
        }
    }

    impl ConsoleCommand for CountCommand {
        fn name(&self) -> &str {
            &self.name
        }
        fn actions(&self) -> &[ActionSpec] {
            &[
                ActionSpec {
                    name: "index",
                    params: &["args"],
                },
                ActionSpec {
                    name: "add",
                    params: &["amount"],
                },
            ]
        }
        fn run_action(&mut self, action: &str, params: ActionParams, _runner: &ConsoleCommandRunner) -> Result<i32> {
            let bonus = if self.verbose { 100 } else { 0 };
            match action {
                "index" => Ok(params.args().len() as i32 + bonus),
                _ => Ok(params
                    .string("amount")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0)
                    + bonus),
            }
        }
    }

    fn runner() -> (ConsoleCommandRunner, AppContext) {
        let framework = Framework::new();
        framework.register_class(
            "CountCommand",
            Arc::new(|args: &[Value]| -> Result<Box<dyn Component>> {
                Ok(Box::new(CountCommand {
                    name: args.first().and_then(|v| v.as_str()).unwrap_or("count").to_string(),
                    verbose: false,
                    initialized: false,
                }))
            }),
        );
        let ctx = AppContext::new(framework.clone(), "Runner", "/tmp");
        let mut runner = ConsoleCommandRunner::new(framework);
        runner.add_command("count", CommandSource::Config(ComponentConfig::new("CountCommand")));
        (runner, ctx)
    }

    fn argv(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dispatch_default_action_with_positionals() {
        let (mut runner, mut ctx) = runner();
        assert_eq!(runner.run(&argv(&["/usr/bin/tool", "count", "index", "a", "b"]), &mut ctx).unwrap(), 2);
        assert_eq!(runner.script_name(), "tool");
        assert_eq!(runner.run(&argv(&["tool", "COUNT"]), &mut ctx).unwrap(), 0);
    }

    #[test]
    fn test_named_param_and_command_property() {
        let (mut runner, mut ctx) = runner();
        assert_eq!(runner.run(&argv(&["tool", "count", "add", "--amount=7"]), &mut ctx).unwrap(), 7);
        assert_eq!(
            runner.run(&argv(&["tool", "count", "add", "--amount=7", "--verbose"]), &mut ctx).unwrap(),
            107
        );
    }

    #[test]
    fn test_unknown_action_and_options() {
        let (mut runner, mut ctx) = runner();
        let err = runner.run(&argv(&["tool", "count", "nope"]), &mut ctx).unwrap_err();
        match err {
            TrellisError::Usage { message, help } => {
                assert_eq!(message, "Unknown action: nope");
                assert_eq!(help, "Usage: tool count <action>\nActions:\n    index\n    add --amount=value\n");
            }
            other => panic!("unexpected error: {}", other),
        }

        let err = runner.run(&argv(&["tool", "count", "add", "--x=1", "--y"]), &mut ctx).unwrap_err();
        assert!(matches!(err, TrellisError::Usage { ref message, .. } if message == "Unknown options: x, y"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_unknown_command_falls_back_to_help() {
        let (mut runner, mut ctx) = runner();
        assert_eq!(runner.run(&argv(&["tool", "missing"]), &mut ctx).unwrap(), 1);
        assert_eq!(runner.run(&argv(&["tool"]), &mut ctx).unwrap(), 1);
    }

    #[test]
    fn test_help_is_builtin() {
        let (runner, _) = runner();
        let mut help = runner.create_command("help").unwrap().unwrap();
        assert!(help.as_any_mut().downcast_mut::<HelpCommand>().is_some());
        assert!(runner.create_command("other").unwrap().is_none());
    }

    #[test]
    fn test_find_and_add_commands() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("CountCommand.toml"), "extends = \"CountCommand\"\n").unwrap();
        fs::write(dir.path().join("MigrateCommand.toml"), "extends = \"CountCommand\"\n").unwrap();
        fs::write(dir.path().join("Command.toml"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = ConsoleCommandRunner::find_commands(dir.path());
        assert_eq!(found.keys().cloned().collect::<Vec<_>>(), vec!["count", "migrate"]);

        let (mut runner, mut ctx) = runner();
        runner.add_commands(dir.path());
        assert_eq!(runner.command_names(), vec!["count", "migrate"]);
        assert!(matches!(
            runner.commands.get("count"),
            Some(CommandSource::Config(_))
        ));
        assert_eq!(runner.run(&argv(&["tool", "migrate", "index", "x"]), &mut ctx).unwrap(), 1);
    }

    #[test]
    fn test_missing_command_dir_is_empty() {
        assert!(ConsoleCommandRunner::find_commands(Path::new("/nonexistent/commands")).is_empty());
    }
}
