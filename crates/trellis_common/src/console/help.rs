//! Built-in `help` command.

use crate::base::component::Component;
use crate::base::context::AppContext;
use crate::console::command::{ActionParams, ActionSpec, ConsoleCommand};
use crate::console::runner::ConsoleCommandRunner;
use crate::error::Result;
use std::any::Any;

/// Lists the available commands, or prints one command's help.
/// Always exits with status 1.
pub struct HelpCommand {
    name: String,
    initialized: bool,
}

impl HelpCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initialized: false,
        }
    }

    pub fn render(&self, args: &[String], runner: &ConsoleCommandRunner) -> Result<String> {
        let script = runner.script_name();

        if let Some(requested) = args.first().filter(|name| runner.has_command(name)) {
            if let Some(mut command) = runner.create_command(requested)? {
                if let Some(command) = command.as_command() {
                    return Ok(command.help(runner));
                }
            }
        }

        let names = runner.command_names();
        if names.is_empty() {
            let path = runner
                .command_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return Ok(format!(
                "No available commands.\nPlease define them under the following directory:\n\t{}",
                path
            ));
        }

        Ok(format!(
            "Usage: {script} <command-name> [parameters...]\n\n\
             The following commands are available:\n - {}\n\n\n\
             To see individual command help, use the following:\n   {script} help <command-name>",
            names.join("\n - "),
            script = script
        ))
    }
}

impl Component for HelpCommand {
    fn class_name(&self) -> &str {
        "HelpCommand"
    }

    fn init(&mut self, _ctx: &mut AppContext) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
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

impl ConsoleCommand for HelpCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &[ActionSpec] {
        &[]
    }

    fn run_action(&mut self, _action: &str, _params: ActionParams, _runner: &ConsoleCommandRunner) -> Result<i32> {
        Ok(1)
    }

    fn run(&mut self, args: &[String], runner: &ConsoleCommandRunner) -> Result<i32> {
        println!("{}", self.render(args, runner)?);
        Ok(1)
    }

    fn help(&self, runner: &ConsoleCommandRunner) -> String {
        format!("Usage: {} {} [command-name]", runner.script_name(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::component::ComponentConfig;
    use crate::base::framework::Framework;
    use crate::console::runner::CommandSource;

    #[test]
    fn test_no_commands() {
        let mut runner = ConsoleCommandRunner::new(Framework::new());
        runner.set_command_path("/srv/app/commands".into());
        let text = HelpCommand::new("help").render(&[], &runner).unwrap();
        assert!(text.starts_with("No available commands."));
        assert!(text.ends_with("\t/srv/app/commands"));
    }

    #[test]
    fn test_lists_sorted_commands() {
        let mut runner = ConsoleCommandRunner::new(Framework::new());
        runner.add_command("zeta", CommandSource::Config(ComponentConfig::new("Z")));
        runner.add_command("alpha", CommandSource::Config(ComponentConfig::new("A")));
        let text = HelpCommand::new("help").render(&[], &runner).unwrap();
        assert!(text.contains("The following commands are available:\n - alpha\n - zeta"));
    }

    #[test]
    fn test_own_help() {
        let runner = ConsoleCommandRunner::new(Framework::new());
        assert_eq!(HelpCommand::new("help").help(&runner), "Usage:  help [command-name]");
    }
}
