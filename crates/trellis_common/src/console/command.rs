//! Console command trait: action dispatch, option binding and help text.

use crate::base::component::Component;
use crate::base::property::as_string;
use crate::console::request::resolve_request;
use crate::console::runner::ConsoleCommandRunner;
use crate::error::{Result, TrellisError};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parameter name bound to the positional arguments
pub const ARGS_PARAM: &str = "args";

/// An action a command accepts, with its parameter names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: &'static str,
    pub params: &'static [&'static str],
}

/// Values bound to an action's parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionParams {
    named: BTreeMap<String, Value>,
    args: Vec<String>,
}

impl ActionParams {
    pub fn new(named: BTreeMap<String, Value>, args: Vec<String>) -> Self {
        Self { named, args }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// String value of a parameter; lists give their last value
    pub fn string(&self, name: &str) -> Option<String> {
        match self.named.get(name)? {
            Value::Array(values) => values.last().and_then(|v| as_string("", name, v).ok()),
            Value::Bool(true) => None,
            other => as_string("", name, other).ok(),
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        match self.named.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !matches!(s.as_str(), "0" | "false" | "no"),
            Some(_) => true,
            None => false,
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

pub trait ConsoleCommand: Component {
    /// Name the command was invoked as
    fn name(&self) -> &str;

    fn actions(&self) -> &[ActionSpec];

    fn default_action(&self) -> &str {
        "index"
    }

    /// Execute a resolved action and return the exit status.
    fn run_action(
        &mut self,
        action: &str,
        params: ActionParams,
        runner: &ConsoleCommandRunner,
    ) -> Result<i32>;

    /// Parse `args`, bind options to the action's parameters and run it.
    ///
    /// Options that are not action parameters are tried as command
    /// properties; anything left over is a usage error.
    fn run(&mut self, args: &[String], runner: &ConsoleCommandRunner) -> Result<i32> {
        let request = resolve_request(args, self.default_action());
        let action = request.action.to_lowercase();

        let spec = self
            .actions()
            .iter()
            .find(|spec| spec.name == action)
            .copied()
            .ok_or_else(|| self.usage_error(&format!("Unknown action: {}", request.action), runner))?;

        let mut options = request.options;
        let mut named = BTreeMap::new();
        for param in spec.params {
            if let Some(value) = options.remove(*param) {
                named.insert(param.to_string(), value);
            }
        }

        let mut unknown = Vec::new();
        for (name, value) in options {
            match self.set_property(&name, &value) {
                Ok(()) => {}
                Err(TrellisError::UnknownProperty { .. }) => unknown.push(name),
                Err(e) => return Err(self.usage_error(&e.to_string(), runner)),
            }
        }
        if !unknown.is_empty() {
            return Err(self.usage_error(&format!("Unknown options: {}", unknown.join(", ")), runner));
        }

        let positional = if spec.params.contains(&ARGS_PARAM) {
            request.args
        } else {
            Vec::new()
        };
        self.run_action(spec.name, ActionParams::new(named, positional), runner)
    }

    /// `Usage: <script> <name>` followed by the actions
    fn help(&self, runner: &ConsoleCommandRunner) -> String {
        let mut help = format!("Usage: {} {}", runner.script_name(), self.name());
        let options = self.option_help();
        match options.len() {
            0 => {}
            1 => {
                help.push(' ');
                help.push_str(&options[0]);
            }
            _ => {
                help.push_str(" <action>\nActions:\n");
                for option in options {
                    help.push_str("    ");
                    help.push_str(&option);
                    help.push('\n');
                }
            }
        }
        help
    }

    /// One line per action: `name --param=value ...`
    fn option_help(&self) -> Vec<String> {
        self.actions()
            .iter()
            .map(|spec| {
                let mut line = spec.name.to_string();
                for param in spec.params.iter().filter(|p| **p != ARGS_PARAM) {
                    line.push_str(&format!(" --{}=value", param));
                }
                line
            })
            .collect()
    }

    fn usage_error(&self, message: &str, runner: &ConsoleCommandRunner) -> TrellisError {
        TrellisError::Usage {
            message: message.to_string(),
            help: self.help(runner),
        }
    }
}
