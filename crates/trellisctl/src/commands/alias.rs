//! `alias` command: inspect path aliases.

use serde_json::Value;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use trellis_common::console::{ActionParams, ActionSpec, ConsoleCommand, ConsoleCommandRunner};
use trellis_common::{AppContext, Component, Factory, Framework, Result, TrellisError};

const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "list",
        params: &[],
    },
    ActionSpec {
        name: "resolve",
        params: &["alias", "args"],
    },
];

pub struct AliasCommand {
    name: String,
    framework: Option<Framework>,
    initialized: bool,
}

impl AliasCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            framework: None,
            initialized: false,
        }
    }

    fn framework(&self) -> Result<&Framework> {
        self.framework
            .as_ref()
            .ok_or_else(|| TrellisError::Lifecycle("alias command used before init".to_string()))
    }

    /// `name => path` per root alias, sorted by name
    pub fn render_list(&self) -> Result<String> {
        let lines: Vec<String> = self
            .framework()?
            .aliases()
            .into_iter()
            .map(|(name, path)| format!("{} => {}", name, path.display()))
            .collect();
        Ok(lines.join("\n"))
    }

    pub fn resolve(&self, alias: &str) -> Result<Option<PathBuf>> {
        Ok(self.framework()?.resolve_alias(alias))
    }
}

pub(crate) fn factory() -> Factory {
    Arc::new(|args: &[Value]| -> Result<Box<dyn Component>> {
        let name = args.first().and_then(Value::as_str).unwrap_or("alias");
        Ok(Box::new(AliasCommand::new(name)))
    })
}

impl Component for AliasCommand {
    fn class_name(&self) -> &str {
        "AliasCommand"
    }

    fn init(&mut self, ctx: &mut AppContext) -> Result<()> {
        self.framework = Some(ctx.framework().clone());
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

impl ConsoleCommand for AliasCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &[ActionSpec] {
        ACTIONS
    }

    fn default_action(&self) -> &str {
        "list"
    }

    fn run_action(
        &mut self,
        action: &str,
        params: ActionParams,
        runner: &ConsoleCommandRunner,
    ) -> Result<i32> {
        match action {
            "resolve" => {
                // --alias=x or the first positional
                let alias = params
                    .string("alias")
                    .or_else(|| params.args().first().cloned())
                    .ok_or_else(|| self.usage_error("Missing alias", runner))?;
                match self.resolve(&alias)? {
                    Some(path) => {
                        println!("{}", path.display());
                        Ok(0)
                    }
                    None => {
                        eprintln!("Alias \"{}\" cannot be resolved.", alias);
                        Ok(1)
                    }
                }
            }
            _ => {
                println!("{}", self.render_list()?);
                Ok(0)
            }
        }
    }
}
