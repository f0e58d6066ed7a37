//! `log` command: write a message through the application logger.
//!
//! The message goes through the configured log routes when the
//! application ends, so a file or email route sees it like any other
//! entry.

use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use trellis_common::console::{ActionParams, ActionSpec, ConsoleCommand, ConsoleCommandRunner};
use trellis_common::logging::DEFAULT_CATEGORY;
use trellis_common::{AppContext, Component, Factory, Framework, LogLevel, Result, TrellisError};

const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "write",
        params: &["message", "level", "category"],
    },
    ActionSpec {
        name: "levels",
        params: &[],
    },
];

pub struct LogCommand {
    name: String,
    framework: Option<Framework>,
    initialized: bool,
}

impl LogCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            framework: None,
            initialized: false,
        }
    }

    fn write(&self, params: &ActionParams, runner: &ConsoleCommandRunner) -> Result<i32> {
        let message = params
            .string("message")
            .ok_or_else(|| self.usage_error("Missing option: --message", runner))?;

        let level = match params.string("level") {
            Some(name) => LogLevel::parse(&name)
                .ok_or_else(|| self.usage_error(&format!("Unknown level: {}", name), runner))?,
            None => LogLevel::Info,
        };
        let category = params
            .string("category")
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let framework = self
            .framework
            .as_ref()
            .ok_or_else(|| TrellisError::Lifecycle("log command used before init".to_string()))?;
        framework.log(&message, level, &category);
        println!("Logged [{}] [{}] {}", level, category, message);
        Ok(0)
    }
}

pub(crate) fn factory() -> Factory {
    Arc::new(|args: &[Value]| -> Result<Box<dyn Component>> {
        let name = args.first().and_then(Value::as_str).unwrap_or("log");
        Ok(Box::new(LogCommand::new(name)))
    })
}

impl Component for LogCommand {
    fn class_name(&self) -> &str {
        "LogCommand"
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

impl ConsoleCommand for LogCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &[ActionSpec] {
        ACTIONS
    }

    fn default_action(&self) -> &str {
        "write"
    }

    fn run_action(
        &mut self,
        action: &str,
        params: ActionParams,
        runner: &ConsoleCommandRunner,
    ) -> Result<i32> {
        match action {
            "write" => self.write(&params, runner),
            _ => {
                for level in LogLevel::all() {
                    println!("{}", level);
                }
                Ok(0)
            }
        }
    }
}
