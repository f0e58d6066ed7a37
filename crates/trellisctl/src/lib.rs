//! Trellisctl library - built-in console commands, exposed for testing

pub mod commands;

use std::collections::BTreeMap;
use trellis_common::{ComponentConfig, Framework};

pub use commands::{AliasCommand, LogCommand};

/// Register the command classes with `framework`.
pub fn register_commands(framework: &Framework) {
    framework.register_class("LogCommand", commands::log::factory());
    framework.register_class("AliasCommand", commands::alias::factory());
}

/// Commands available without any configuration
pub fn default_command_map() -> BTreeMap<String, ComponentConfig> {
    BTreeMap::from([
        ("log".to_string(), ComponentConfig::new("LogCommand")),
        ("alias".to_string(), ComponentConfig::new("AliasCommand")),
    ])
}
