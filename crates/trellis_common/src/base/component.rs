//! Component base trait and component configuration.
//!
//! A component is anything the application can build from configuration:
//! it has a class name, accepts named property assignments and goes
//! through a one-time `init` step. Properties are explicit setters; an
//! unknown name is an error rather than a silent no-op.

use crate::base::context::AppContext;
use crate::console::ConsoleCommand;
use crate::error::{Result, TrellisError};
use crate::logging::LogRoute;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;

pub trait Component: Any + Send {
    /// Class name this component was registered under
    fn class_name(&self) -> &str;

    /// One-time initialization, run by whoever constructs the component.
    fn init(&mut self, ctx: &mut AppContext) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Teardown when the registry discards or unloads the instance.
    /// Undo any subscriptions made in `init`.
    fn dispose(&mut self, ctx: &mut AppContext) {
        let _ = ctx;
    }

    /// Assign a named property. Unknown names return `UnknownProperty`.
    fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
        let _ = value;
        Err(TrellisError::unknown_property(self.class_name(), name))
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn as_log_route(&mut self) -> Option<&mut dyn LogRoute> {
        None
    }

    fn as_command(&mut self) -> Option<&mut dyn ConsoleCommand> {
        None
    }
}

/// Declarative component configuration: a class plus initial properties.
///
/// Deserializes from either a bare class name (`"LogRouter"`) or a table
/// with a `class` key and any number of property keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ComponentConfig {
    pub class: Option<String>,
    pub properties: Map<String, Value>,
}

impl ComponentConfig {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            properties: Map::new(),
        }
    }

    /// Configuration without a class; only valid for merging into an
    /// existing registration.
    pub fn properties_only() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(class) => Ok(Self::new(class)),
            Value::Object(mut map) => {
                let class = match map.remove("class") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(class)) => Some(class),
                    Some(_) => {
                        return Err(TrellisError::Config(
                            "the \"class\" element must be a string".to_string(),
                        ))
                    }
                };
                Ok(Self {
                    class,
                    properties: map,
                })
            }
            other => Err(TrellisError::Config(format!(
                "component configuration must be a class name or a table, got {}",
                other
            ))),
        }
    }

    /// Whether the component may be created. Defaults to true.
    pub fn is_enabled(&self) -> bool {
        match self.properties.get("enabled") {
            Some(Value::Bool(enabled)) => *enabled,
            Some(Value::Null) | None => true,
            Some(other) => crate::base::property::as_bool("", "enabled", other).unwrap_or(true),
        }
    }

    /// Shallow merge: keys in `other` overwrite ours.
    pub fn merge(&mut self, other: ComponentConfig) {
        if other.class.is_some() {
            self.class = other.class;
        }
        for (key, value) in other.properties {
            self.properties.insert(key, value);
        }
    }
}

impl TryFrom<Value> for ComponentConfig {
    type Error = TrellisError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<ComponentConfig> for Value {
    fn from(config: ComponentConfig) -> Value {
        let mut map = config.properties;
        if let Some(class) = config.class {
            map.insert("class".to_string(), Value::String(class));
        }
        Value::Object(map)
    }
}
