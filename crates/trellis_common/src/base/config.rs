//! Application Configuration
//!
//! Read from a TOML file (`app.toml`) or built from a JSON value.
//! Keys use camelCase to match the component property names.

use crate::base::component::ComponentConfig;
use crate::error::{Result, TrellisError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

fn default_name() -> String {
    "My Application".to_string()
}

fn default_sendmail() -> String {
    "sendmail".to_string()
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Display name
    #[serde(default = "default_name")]
    pub name: String,

    /// Unique id; derived from base path and name when absent
    #[serde(default)]
    pub id: Option<String>,

    /// Root directory; defaults to the current directory
    #[serde(default)]
    pub base_path: Option<PathBuf>,

    /// Runtime directory, relative to the base path; defaults to `runtime`
    #[serde(default)]
    pub runtime_path: Option<PathBuf>,

    /// Component ids created during construction, in order
    #[serde(default)]
    pub preload: Vec<String>,

    /// Aliases imported during construction
    #[serde(default)]
    pub import: Vec<String>,

    /// Extra root aliases
    #[serde(default)]
    pub aliases: BTreeMap<String, PathBuf>,

    #[serde(default)]
    pub components: BTreeMap<String, ComponentConfig>,

    /// User parameters
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Mail program used by the email log route
    #[serde(default = "default_sendmail")]
    pub sendmail: String,

    /// Console commands: name -> configuration
    #[serde(default)]
    pub command_map: BTreeMap<String, ComponentConfig>,

    /// Directory scanned for `<Name>Command.toml` units
    #[serde(default)]
    pub command_path: Option<PathBuf>,

    /// Unrecognized keys, kept as application properties
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            id: None,
            base_path: None,
            runtime_path: None,
            preload: Vec::new(),
            import: Vec::new(),
            aliases: BTreeMap::new(),
            components: BTreeMap::new(),
            params: Map::new(),
            sendmail: default_sendmail(),
            command_map: BTreeMap::new(),
            command_path: None,
            extra: Map::new(),
        }
    }
}

impl AppConfig {
    /// Load from a file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            TrellisError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Ok(toml::from_str(&text)?)
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    pub fn with_component(mut self, id: &str, config: ComponentConfig) -> Self {
        self.components.insert(id.to_string(), config);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_value(json!({})).unwrap();
        assert_eq!(config.name, "My Application");
        assert_eq!(config.sendmail, "sendmail");
        assert!(config.components.is_empty());
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_load_toml_with_components() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(
            &path,
            r#"
name = "Demo"
preload = ["log"]
theme = "dark"

[params]
adminEmail = "admin@example.com"

[components.log]
class = "LogRouter"

[[components.log.routes]]
class = "FileLogRoute"
levels = "error, warning"
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.name, "Demo");
        assert_eq!(config.preload, vec!["log"]);
        assert_eq!(config.extra.get("theme"), Some(&json!("dark")));
        assert_eq!(config.params.get("adminEmail"), Some(&json!("admin@example.com")));

        let log = &config.components["log"];
        assert_eq!(log.class.as_deref(), Some("LogRouter"));
        assert_eq!(
            log.properties["routes"][0]["levels"],
            json!("error, warning")
        );
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, r#"{"name": "J", "commandMap": {"cache": "CacheCommand"}}"#).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.name, "J");
        assert_eq!(
            config.command_map["cache"].class.as_deref(),
            Some("CacheCommand")
        );
    }

    #[test]
    fn test_missing_file_is_config_error() {
        assert!(matches!(
            AppConfig::load(Path::new("/nonexistent/app.toml")),
            Err(TrellisError::Config(_))
        ));
    }
}
