//! Command line parsing for console commands.
//!
//! `--name=value` is a named option, a bare `--flag` (or an empty value)
//! is `true`, and a repeated name collects its values into a list. The
//! first other word is the action; the rest are positional arguments.

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub action: String,
    pub options: BTreeMap<String, Value>,
    pub args: Vec<String>,
}

fn option_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^--(\w+)(=(.*))?$").expect("static regex"))
}

pub fn resolve_request(args: &[String], default_action: &str) -> ParsedRequest {
    let mut options: BTreeMap<String, Value> = BTreeMap::new();
    let mut positional = Vec::new();
    let mut action: Option<String> = None;

    for arg in args {
        if let Some(caps) = option_pattern().captures(arg) {
            let name = caps[1].to_string();
            let value = match caps.get(3).map(|m| m.as_str()) {
                Some(v) if !v.is_empty() => Value::String(v.to_string()),
                _ => Value::Bool(true),
            };
            match options.get_mut(&name) {
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    options.insert(name, value);
                }
            }
        } else if action.is_some() {
            positional.push(arg.clone());
        } else {
            action = Some(arg.clone());
        }
    }

    ParsedRequest {
        action: action.unwrap_or_else(|| default_action.to_string()),
        options,
        args: positional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_action_options_and_positionals() {
        let request = resolve_request(&args(&["flush", "--key=abc", "--force", "one", "two"]), "index");
        assert_eq!(request.action, "flush");
        assert_eq!(request.options.get("key"), Some(&json!("abc")));
        assert_eq!(request.options.get("force"), Some(&json!(true)));
        assert_eq!(request.args, vec!["one", "two"]);
    }

    #[test]
    fn test_default_action() {
        let request = resolve_request(&args(&["--verbose="]), "index");
        assert_eq!(request.action, "index");
        assert_eq!(request.options.get("verbose"), Some(&json!(true)));
    }

    #[test]
    fn test_repeated_option_collects() {
        let request = resolve_request(&args(&["--tag=a", "--tag=b", "--tag=c"]), "index");
        assert_eq!(request.options.get("tag"), Some(&json!(["a", "b", "c"])));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let request = resolve_request(&args(&["--expr=a=b"]), "index");
        assert_eq!(request.options.get("expr"), Some(&json!("a=b")));
    }

    #[test]
    fn test_single_dash_is_positional() {
        let request = resolve_request(&args(&["run", "-x", "--bad-name=1"]), "index");
        assert_eq!(request.args, vec!["-x", "--bad-name=1"]);
        assert!(request.options.is_empty());
    }
}
