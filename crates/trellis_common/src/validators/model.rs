//! Validatable data models.
//!
//! A model exposes named attributes as JSON values, declares `Rule`s and
//! collects per-attribute error messages. Validators are built from the
//! rules on first use and kept in the model's `ModelState`.

use crate::base::property::split_list_raw;
use crate::error::{Result, TrellisError};
use crate::validators::validator::{create_validator, Validator};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// One validation rule: the attributes it covers, the validator name and
/// the validator's options (`on`, `except`, `message`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub attributes: Vec<String>,
    pub validator: String,
    pub params: Map<String, Value>,
}

impl Rule {
    /// `attributes` is a comma/space separated list.
    pub fn new(attributes: &str, validator: impl Into<String>) -> Self {
        Self {
            attributes: split_list_raw(attributes),
            validator: validator.into(),
            params: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Parse `{"attributes": "a, b", "validator": "length", "min": 3}`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let invalid = || {
            TrellisError::Config(
                "Model has an invalid validation rule. The rule must specify attributes to be validated and the validator name."
                    .to_string(),
            )
        };

        let mut params = value.as_object().cloned().ok_or_else(invalid)?;
        let attributes = match params.remove("attributes") {
            Some(Value::String(list)) => split_list_raw(&list),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(invalid()),
        };
        let validator = match params.remove("validator") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => return Err(invalid()),
        };
        if attributes.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            attributes,
            validator,
            params,
        })
    }
}

/// Errors collected per attribute, in insertion order per attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ModelErrors {
    pub fn add(&mut self, attribute: &str, message: impl Into<String>) {
        self.errors
            .entry(attribute.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.errors.contains_key(attribute)
    }

    pub fn get(&self, attribute: &str) -> &[String] {
        self.errors.get(attribute).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn clear(&mut self, attribute: Option<&str>) {
        match attribute {
            Some(attribute) => {
                self.errors.remove(attribute);
            }
            None => self.errors.clear(),
        }
    }
}

/// Per-model bookkeeping: scenario, errors and the built validators.
#[derive(Default)]
pub struct ModelState {
    scenario: String,
    errors: ModelErrors,
    validators: Option<Vec<Box<dyn Validator>>>,
}

impl ModelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenario(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelState")
            .field("scenario", &self.scenario)
            .field("errors", &self.errors)
            .field(
                "validators",
                &self.validators.as_ref().map(|v| v.len()),
            )
            .finish()
    }
}

/// "department_name" and "department-name" become "departmentName".
pub fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.trim().chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub trait Model {
    fn attribute_names(&self) -> Vec<String>;

    /// Current value of an attribute; `None` when the model has no such
    /// attribute.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Assign an attribute. Returns false for unknown names.
    fn set_attribute(&mut self, name: &str, value: Value) -> bool;

    fn state(&self) -> &ModelState;

    fn state_mut(&mut self) -> &mut ModelState;

    fn rules(&self) -> Vec<Rule> {
        Vec::new()
    }

    fn attribute_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Whether `method` names an inline validation method of this model.
    fn has_inline_validator(&self, method: &str) -> bool {
        let _ = method;
        false
    }

    /// Run an inline validation method; it reports problems via `add_error`.
    fn run_inline_validator(
        &mut self,
        method: &str,
        attribute: &str,
        params: &Map<String, Value>,
    ) -> Result<()> {
        let _ = (attribute, params);
        Err(TrellisError::Config(format!(
            "Model has no inline validator \"{}\".",
            method
        )))
    }

    fn scenario(&self) -> &str {
        &self.state().scenario
    }

    /// Changing the scenario keeps the built validators; each one checks
    /// the scenario when it runs.
    fn set_scenario(&mut self, scenario: &str) {
        self.state_mut().scenario = scenario.to_string();
    }

    fn attribute_label(&self, attribute: &str) -> String {
        self.attribute_labels()
            .remove(attribute)
            .unwrap_or_else(|| camelize(attribute))
    }

    fn add_error(&mut self, attribute: &str, message: &str) {
        self.state_mut().errors.add(attribute, message);
    }

    fn add_errors(&mut self, errors: &BTreeMap<String, Vec<String>>) {
        for (attribute, messages) in errors {
            for message in messages {
                self.add_error(attribute, message);
            }
        }
    }

    /// Any errors at all, or any for `attribute`.
    fn has_errors(&self, attribute: Option<&str>) -> bool {
        match attribute {
            Some(attribute) => self.state().errors.contains(attribute),
            None => !self.state().errors.is_empty(),
        }
    }

    fn errors(&self) -> &ModelErrors {
        &self.state().errors
    }

    fn first_error(&self, attribute: &str) -> Option<&str> {
        self.state().errors.get(attribute).first().map(String::as_str)
    }

    fn clear_errors(&mut self, attribute: Option<&str>) {
        self.state_mut().errors.clear(attribute);
    }

    /// Attribute values by name, all of them or only `names`. Unknown
    /// names map to null.
    fn attributes(&self, names: Option<&[&str]>) -> Map<String, Value> {
        let names: Vec<String> = match names {
            Some(names) => names.iter().map(|n| n.to_string()).collect(),
            None => self.attribute_names(),
        };
        names
            .into_iter()
            .map(|name| {
                let value = self.attribute(&name).unwrap_or(Value::Null);
                (name, value)
            })
            .collect()
    }

    /// Massive assignment; names outside `attribute_names` are ignored.
    fn set_attributes(&mut self, values: &Map<String, Value>) {
        let known = self.attribute_names();
        for (name, value) in values {
            if known.iter().any(|k| k == name) {
                self.set_attribute(name, value.clone());
            }
        }
    }

    /// Null out the given attributes, or every attribute.
    fn unset_attributes(&mut self, names: Option<&[&str]>) {
        let names: Vec<String> = match names {
            Some(names) => names.iter().map(|n| n.to_string()).collect(),
            None => self.attribute_names(),
        };
        for name in names {
            if self.attribute(&name).is_some() {
                self.set_attribute(&name, Value::Null);
            }
        }
    }

    /// Build validators from `rules()`. Invalid rules are configuration
    /// errors.
    fn create_validators(&self) -> Result<Vec<Box<dyn Validator>>> {
        self.rules()
            .iter()
            .map(|rule| create_validator(rule, self.has_inline_validator(&rule.validator)))
            .collect()
    }

    /// Run every validator that applies to the current scenario, limited
    /// to `attributes` when given. Returns whether the model is error free.
    fn validate(&mut self, attributes: Option<&[&str]>, clear_errors: bool) -> Result<bool>
    where
        Self: Sized,
    {
        if clear_errors {
            self.clear_errors(None);
        }

        let validators = match self.state_mut().validators.take() {
            Some(validators) => validators,
            None => self.create_validators()?,
        };

        let scenario = self.scenario().to_string();
        let only: Option<Vec<String>> =
            attributes.map(|names| names.iter().map(|n| n.to_string()).collect());
        let mut outcome = Ok(());
        for validator in validators.iter().filter(|v| v.applies_to(&scenario)) {
            outcome = validator.validate(self, only.as_deref());
            if outcome.is_err() {
                break;
            }
        }
        self.state_mut().validators = Some(validators);

        outcome.map(|_| !self.has_errors(None))
    }

    /// Whether a `required` rule covers `attribute` in the current scenario.
    fn is_attribute_required(&mut self, attribute: &str) -> Result<bool> {
        if self.state().validators.is_none() {
            let validators = self.create_validators()?;
            self.state_mut().validators = Some(validators);
        }
        let scenario = self.scenario().to_string();
        Ok(self
            .state()
            .validators
            .iter()
            .flatten()
            .any(|v| {
                v.is_required()
                    && v.applies_to(&scenario)
                    && v.base().attributes.iter().any(|a| a == attribute)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Signup {
        username: Value,
        email: Value,
        state: ModelState,
    }

    impl Model for Signup {
        fn attribute_names(&self) -> Vec<String> {
            vec!["username".to_string(), "email".to_string()]
        }

        fn attribute(&self, name: &str) -> Option<Value> {
            match name {
                "username" => Some(self.username.clone()),
                "email" => Some(self.email.clone()),
                _ => None,
            }
        }

        fn set_attribute(&mut self, name: &str, value: Value) -> bool {
            match name {
                "username" => self.username = value,
                "email" => self.email = value,
                _ => return false,
            }
            true
        }

        fn state(&self) -> &ModelState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut ModelState {
            &mut self.state
        }

        fn rules(&self) -> Vec<Rule> {
            vec![
                Rule::new("username, email", "required"),
                Rule::new("username", "length").with("min", 3).with("max", 12),
                Rule::new("email", "email").with("except", "import"),
                Rule::new("username", "not_admin").with("on", "signup"),
            ]
        }

        fn attribute_labels(&self) -> BTreeMap<String, String> {
            BTreeMap::from([("email".to_string(), "E-mail".to_string())])
        }

        fn has_inline_validator(&self, method: &str) -> bool {
            method == "not_admin"
        }

        fn run_inline_validator(
            &mut self,
            _method: &str,
            attribute: &str,
            _params: &Map<String, Value>,
        ) -> Result<()> {
            if self.username == json!("admin") {
                let label = self.attribute_label(attribute);
                self.add_error(attribute, &format!("{} is reserved.", label));
            }
            Ok(())
        }
    }

    #[test]
    fn test_rule_from_value() {
        let rule = Rule::from_value(&json!({
            "attributes": "a, b", "validator": "length", "min": 3
        }))
        .unwrap();
        assert_eq!(rule.attributes, vec!["a", "b"]);
        assert_eq!(rule.validator, "length");
        assert_eq!(rule.params["min"], json!(3));

        assert!(matches!(
            Rule::from_value(&json!({"validator": "required"})),
            Err(TrellisError::Config(_))
        ));
        assert!(Rule::from_value(&json!({"attributes": "a"})).is_err());
        assert!(Rule::from_value(&json!("required")).is_err());
    }

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("department_name"), "departmentName");
        assert_eq!(camelize("department-name"), "departmentName");
        assert_eq!(camelize("_private"), "private");
        assert_eq!(camelize("email"), "email");
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut model = Signup::default();
        assert!(!model.validate(None, true).unwrap());
        assert_eq!(model.first_error("username"), Some("username cannot be blank."));
        assert_eq!(model.first_error("email"), Some("E-mail cannot be blank."));

        model.username = json!("jo");
        model.email = json!("not-an-email");
        assert!(!model.validate(None, true).unwrap());
        assert_eq!(
            model.errors().get("username"),
            ["username is too short (minimum is 3 characters)."]
        );
        assert_eq!(model.first_error("email"), Some("E-mail is not a valid email address."));

        model.username = json!("joanna");
        model.email = json!("jo@example.com");
        assert!(model.validate(None, true).unwrap());
        assert!(!model.has_errors(None));
    }

    #[test]
    fn test_scenarios() {
        let mut model = Signup {
            username: json!("admin"),
            email: json!("bad"),
            ..Signup::default()
        };
        assert!(!model.validate(None, true).unwrap());
        assert!(!model.has_errors(Some("username")));

        model.set_scenario("signup");
        model.validate(None, true).unwrap();
        assert_eq!(model.first_error("username"), Some("username is reserved."));

        model.set_scenario("import");
        model.validate(None, true).unwrap();
        assert!(!model.has_errors(Some("email")));
    }

    #[test]
    fn test_validate_subset_and_keep_errors() {
        let mut model = Signup::default();
        model.add_error("other", "kept");
        model.validate(Some(&["email"]), false).unwrap();
        assert!(model.has_errors(Some("other")));
        assert!(model.has_errors(Some("email")));
        assert!(!model.has_errors(Some("username")));

        model.clear_errors(Some("email"));
        assert!(!model.has_errors(Some("email")));
        assert!(model.has_errors(None));
    }

    #[test]
    fn test_attribute_assignment() {
        let mut model = Signup::default();
        let values = json!({"username": "joanna", "password": "secret"});
        model.set_attributes(values.as_object().unwrap());
        assert_eq!(model.username, json!("joanna"));

        let attributes = model.attributes(Some(&["username", "missing"]));
        assert_eq!(attributes["username"], json!("joanna"));
        assert_eq!(attributes["missing"], Value::Null);

        model.unset_attributes(None);
        assert_eq!(model.username, Value::Null);
    }

    #[test]
    fn test_is_attribute_required() {
        let mut model = Signup::default();
        assert!(model.is_attribute_required("username").unwrap());
        assert!(!model.is_attribute_required("password").unwrap());
    }
}
