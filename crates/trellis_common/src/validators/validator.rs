//! Validator trait, shared options and the rule -> validator factory.

use crate::base::property::{as_bool, as_list, as_opt_string, loose_string};
use crate::error::{Result, TrellisError};
use crate::validators::builtins::{
    BooleanValidator, EmailValidator, InlineValidator, IpValidator, LengthValidator,
    NumberValidator, RangeValidator, RequiredValidator, UrlValidator,
};
use crate::validators::model::{Model, Rule};
use serde_json::Value;

/// Names accepted in a rule's `validator` field.
pub const BUILTIN_VALIDATORS: &[&str] = &[
    "required", "url", "length", "numerical", "boolean", "in", "ip", "email",
];

/// Options every validator understands.
#[derive(Debug, Clone, Default)]
pub struct ValidatorBase {
    pub attributes: Vec<String>,
    /// Scenarios the validator is limited to; empty means all
    pub on: Vec<String>,
    /// Scenarios the validator never runs in
    pub except: Vec<String>,
    pub skip_on_error: bool,
    pub message: Option<String>,
}

impl ValidatorBase {
    pub fn applies_to(&self, scenario: &str) -> bool {
        if self.except.iter().any(|s| s == scenario) {
            return false;
        }
        self.on.is_empty() || self.on.iter().any(|s| s == scenario)
    }

    /// Apply a shared option. Returns false when `name` is not one.
    fn set_option(&mut self, class: &str, name: &str, value: &Value) -> Result<bool> {
        match name {
            "on" => self.on = as_list(class, name, value)?,
            "except" => self.except = as_list(class, name, value)?,
            "skipOnError" => self.skip_on_error = as_bool(class, name, value)?,
            "message" => self.message = as_opt_string(class, name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

pub trait Validator: Send {
    /// Rule name this validator answers to
    fn name(&self) -> &'static str;

    fn base(&self) -> &ValidatorBase;

    fn base_mut(&mut self) -> &mut ValidatorBase;

    /// Validator specific option; unknown names are configuration errors.
    fn set_option(&mut self, name: &str, value: &Value) -> Result<()> {
        let _ = value;
        Err(unknown_option(self.name(), name))
    }

    /// Check one attribute, adding errors to the model.
    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()>;

    /// Check every covered attribute, or the ones also listed in `only`.
    fn validate(&self, model: &mut dyn Model, only: Option<&[String]>) -> Result<()> {
        let base = self.base();
        for attribute in &base.attributes {
            if let Some(only) = only {
                if !only.contains(attribute) {
                    continue;
                }
            }
            if base.skip_on_error && model.has_errors(Some(attribute.as_str())) {
                continue;
            }
            self.validate_attribute(model, attribute)?;
        }
        Ok(())
    }

    fn applies_to(&self, scenario: &str) -> bool {
        self.base().applies_to(scenario)
    }

    fn is_required(&self) -> bool {
        false
    }
}

pub(crate) fn unknown_option(validator: &str, option: &str) -> TrellisError {
    TrellisError::Config(format!(
        "Validator \"{}\" has no option \"{}\".",
        validator, option
    ))
}

/// Null, an empty array, an empty string, or with `trim` a blank string.
pub fn is_empty(value: &Value, trim: bool) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty() || (trim && s.trim().is_empty()),
        _ => false,
    }
}

/// Add `message` (or the validator's custom message) to the model with
/// `{attribute}` and any `params` placeholders filled in.
pub fn add_error(
    model: &mut dyn Model,
    base: &ValidatorBase,
    attribute: &str,
    default_message: &str,
    params: &[(&str, String)],
) {
    let template = base.message.as_deref().unwrap_or(default_message);
    add_error_with(model, attribute, template, params);
}

/// Like `add_error`, but always with `template`.
pub fn add_error_with(
    model: &mut dyn Model,
    attribute: &str,
    template: &str,
    params: &[(&str, String)],
) {
    let mut message = template.replace("{attribute}", &model.attribute_label(attribute));
    for (key, value) in params {
        message = message.replace(&format!("{{{}}}", key), value);
    }
    model.add_error(attribute, &message);
}

/// Placeholder text for a JSON value.
pub(crate) fn display_value(value: &Value) -> String {
    loose_string(value)
}

/// Build the validator for `rule`. `inline` says the model defines a
/// validation method named after the rule's validator.
pub fn create_validator(rule: &Rule, inline: bool) -> Result<Box<dyn Validator>> {
    let mut validator: Box<dyn Validator> = if inline {
        Box::new(InlineValidator::new(&rule.validator))
    } else {
        match rule.validator.as_str() {
            "required" => Box::new(RequiredValidator::default()),
            "url" => Box::new(UrlValidator::default()),
            "length" => Box::new(LengthValidator::default()),
            "numerical" => Box::new(NumberValidator::default()),
            "boolean" => Box::new(BooleanValidator::default()),
            "in" => Box::new(RangeValidator::default()),
            "ip" => Box::new(IpValidator::default()),
            "email" => Box::new(EmailValidator::default()),
            other => {
                return Err(TrellisError::Config(format!(
                    "Unknown validator \"{}\". Expected one of: {}, or an inline validator.",
                    other,
                    BUILTIN_VALIDATORS.join(", ")
                )))
            }
        }
    };

    validator.base_mut().attributes = rule.attributes.clone();
    let class = validator.name().to_string();
    for (name, value) in &rule.params {
        if validator.base_mut().set_option(&class, name, value)? {
            continue;
        }
        validator.set_option(name, value)?;
    }
    Ok(validator)
}
