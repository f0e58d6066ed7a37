//! Built-in validators, selected by rule name.

use crate::base::property::{as_bool, as_f64, as_list, as_opt_string, as_string, as_u64, loose_string};
use crate::error::{Result, TrellisError};
use crate::validators::model::Model;
use crate::validators::validator::{
    add_error, add_error_with, display_value, is_empty, unknown_option, Validator, ValidatorBase,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

/// Longest address the email validator will look at
pub const MAX_EMAIL_LENGTH: usize = 254;
/// URLs must be shorter than this
pub const MAX_URL_LENGTH: usize = 2000;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?\.)+[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?$";
const EMAIL_FULL_PATTERN: &str = r"^[^@]*<[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?\.)+[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?>$";
const URL_PATTERN: &str = r"(?i)^{schemes}://(([A-Z0-9][A-Z0-9_-]*)(\.[A-Z0-9][A-Z0-9_-]*)+)";

fn integer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*[+-]?\d+\s*$").expect("static regex"))
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*[-+]?[0-9]*\.?[0-9]+([eE][-+]?[0-9]+)?\s*$").expect("static regex")
    })
}

fn compile(validator: &str, option: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        TrellisError::Config(format!(
            "Validator \"{}\" option \"{}\" is not a valid pattern: {}",
            validator, option, e
        ))
    })
}

fn loose_eq(a: &Value, b: &Value, strict: bool) -> bool {
    if strict {
        a == b
    } else {
        loose_string(a) == loose_string(b)
    }
}

fn attribute_value(model: &dyn Model, attribute: &str) -> Value {
    model.attribute(attribute).unwrap_or(Value::Null)
}

/// `required`: the attribute is not blank, or equals `requiredValue`.
#[derive(Debug, Default)]
pub struct RequiredValidator {
    base: ValidatorBase,
    pub required_value: Option<Value>,
    pub strict: bool,
}

impl Validator for RequiredValidator {
    fn name(&self) -> &'static str {
        "required"
    }

    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ValidatorBase {
        &mut self.base
    }

    fn set_option(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "requiredValue" => {
                self.required_value = (!value.is_null()).then(|| value.clone());
            }
            "strict" => self.strict = as_bool(self.name(), name, value)?,
            _ => return Err(unknown_option(self.name(), name)),
        }
        Ok(())
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let value = attribute_value(model, attribute);
        match &self.required_value {
            Some(required) => {
                if !loose_eq(&value, required, self.strict) {
                    add_error(
                        model,
                        &self.base,
                        attribute,
                        "{attribute} must be {value}.",
                        &[("value", display_value(required))],
                    );
                }
            }
            None if is_empty(&value, true) => {
                add_error(model, &self.base, attribute, "{attribute} cannot be blank.", &[]);
            }
            None => {}
        }
        Ok(())
    }

    fn is_required(&self) -> bool {
        true
    }
}

/// `length`: string length bounds.
#[derive(Debug)]
pub struct LengthValidator {
    base: ValidatorBase,
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub is: Option<usize>,
    pub too_short: Option<String>,
    pub too_long: Option<String>,
    pub allow_empty: bool,
}

impl Default for LengthValidator {
    fn default() -> Self {
        Self {
            base: ValidatorBase::default(),
            min: None,
            max: None,
            is: None,
            too_short: None,
            too_long: None,
            allow_empty: true,
        }
    }
}

impl Validator for LengthValidator {
    fn name(&self) -> &'static str {
        "length"
    }

    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ValidatorBase {
        &mut self.base
    }

    fn set_option(&mut self, name: &str, value: &Value) -> Result<()> {
        let class = self.name();
        match name {
            "min" => self.min = Some(as_u64(class, name, value)? as usize),
            "max" => self.max = Some(as_u64(class, name, value)? as usize),
            "is" => self.is = Some(as_u64(class, name, value)? as usize),
            "tooShort" => self.too_short = as_opt_string(class, name, value)?,
            "tooLong" => self.too_long = as_opt_string(class, name, value)?,
            "allowEmpty" => self.allow_empty = as_bool(class, name, value)?,
            _ => return Err(unknown_option(class, name)),
        }
        Ok(())
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let value = attribute_value(model, attribute);
        if self.allow_empty && is_empty(&value, false) {
            return Ok(());
        }

        let length = match &value {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            other => loose_string(other).chars().count(),
        };

        if let Some(min) = self.min.filter(|min| length < *min) {
            let template = self
                .too_short
                .as_deref()
                .unwrap_or("{attribute} is too short (minimum is {min} characters).");
            add_error_with(model, attribute, template, &[("min", min.to_string())]);
        }
        if let Some(max) = self.max.filter(|max| length > *max) {
            let template = self
                .too_long
                .as_deref()
                .unwrap_or("{attribute} is too long (maximum is {max} characters).");
            add_error_with(model, attribute, template, &[("max", max.to_string())]);
        }
        if let Some(is) = self.is.filter(|is| length != *is) {
            add_error(
                model,
                &self.base,
                attribute,
                "{attribute} is of the wrong length (should be {length} characters).",
                &[("length", is.to_string())],
            );
        }
        Ok(())
    }
}

/// `numerical`: a number or integer, optionally bounded.
#[derive(Debug)]
pub struct NumberValidator {
    base: ValidatorBase,
    pub integer_only: bool,
    pub allow_empty: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub too_small: Option<String>,
    pub too_big: Option<String>,
}

impl Default for NumberValidator {
    fn default() -> Self {
        Self {
            base: ValidatorBase::default(),
            integer_only: false,
            allow_empty: true,
            min: None,
            max: None,
            too_small: None,
            too_big: None,
        }
    }
}

impl Validator for NumberValidator {
    fn name(&self) -> &'static str {
        "numerical"
    }

    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ValidatorBase {
        &mut self.base
    }

    fn set_option(&mut self, name: &str, value: &Value) -> Result<()> {
        let class = self.name();
        match name {
            "integerOnly" => self.integer_only = as_bool(class, name, value)?,
            "allowEmpty" => self.allow_empty = as_bool(class, name, value)?,
            "min" => self.min = Some(as_f64(class, name, value)?),
            "max" => self.max = Some(as_f64(class, name, value)?),
            "tooSmall" => self.too_small = as_opt_string(class, name, value)?,
            "tooBig" => self.too_big = as_opt_string(class, name, value)?,
            _ => return Err(unknown_option(class, name)),
        }
        Ok(())
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let value = attribute_value(model, attribute);
        if self.allow_empty && is_empty(&value, false) {
            return Ok(());
        }

        let text = match &value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => String::new(),
        };
        let (pattern, message) = if self.integer_only {
            (integer_pattern(), "{attribute} must be an integer.")
        } else {
            (number_pattern(), "{attribute} must be a number.")
        };
        if !pattern.is_match(&text) {
            add_error(model, &self.base, attribute, message, &[]);
            return Ok(());
        }

        let Ok(number) = text.trim().parse::<f64>() else {
            return Ok(());
        };
        if let Some(min) = self.min.filter(|min| number < *min) {
            let template = self
                .too_small
                .as_deref()
                .unwrap_or("{attribute} is too small (minimum is {min}).");
            add_error_with(model, attribute, template, &[("min", min.to_string())]);
        }
        if let Some(max) = self.max.filter(|max| number > *max) {
            let template = self
                .too_big
                .as_deref()
                .unwrap_or("{attribute} is too big (maximum is {max}).");
            add_error_with(model, attribute, template, &[("max", max.to_string())]);
        }
        Ok(())
    }
}

/// `boolean`: the attribute equals `trueValue` or `falseValue`.
#[derive(Debug)]
pub struct BooleanValidator {
    base: ValidatorBase,
    pub true_value: Value,
    pub false_value: Value,
    pub strict: bool,
    pub allow_empty: bool,
}

impl Default for BooleanValidator {
    fn default() -> Self {
        Self {
            base: ValidatorBase::default(),
            true_value: Value::from("1"),
            false_value: Value::from("0"),
            strict: false,
            allow_empty: true,
        }
    }
}

impl Validator for BooleanValidator {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ValidatorBase {
        &mut self.base
    }

    fn set_option(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "trueValue" => self.true_value = value.clone(),
            "falseValue" => self.false_value = value.clone(),
            "strict" => self.strict = as_bool(self.name(), name, value)?,
            "allowEmpty" => self.allow_empty = as_bool(self.name(), name, value)?,
            _ => return Err(unknown_option(self.name(), name)),
        }
        Ok(())
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let value = attribute_value(model, attribute);
        if self.allow_empty && is_empty(&value, false) {
            return Ok(());
        }

        if !loose_eq(&value, &self.true_value, self.strict)
            && !loose_eq(&value, &self.false_value, self.strict)
        {
            add_error(
                model,
                &self.base,
                attribute,
                "{attribute} must be either {true} or {false}.",
                &[
                    ("true", display_value(&self.true_value)),
                    ("false", display_value(&self.false_value)),
                ],
            );
        }
        Ok(())
    }
}

/// `in`: the attribute is (or with `not`, is not) one of `range`.
#[derive(Debug)]
pub struct RangeValidator {
    base: ValidatorBase,
    pub range: Option<Vec<Value>>,
    pub strict: bool,
    pub not: bool,
    pub allow_empty: bool,
}

impl Default for RangeValidator {
    fn default() -> Self {
        Self {
            base: ValidatorBase::default(),
            range: None,
            strict: false,
            not: false,
            allow_empty: true,
        }
    }
}

impl Validator for RangeValidator {
    fn name(&self) -> &'static str {
        "in"
    }

    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ValidatorBase {
        &mut self.base
    }

    fn set_option(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "range" => match value {
                Value::Array(items) => self.range = Some(items.clone()),
                _ => {
                    return Err(TrellisError::Config(
                        "The \"range\" property must be specified with a list of values."
                            .to_string(),
                    ))
                }
            },
            "strict" => self.strict = as_bool(self.name(), name, value)?,
            "not" => self.not = as_bool(self.name(), name, value)?,
            "allowEmpty" => self.allow_empty = as_bool(self.name(), name, value)?,
            _ => return Err(unknown_option(self.name(), name)),
        }
        Ok(())
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let value = attribute_value(model, attribute);
        if self.allow_empty && is_empty(&value, false) {
            return Ok(());
        }

        let range = self.range.as_ref().ok_or_else(|| {
            TrellisError::Config(
                "The \"range\" property must be specified with a list of values.".to_string(),
            )
        })?;
        let found = range.iter().any(|item| loose_eq(&value, item, self.strict));

        if !self.not && !found {
            add_error(model, &self.base, attribute, "{attribute} is not in the list.", &[]);
        } else if self.not && found {
            add_error(model, &self.base, attribute, "{attribute} is in the list.", &[]);
        }
        Ok(())
    }
}

/// `ip`: an IPv4 or IPv6 address.
#[derive(Debug)]
pub struct IpValidator {
    base: ValidatorBase,
    pub allow_empty: bool,
}

impl Default for IpValidator {
    fn default() -> Self {
        Self {
            base: ValidatorBase::default(),
            allow_empty: true,
        }
    }
}

impl IpValidator {
    pub fn is_ipv4(value: &str) -> bool {
        value.parse::<Ipv4Addr>().is_ok()
    }

    pub fn is_ipv6(value: &str) -> bool {
        value.parse::<Ipv6Addr>().is_ok()
    }
}

impl Validator for IpValidator {
    fn name(&self) -> &'static str {
        "ip"
    }

    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ValidatorBase {
        &mut self.base
    }

    fn set_option(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "allowEmpty" => self.allow_empty = as_bool(self.name(), name, value)?,
            _ => return Err(unknown_option(self.name(), name)),
        }
        Ok(())
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let value = attribute_value(model, attribute);
        if self.allow_empty && is_empty(&value, false) {
            return Ok(());
        }

        let valid = value
            .as_str()
            .map(|s| Self::is_ipv4(s) || Self::is_ipv6(s))
            .unwrap_or(false);
        if !valid {
            add_error(model, &self.base, attribute, "{attribute} must be an IP address.", &[]);
        }
        Ok(())
    }
}

/// `email`: a syntactically valid address, optionally with a display name.
#[derive(Debug)]
pub struct EmailValidator {
    base: ValidatorBase,
    pub pattern: Regex,
    pub full_pattern: Regex,
    pub allow_name: bool,
    pub allow_empty: bool,
}

impl Default for EmailValidator {
    fn default() -> Self {
        static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
        let (pattern, full_pattern) = PATTERNS.get_or_init(|| {
            (
                Regex::new(EMAIL_PATTERN).expect("static regex"),
                Regex::new(EMAIL_FULL_PATTERN).expect("static regex"),
            )
        });
        Self {
            base: ValidatorBase::default(),
            pattern: pattern.clone(),
            full_pattern: full_pattern.clone(),
            allow_name: false,
            allow_empty: true,
        }
    }
}

impl EmailValidator {
    /// Checks `value` alone, ignoring `allow_empty`.
    pub fn validate_value(&self, value: &str) -> bool {
        value.len() <= MAX_EMAIL_LENGTH
            && (self.pattern.is_match(value)
                || (self.allow_name && self.full_pattern.is_match(value)))
    }
}

impl Validator for EmailValidator {
    fn name(&self) -> &'static str {
        "email"
    }

    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ValidatorBase {
        &mut self.base
    }

    fn set_option(&mut self, name: &str, value: &Value) -> Result<()> {
        let class = self.name();
        match name {
            "pattern" => self.pattern = compile(class, name, &as_string(class, name, value)?)?,
            "fullPattern" => {
                self.full_pattern = compile(class, name, &as_string(class, name, value)?)?
            }
            "allowName" => self.allow_name = as_bool(class, name, value)?,
            "allowEmpty" => self.allow_empty = as_bool(class, name, value)?,
            _ => return Err(unknown_option(class, name)),
        }
        Ok(())
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let value = attribute_value(model, attribute);
        if self.allow_empty && is_empty(&value, false) {
            return Ok(());
        }

        let valid = value.as_str().map(|s| self.validate_value(s)).unwrap_or(false);
        if !valid {
            add_error(
                model,
                &self.base,
                attribute,
                "{attribute} is not a valid email address.",
                &[],
            );
        }
        Ok(())
    }
}

/// `url`: an absolute URL with one of `valid_schemes`. With a
/// `default_scheme`, scheme-less input is rewritten on the model.
#[derive(Debug)]
pub struct UrlValidator {
    base: ValidatorBase,
    /// `{schemes}` is replaced by an alternation of `valid_schemes`
    pub pattern: String,
    pub valid_schemes: Vec<String>,
    pub default_scheme: Option<String>,
    pub allow_empty: bool,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self {
            base: ValidatorBase::default(),
            pattern: URL_PATTERN.to_string(),
            valid_schemes: vec!["http".to_string(), "https".to_string()],
            default_scheme: None,
            allow_empty: true,
        }
    }
}

impl UrlValidator {
    /// The accepted (possibly scheme-prefixed) URL, or `None`.
    pub fn validate_value(&self, value: &str) -> Result<Option<String>> {
        if value.len() >= MAX_URL_LENGTH {
            return Ok(None);
        }

        let value = match &self.default_scheme {
            Some(scheme) if !value.contains("://") => format!("{}://{}", scheme, value),
            _ => value.to_string(),
        };

        let schemes = self
            .valid_schemes
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let source = self.pattern.replace("{schemes}", &format!("({})", schemes));
        let pattern = compile(self.name(), "pattern", &source)?;

        Ok(pattern.is_match(&value).then_some(value))
    }
}

impl Validator for UrlValidator {
    fn name(&self) -> &'static str {
        "url"
    }

    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ValidatorBase {
        &mut self.base
    }

    fn set_option(&mut self, name: &str, value: &Value) -> Result<()> {
        let class = self.name();
        match name {
            "pattern" => self.pattern = as_string(class, name, value)?,
            "validSchemes" => self.valid_schemes = as_list(class, name, value)?,
            "defaultScheme" => self.default_scheme = as_opt_string(class, name, value)?,
            "allowEmpty" => self.allow_empty = as_bool(class, name, value)?,
            _ => return Err(unknown_option(class, name)),
        }
        Ok(())
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        let value = attribute_value(model, attribute);
        if self.allow_empty && is_empty(&value, false) {
            return Ok(());
        }

        let accepted = match value.as_str() {
            Some(s) => self.validate_value(s)?,
            None => None,
        };
        match accepted {
            Some(url) => {
                if value.as_str() != Some(url.as_str()) {
                    model.set_attribute(attribute, Value::String(url));
                }
            }
            None => add_error(model, &self.base, attribute, "{attribute} is not a valid URL.", &[]),
        }
        Ok(())
    }
}

/// A validation method defined on the model itself.
#[derive(Debug)]
pub struct InlineValidator {
    base: ValidatorBase,
    pub method: String,
    /// Rule options other than the shared ones, passed to the method
    pub params: Map<String, Value>,
}

impl InlineValidator {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            base: ValidatorBase::default(),
            method: method.into(),
            params: Map::new(),
        }
    }
}

impl Validator for InlineValidator {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn base(&self) -> &ValidatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ValidatorBase {
        &mut self.base
    }

    fn set_option(&mut self, name: &str, value: &Value) -> Result<()> {
        self.params.insert(name.to_string(), value.clone());
        Ok(())
    }

    fn validate_attribute(&self, model: &mut dyn Model, attribute: &str) -> Result<()> {
        model.run_inline_validator(&self.method, attribute, &self.params)
    }
}
