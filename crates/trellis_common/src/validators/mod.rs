//! Attribute validation for data models.

pub mod builtins;
pub mod model;
pub mod validator;

pub use builtins::{
    BooleanValidator, EmailValidator, InlineValidator, IpValidator, LengthValidator,
    NumberValidator, RangeValidator, RequiredValidator, UrlValidator,
};
pub use model::{camelize, Model, ModelErrors, ModelState, Rule};
pub use validator::{create_validator, is_empty, Validator, ValidatorBase, BUILTIN_VALIDATORS};
