//! Error types for Trellis.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrellisError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Alias \"{0}\" is invalid. Make sure it points to an existing directory or file.")]
    InvalidAlias(String),

    #[error("Object configuration must contain a \"class\" element.")]
    MissingClass,

    #[error("Unknown class \"{0}\". Register a factory or import its preset.")]
    UnknownClass(String),

    #[error("Class name \"{class}\" does not match class file \"{file}\".")]
    ClassNameMismatch { class: String, file: String },

    #[error("{what} \"{path}\" is not a valid directory.")]
    InvalidDirectory { what: &'static str, path: String },

    #[error("Property \"{class}.{property}\" is not defined.")]
    UnknownProperty { class: String, property: String },

    #[error("Invalid value for \"{class}.{property}\": {reason}")]
    InvalidProperty {
        class: String,
        property: String,
        reason: String,
    },

    #[error("Component \"{0}\" is not of the requested type.")]
    ComponentType(String),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("Cache backend does not support {0}() functionality.")]
    Unsupported(&'static str),

    #[error("Error: {message}\n\n{help}")]
    Usage { message: String, help: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TrellisError {
    /// Exit status a console entry point should use for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TrellisError::Usage { .. } => 1,
            TrellisError::Lifecycle(_) => 70,
            _ => 78,
        }
    }

    pub(crate) fn invalid_property(
        class: &str,
        property: &str,
        reason: impl Into<String>,
    ) -> Self {
        TrellisError::InvalidProperty {
            class: class.to_string(),
            property: property.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_property(class: &str, property: &str) -> Self {
        TrellisError::UnknownProperty {
            class: class.to_string(),
            property: property.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrellisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_renders_help() {
        let err = TrellisError::Usage {
            message: "Unknown action: nope".to_string(),
            help: "Usage: app cache".to_string(),
        };
        assert_eq!(err.to_string(), "Error: Unknown action: nope\n\nUsage: app cache");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TrellisError = io.into();
        assert!(matches!(err, TrellisError::Io(_)));
        assert_eq!(err.exit_code(), 78);
    }
}
