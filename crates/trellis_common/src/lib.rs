//! Trellis Common - component container, logging pipeline and helpers
//!
//! Configuration-driven components resolved through a class registry,
//! a buffered logger fanned out to filterable routes, a console command
//! runner, a small cache layer and attribute validators for models.

pub mod base;
pub mod caching;
pub mod console;
pub mod error;
pub mod logging;
pub mod validators;

pub use crate::base::*;
pub use error::{Result, TrellisError};
pub use logging::{LogEntry, LogFilter, LogLevel, Logger};
