//! Base: framework context, components, configuration, application.

pub mod alias;
pub mod application;
pub mod class_registry;
pub mod component;
pub mod config;
pub mod context;
pub mod framework;
pub mod property;
pub mod registry;

pub use alias::AliasTable;
pub use application::{exit_status, Application, FAULT_CATEGORY};
pub use class_registry::{ClassRegistry, Factory};
pub use component::{Component, ComponentConfig};
pub use config::AppConfig;
pub use context::AppContext;
pub use framework::Framework;
pub use registry::{ComponentRegistry, ComponentSpec};
