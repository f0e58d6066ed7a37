//! Built-in trellisctl commands

pub mod alias;
pub mod log;

pub use alias::AliasCommand;
pub use log::LogCommand;
