//! Console commands: `entry <command> [action] --opt=value ...`

pub mod application;
pub mod command;
pub mod help;
pub mod request;
pub mod runner;

pub use application::ConsoleApplication;
pub use command::{ActionParams, ActionSpec, ConsoleCommand, ARGS_PARAM};
pub use help::HelpCommand;
pub use request::{resolve_request, ParsedRequest};
pub use runner::{CommandSource, ConsoleCommandRunner};
