//! Trellisctl - run console commands of a Trellis application

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use trellis_common::console::ConsoleApplication;
use trellis_common::{AppConfig, Framework};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "trellisctl")]
#[command(about = "Run console commands of a Trellis application", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Application configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug mode (trace messages, class unit checks)
    #[arg(long)]
    debug: bool,

    /// Command name followed by its action and options
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AppConfig::default(),
    };

    // Built-in commands unless the configuration overrides them
    for (name, command) in trellisctl::default_command_map() {
        config.command_map.entry(name).or_insert(command);
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;

    let framework = Framework::new().with_debug(cli.debug);
    trellisctl::register_commands(&framework);

    let mut app = ConsoleApplication::new(framework, config)
        .context("Failed to start the application")?;
    app.app().install_fault_hook();
    #[cfg(unix)]
    if let Err(e) = app.app().install_signal_handlers() {
        warn!("Failed to install signal handlers: {}", e);
    }
    debug!(app = %app.app().name(), "application ready");

    let mut argv = vec!["trellisctl".to_string()];
    argv.extend(cli.command);
    Ok(app.run(&argv))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TRELLIS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            78
        }
    };
    std::process::exit(code);
}
