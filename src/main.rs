//! proxy-fleet: run and supervise a fleet of local proxy clients.
//!
//! Parses the command line, loads layered settings, sets up logging and the
//! syslog audit trail, then hands off to the subcommand.
//!
//! # Logging
//!
//! - **Diagnostics**: `tracing` to stderr, level chosen by `-v` or `RUST_LOG`
//! - **Audit**: syslog under the `PROXY_FLEET` tag; falls back to a null
//!   logger when syslog is unavailable

use anyhow::{Context, Result};
use clap::Parser;
use proxy_fleet::{cli::Cli, cli_handler, config::ConfigLoader, telemetry};
use tracing::{debug, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    debug!("Parsed CLI arguments: {:?}", cli);

    let settings = ConfigLoader::new()
        .load(&cli)
        .context("Failed to load configuration")?;
    debug!("Loaded configuration: {:?}", settings);

    if let Err(e) = telemetry::init_logger() {
        warn!("Audit logging disabled: {}", e);
        telemetry::init_null_logger().context("Failed to initialize telemetry")?;
    }

    cli_handler::handle_command(cli.command, settings)
}

/// Initialize the tracing subscriber for diagnostics on stderr.
///
/// # Verbosity Levels
/// - 0 (default): `RUST_LOG`, or info
/// - 1 (-v): Debug level
/// - 2+ (-vv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
