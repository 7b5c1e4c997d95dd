//! Command-line interface definitions for proxy-fleet.
//!
//! Uses clap's derive API for type-safe argument parsing. Flags that have a
//! settings-file counterpart are optional here so an unset flag never
//! overrides the config files.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run a fleet of local proxy clients.
///
/// proxy-fleet converts a YAML list of proxy servers into one client config
/// per server, launches one proxy client per config, and serves the resulting
/// local HTTP proxy endpoints through a small discovery API.
#[derive(Parser, Debug)]
#[command(name = "proxy-fleet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to additional settings file.
    ///
    /// Merged on top of the system and user settings files.
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// -v    = debug level
    /// -vv   = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Subcommands for proxy-fleet.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a YAML proxy list into client config files.
    Convert {
        /// YAML file with a top-level `proxies` list.
        #[arg(short = 'Y', long = "yaml-file", default_value = "./config.yaml")]
        yaml_file: PathBuf,

        /// Proxy type to convert.
        #[arg(short = 'T', long = "type", value_name = "TYPE")]
        proxy_type: Option<String>,

        /// Output directory for the generated configs.
        #[arg(short = 'O', long = "output-dir", value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Launch proxy clients.
    ///
    /// Without --batch, connects the single file given by --config-file.
    /// With --batch, connects every selected file in --config-dir, serves the
    /// discovery API and waits for Ctrl-C.
    Connect {
        /// Single config file to connect.
        #[arg(short = 'C', long = "config-file", default_value = "./configs/1hk.json")]
        config_file: PathBuf,

        /// Config directory for batch mode.
        #[arg(short = 'D', long = "config-dir", value_name = "DIR")]
        config_dir: Option<PathBuf>,

        /// Proxy client executable.
        #[arg(short = 'E', long = "executable", value_name = "PATH")]
        executable: Option<PathBuf>,

        /// Connect every selected config in the directory.
        #[arg(short = 'B', long = "batch")]
        batch: bool,

        /// Maximum number of configs to connect. 0 = no limit.
        #[arg(short = 'L', long = "limit", default_value_t = 0)]
        limit: usize,

        /// Config file filter: `a.json|b.json`, a regex, or a substring.
        #[arg(short = 'F', long = "filter", value_name = "PATTERN")]
        filter: Option<String>,

        /// Maximum concurrent launches. 0 = no limit.
        #[arg(short = 'M', long = "max-parallel", value_name = "N")]
        max_parallel: Option<usize>,

        /// Discovery API host.
        #[arg(short = 'H', long = "host")]
        host: Option<String>,

        /// Discovery API port.
        #[arg(short = 'P', long = "port")]
        port: Option<u16>,
    },

    /// Serve the discovery API over a config directory.
    Api {
        /// Config directory.
        #[arg(short = 'D', long = "config-dir", value_name = "DIR")]
        config_dir: Option<PathBuf>,

        /// Listen host.
        #[arg(short = 'H', long = "host")]
        host: Option<String>,

        /// Listen port.
        #[arg(short = 'P', long = "port")]
        port: Option<u16>,
    },
}

impl Commands {
    /// Short name used in logs and audit events.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Convert { .. } => "convert",
            Commands::Connect { .. } => "connect",
            Commands::Api { .. } => "api",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_convert_defaults() {
        let cli = Cli::parse_from(["proxy-fleet", "convert"]);
        match cli.command {
            Commands::Convert {
                yaml_file,
                proxy_type,
                output_dir,
            } => {
                assert_eq!(yaml_file, PathBuf::from("./config.yaml"));
                assert!(proxy_type.is_none());
                assert!(output_dir.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_parse_batch_connect() {
        let cli = Cli::parse_from([
            "proxy-fleet",
            "-vv",
            "connect",
            "-B",
            "-D",
            "/srv/configs",
            "-L",
            "5",
            "-F",
            "^hk",
            "-M",
            "2",
            "-P",
            "9000",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Connect {
                batch,
                config_dir,
                limit,
                filter,
                max_parallel,
                port,
                host,
                ..
            } => {
                assert!(batch);
                assert_eq!(config_dir, Some(PathBuf::from("/srv/configs")));
                assert_eq!(limit, 5);
                assert_eq!(filter.as_deref(), Some("^hk"));
                assert_eq!(max_parallel, Some(2));
                assert_eq!(port, Some(9000));
                assert!(host.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_single_connect() {
        let cli = Cli::parse_from(["proxy-fleet", "connect", "-C", "/srv/configs/jp.json"]);
        match cli.command {
            Commands::Connect {
                batch, config_file, ..
            } => {
                assert!(!batch);
                assert_eq!(config_file, PathBuf::from("/srv/configs/jp.json"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_config_after_subcommand() {
        let cli = Cli::parse_from(["proxy-fleet", "api", "-c", "/etc/fleet.toml", "-P", "8100"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/fleet.toml")));
        assert_eq!(cli.command.name(), "api");
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["proxy-fleet"]).is_err());
    }
}
