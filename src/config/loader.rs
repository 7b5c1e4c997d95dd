//! Settings loading with hierarchy merging.
//!
//! Settings are loaded from multiple sources and merged in order:
//!
//! 1. Built-in defaults
//! 2. System settings: `/etc/proxy-fleet/config.toml`
//! 3. User settings: `~/.config/proxy-fleet/config.toml`
//! 4. Additional settings file (via `--config` flag)
//! 5. CLI flags (highest priority)

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::ConfigError;
use super::schema::Settings;
use crate::cli::{Cli, Commands};

/// System-wide settings path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/proxy-fleet/config.toml";

/// User settings directory name.
pub const USER_CONFIG_DIR: &str = "proxy-fleet";

/// User settings filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Log levels the proxy client accepts.
const CLIENT_LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];

/// Settings loader with support for hierarchy merging.
pub struct ConfigLoader {
    system_path: PathBuf,
    user_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader with the default paths.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));

        Self {
            system_path: PathBuf::from(SYSTEM_CONFIG_PATH),
            user_path: user_config_dir.join(USER_CONFIG_FILE),
        }
    }

    /// Create a loader with custom paths (for testing).
    #[must_use]
    pub fn with_paths(system_path: PathBuf, user_path: PathBuf) -> Self {
        Self {
            system_path,
            user_path,
        }
    }

    /// Load and merge settings from all sources.
    ///
    /// Missing system and user files are skipped. A missing `--config` file
    /// and invalid TOML anywhere are errors.
    pub fn load(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut settings = Settings::with_defaults();

        for path in [&self.system_path, &self.user_path] {
            if let Some(layer) = load_file(path)? {
                settings.merge(layer);
                debug!("Loaded settings from {:?}", path);
            } else {
                debug!("No settings file at {:?}", path);
            }
        }

        if let Some(ref cli_config_path) = cli.config {
            match load_file(cli_config_path)? {
                Some(layer) => {
                    settings.merge(layer);
                    debug!("Loaded additional settings from {:?}", cli_config_path);
                }
                None => {
                    return Err(ConfigError::ReadError {
                        path: cli_config_path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "Specified config file not found",
                        ),
                    });
                }
            }
        }

        apply_cli_flags(&mut settings, &cli.command);
        validate(&settings)?;
        Ok(settings)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a settings file, returning `None` if it doesn't exist.
fn load_file(path: &Path) -> Result<Option<Settings>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let settings = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(Some(settings))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn apply_cli_flags(settings: &mut Settings, command: &Commands) {
    match command {
        Commands::Convert {
            proxy_type,
            output_dir,
            ..
        } => {
            if let Some(proxy_type) = proxy_type {
                settings.convert.proxy_type = proxy_type.clone();
            }
            if let Some(output_dir) = output_dir {
                settings.convert.output_dir = output_dir.clone();
            }
        }
        Commands::Connect {
            config_dir,
            executable,
            max_parallel,
            host,
            port,
            ..
        } => {
            if let Some(config_dir) = config_dir {
                settings.general.config_dir = config_dir.clone();
            }
            if let Some(executable) = executable {
                settings.client.executable = Some(executable.clone());
            }
            if let Some(max_parallel) = max_parallel {
                settings.general.max_parallel = *max_parallel;
            }
            apply_api_flags(settings, host, port);
        }
        Commands::Api {
            config_dir,
            host,
            port,
        } => {
            if let Some(config_dir) = config_dir {
                settings.general.config_dir = config_dir.clone();
            }
            apply_api_flags(settings, host, port);
        }
    }
}

fn apply_api_flags(settings: &mut Settings, host: &Option<String>, port: &Option<u16>) {
    if let Some(host) = host {
        settings.api.host = host.clone();
    }
    if let Some(port) = port {
        settings.api.port = *port;
    }
}

fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if !CLIENT_LOG_LEVELS.contains(&settings.client.log_level.as_str()) {
        return Err(ConfigError::InvalidValue {
            field: "client.log_level".to_string(),
            message: format!(
                "'{}' is not one of {}",
                settings.client.log_level,
                CLIENT_LOG_LEVELS.join(", ")
            ),
        });
    }

    if settings.api.host.parse::<std::net::IpAddr>().is_err() && settings.api.host != "localhost" {
        return Err(ConfigError::InvalidValue {
            field: "api.host".to_string(),
            message: format!("'{}' is not an IP address", settings.api.host),
        });
    }

    if settings.supervisor.cleanup_timeout_ms < settings.supervisor.terminate_timeout_ms {
        warn!(
            "cleanup_timeout_ms ({}) is shorter than terminate_timeout_ms ({}); stubborn clients will be abandoned",
            settings.supervisor.cleanup_timeout_ms, settings.supervisor.terminate_timeout_ms
        );
    }

    Ok(())
}
