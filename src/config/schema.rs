//! Settings schema.
//!
//! Every scalar uses a zero/empty sentinel for "not set" so a partial file
//! can be merged over another without clobbering it. The real defaults come
//! from [`Settings::with_defaults`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default config directory.
pub const DEFAULT_CONFIG_DIR: &str = "./configs";
/// Default client binary base name.
pub const DEFAULT_BINARY_NAME: &str = crate::supervisor::DEFAULT_BINARY_NAME;
/// Default `--log-level` passed to clients.
pub const DEFAULT_CLIENT_LOG_LEVEL: &str = "debug";
/// Default crash-probe delay after launch.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 200;
/// Default SIGTERM grace before a client is killed.
pub const DEFAULT_TERMINATE_TIMEOUT_MS: u64 = 1000;
/// Default bound on the whole cleanup.
pub const DEFAULT_CLEANUP_TIMEOUT_MS: u64 = 3000;
/// Default exit-monitor interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// Default discovery API host.
pub const DEFAULT_API_HOST: &str = "127.0.0.1";
/// Default discovery API port.
pub const DEFAULT_API_PORT: u16 = 8000;
/// Default availability probe timeout.
pub const DEFAULT_CHECK_TIMEOUT_MS: u64 = 1000;
/// Default proxy type picked from the YAML list.
pub const DEFAULT_PROXY_TYPE: &str = "hysteria2";
/// First local port handed out by the converter.
pub const DEFAULT_START_PORT: u16 = 8080;

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// General settings.
    #[serde(default)]
    pub general: GeneralSettings,

    /// Client process settings.
    #[serde(default)]
    pub client: ClientSettings,

    /// Supervision timing.
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// Discovery API settings.
    #[serde(default)]
    pub api: ApiSettings,

    /// Converter settings.
    #[serde(default)]
    pub convert: ConvertSettings,
}

impl Settings {
    /// Settings with every value at its built-in default.
    pub fn with_defaults() -> Self {
        Self {
            general: GeneralSettings {
                config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
                max_parallel: 0,
            },
            client: ClientSettings {
                executable: None,
                binary_name: DEFAULT_BINARY_NAME.to_string(),
                log_level: DEFAULT_CLIENT_LOG_LEVEL.to_string(),
                grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            },
            supervisor: SupervisorSettings {
                terminate_timeout_ms: DEFAULT_TERMINATE_TIMEOUT_MS,
                cleanup_timeout_ms: DEFAULT_CLEANUP_TIMEOUT_MS,
                poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            },
            api: ApiSettings {
                host: DEFAULT_API_HOST.to_string(),
                port: DEFAULT_API_PORT,
                check_timeout_ms: DEFAULT_CHECK_TIMEOUT_MS,
            },
            convert: ConvertSettings {
                proxy_type: DEFAULT_PROXY_TYPE.to_string(),
                start_port: DEFAULT_START_PORT,
                output_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            },
        }
    }

    /// Merge another settings layer into this one.
    ///
    /// Scalars in `other` override when they are set.
    pub fn merge(&mut self, other: Settings) {
        self.general.merge(other.general);
        self.client.merge(other.client);
        self.supervisor.merge(other.supervisor);
        self.api.merge(other.api);
        self.convert.merge(other.convert);
    }
}

/// General settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GeneralSettings {
    /// Directory holding client config files.
    #[serde(default)]
    pub config_dir: PathBuf,

    /// Concurrent launch limit for batch connect. 0 = no limit.
    #[serde(default)]
    pub max_parallel: usize,
}

impl GeneralSettings {
    fn merge(&mut self, other: GeneralSettings) {
        if !other.config_dir.as_os_str().is_empty() {
            self.config_dir = other.config_dir;
        }
        if other.max_parallel != 0 {
            self.max_parallel = other.max_parallel;
        }
    }
}

/// Client process settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientSettings {
    /// Explicit client executable. Searched for when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Base name searched for in the working directory and `PATH`.
    #[serde(default)]
    pub binary_name: String,

    /// `--log-level` passed to each client.
    #[serde(default)]
    pub log_level: String,

    /// Delay after launch before checking the client is still alive.
    #[serde(default)]
    pub grace_period_ms: u64,
}

impl ClientSettings {
    fn merge(&mut self, other: ClientSettings) {
        if other.executable.is_some() {
            self.executable = other.executable;
        }
        if !other.binary_name.is_empty() {
            self.binary_name = other.binary_name;
        }
        if !other.log_level.is_empty() {
            self.log_level = other.log_level;
        }
        if other.grace_period_ms != 0 {
            self.grace_period_ms = other.grace_period_ms;
        }
    }

    /// Crash-probe delay.
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Supervision timing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SupervisorSettings {
    /// SIGTERM grace per process before kill.
    #[serde(default)]
    pub terminate_timeout_ms: u64,

    /// Bound on the whole cleanup.
    #[serde(default)]
    pub cleanup_timeout_ms: u64,

    /// Exit-monitor interval.
    #[serde(default)]
    pub poll_interval_ms: u64,
}

impl SupervisorSettings {
    fn merge(&mut self, other: SupervisorSettings) {
        if other.terminate_timeout_ms != 0 {
            self.terminate_timeout_ms = other.terminate_timeout_ms;
        }
        if other.cleanup_timeout_ms != 0 {
            self.cleanup_timeout_ms = other.cleanup_timeout_ms;
        }
        if other.poll_interval_ms != 0 {
            self.poll_interval_ms = other.poll_interval_ms;
        }
    }

    /// SIGTERM grace per process.
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }

    /// Bound on the whole cleanup.
    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_millis(self.cleanup_timeout_ms)
    }

    /// Exit-monitor interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Discovery API settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiSettings {
    /// Listen host.
    #[serde(default)]
    pub host: String,

    /// Listen port.
    #[serde(default)]
    pub port: u16,

    /// Timeout for a single availability probe.
    #[serde(default)]
    pub check_timeout_ms: u64,
}

impl ApiSettings {
    fn merge(&mut self, other: ApiSettings) {
        if !other.host.is_empty() {
            self.host = other.host;
        }
        if other.port != 0 {
            self.port = other.port;
        }
        if other.check_timeout_ms != 0 {
            self.check_timeout_ms = other.check_timeout_ms;
        }
    }

    /// Availability probe timeout.
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

/// Converter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConvertSettings {
    /// Proxy `type` to pick from the source list.
    #[serde(default)]
    pub proxy_type: String,

    /// Local port for the first generated config.
    #[serde(default)]
    pub start_port: u16,

    /// Where generated configs are written.
    #[serde(default)]
    pub output_dir: PathBuf,
}

impl ConvertSettings {
    fn merge(&mut self, other: ConvertSettings) {
        if !other.proxy_type.is_empty() {
            self.proxy_type = other.proxy_type;
        }
        if other.start_port != 0 {
            self.start_port = other.start_port;
        }
        if !other.output_dir.as_os_str().is_empty() {
            self.output_dir = other.output_dir;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::with_defaults();
        assert_eq!(settings.client.binary_name, "hysteria");
        assert_eq!(settings.client.grace_period(), Duration::from_millis(200));
        assert_eq!(settings.supervisor.terminate_timeout(), Duration::from_secs(1));
        assert_eq!(settings.supervisor.cleanup_timeout(), Duration::from_secs(3));
        assert_eq!(settings.api.port, 8000);
        assert_eq!(settings.convert.start_port, 8080);
    }

    #[test]
    fn test_partial_file_parses_to_sentinels() {
        let settings: Settings = toml::from_str("[api]\nport = 9000\n").unwrap();
        assert_eq!(settings.api.port, 9000);
        assert!(settings.api.host.is_empty());
        assert_eq!(settings.supervisor.cleanup_timeout_ms, 0);
    }

    #[test]
    fn test_merge_overrides_only_set_values() {
        let mut base = Settings::with_defaults();
        let layer: Settings = toml::from_str(
            r#"
            [client]
            executable = "/opt/hysteria/bin/hysteria"

            [supervisor]
            cleanup_timeout_ms = 5000
            "#,
        )
        .unwrap();

        base.merge(layer);
        assert_eq!(
            base.client.executable,
            Some(PathBuf::from("/opt/hysteria/bin/hysteria"))
        );
        assert_eq!(base.client.log_level, "debug");
        assert_eq!(base.supervisor.cleanup_timeout_ms, 5000);
        assert_eq!(base.supervisor.terminate_timeout_ms, 1000);
        assert_eq!(base.api.host, "127.0.0.1");
    }

    #[test]
    fn test_later_layer_wins() {
        let mut base = Settings::with_defaults();
        base.merge(toml::from_str("[api]\nport = 9000\n").unwrap());
        base.merge(toml::from_str("[api]\nport = 9100\n").unwrap());
        base.merge(toml::from_str("[general]\nmax_parallel = 4\n").unwrap());
        assert_eq!(base.api.port, 9100);
        assert_eq!(base.general.max_parallel, 4);
    }

    #[test]
    fn test_serialize_roundtrip_of_defaults() {
        let settings = Settings::with_defaults();
        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}
