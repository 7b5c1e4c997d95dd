//! Settings for proxy-fleet.
//!
//! TOML settings are loaded from several places and merged, later layers
//! overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. System settings: `/etc/proxy-fleet/config.toml`
//! 3. User settings: `~/.config/proxy-fleet/config.toml`
//! 4. Additional settings file (via `--config` flag)
//! 5. CLI flags (highest priority)
//!
//! Missing files are skipped. A value left unset (zero or empty) in a layer
//! does not override the layers beneath it.
//!
//! ```toml
//! [general]
//! config_dir = "./configs"
//! max_parallel = 0
//!
//! [client]
//! binary_name = "hysteria"
//! log_level = "debug"
//! grace_period_ms = 200
//!
//! [supervisor]
//! terminate_timeout_ms = 1000
//! cleanup_timeout_ms = 3000
//! poll_interval_ms = 1000
//!
//! [api]
//! host = "127.0.0.1"
//! port = 8000
//! check_timeout_ms = 1000
//!
//! [convert]
//! proxy_type = "hysteria2"
//! start_port = 8080
//! output_dir = "./configs"
//! ```

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::{ConfigLoader, SYSTEM_CONFIG_PATH, USER_CONFIG_DIR, USER_CONFIG_FILE};
pub use schema::{
    ApiSettings, ClientSettings, ConvertSettings, GeneralSettings, Settings, SupervisorSettings,
};
