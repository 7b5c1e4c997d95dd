//! Client configuration file schema.
//!
//! This is the JSON document handed to the proxy client via `client -c <path>`:
//!
//! ```json
//! {
//!     "server": "hk1.example.com:443",
//!     "auth": "secret",
//!     "tls": { "insecure": false },
//!     "transport": {},
//!     "http": { "listen": "127.0.0.1:8080" },
//!     "name": "HK 01"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One proxy client configuration as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Server address, `host:port`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Authentication secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,

    /// TLS settings.
    #[serde(default)]
    pub tls: TlsSection,

    /// Transport settings, passed through untouched.
    #[serde(default)]
    pub transport: serde_json::Map<String, serde_json::Value>,

    /// Local HTTP proxy listener.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpSection>,

    /// Human-readable node name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ClientConfig {
    /// The configured local HTTP listen address, if any.
    pub fn http_listen(&self) -> Option<&str> {
        self.http.as_ref().and_then(|h| h.listen.as_deref())
    }
}

/// TLS section of a client config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TlsSection {
    /// Skip server certificate verification.
    #[serde(default)]
    pub insecure: bool,
}

/// HTTP proxy section of a client config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpSection {
    /// Listen address, `host:port`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}

/// A loaded config file: where it lives plus what it says.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    /// Path of the config file. Unique per entry.
    pub path: PathBuf,
    /// Parsed content.
    pub config: ClientConfig,
}

impl ConfigEntry {
    /// Create an entry from a path and its parsed config.
    pub fn new(path: impl Into<PathBuf>, config: ClientConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// File name of the config, used as a short label in logs.
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    /// The configured local HTTP listen address, if any.
    pub fn http_listen(&self) -> Option<&str> {
        self.config.http_listen()
    }

    /// Display name: the config's `name`, or the file name.
    pub fn display_name(&self) -> String {
        self.config
            .name
            .clone()
            .unwrap_or_else(|| self.file_name())
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
