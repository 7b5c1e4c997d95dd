//! Converter error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while converting a proxy list.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Failed to read the YAML source.
    #[error("Failed to read proxy list {path}: {source}")]
    Read {
        /// Path to the YAML file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML source could not be parsed.
    #[error("Failed to parse proxy list {path}: {source}")]
    Parse {
        /// Path to the YAML file.
        path: PathBuf,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// The YAML source has no `proxies` list.
    #[error("No 'proxies' section in {path}")]
    MissingProxies {
        /// Path to the YAML file.
        path: PathBuf,
    },

    /// No client config format exists for this proxy type.
    #[error("Unsupported proxy type: {0}")]
    UnsupportedType(String),

    /// Not enough local ports above the start port.
    #[error("Cannot allocate {count} ports starting at {start}")]
    PortsExhausted {
        /// First port.
        start: u16,
        /// Number of ports needed.
        count: usize,
    },

    /// Failed to write a generated config.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Output path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize a generated config.
    #[error("Failed to serialize client config: {0}")]
    Serialize(#[from] serde_json::Error),
}
