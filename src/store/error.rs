//! Config store error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading client config files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read a config file.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path to the file that couldn't be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file content is not a valid JSON client config.
    #[error("Config file {path} is not valid JSON: {source}")]
    InvalidFormat {
        /// Path to the file that couldn't be parsed.
        path: PathBuf,
        /// The underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The config has no `http.listen` address.
    #[error("Config file {path} has no HTTP listen address")]
    MissingListen {
        /// Path to the offending file.
        path: PathBuf,
    },
}
