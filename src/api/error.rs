//! Error types for the discovery API.

use thiserror::Error;

/// Errors that stop the API server.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Could not bind the listen address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the listening socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP protocol error on a connection.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = ApiError::Bind {
            addr: "127.0.0.1:8000".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(err.to_string(), "Failed to bind 127.0.0.1:8000: in use");
    }
}
