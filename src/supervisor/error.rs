//! Error types for process supervision.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating, launching or signalling client processes.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// No usable client executable could be found.
    #[error("Client executable not found: {0}")]
    ExecutableNotFound(String),

    /// The client process could not be spawned.
    #[error("Failed to launch client for {path}: {source}")]
    LaunchFailed {
        /// Config file the launch was for.
        path: PathBuf,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// A live process is already supervised for this config.
    #[error("A client for {path} is already running")]
    AlreadySupervised {
        /// Config file that is already in use.
        path: PathBuf,
    },

    /// Waiting on the child failed.
    #[error("Failed to wait for client process: {0}")]
    Wait(#[source] std::io::Error),

    /// Sending a signal to the child failed.
    #[cfg(unix)]
    #[error("Failed to signal client process: {0}")]
    Signal(#[source] nix::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_not_found_display() {
        let err = SupervisorError::ExecutableNotFound("hysteria".to_string());
        assert_eq!(err.to_string(), "Client executable not found: hysteria");
    }

    #[test]
    fn test_launch_failed_display() {
        let err = SupervisorError::LaunchFailed {
            path: PathBuf::from("/configs/hk.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/configs/hk.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_already_supervised_display() {
        let err = SupervisorError::AlreadySupervised {
            path: PathBuf::from("hk.json"),
        };
        assert!(err.to_string().contains("already running"));
    }
}
