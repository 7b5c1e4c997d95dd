//! A single connection attempt.

use crate::config::Settings;
use crate::store::ConfigEntry;
use crate::supervisor::{ProcessSupervisor, SupervisorError};
use crate::telemetry::{self, AuditEvent};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Time allowed to drain a crashed client's output before logging it.
const CRASH_OUTPUT_WAIT: Duration = Duration::from_millis(200);

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptError {
    /// The listen address is missing or has no usable port.
    #[error("Cannot parse HTTP listen address '{listen}'")]
    AddressParse {
        /// The offending address; empty when none was configured.
        listen: String,
    },

    /// The client could not be started or supervised.
    #[error("Launch failed: {message}")]
    Launch {
        /// Description of the failure.
        message: String,
    },

    /// The client exited during the grace period.
    #[error("Client exited immediately with code {code}")]
    ExitedEarly {
        /// Exit code; negative values are the terminating signal.
        code: i32,
    },

    /// The attempt task itself failed.
    #[error("Attempt failed unexpectedly: {message}")]
    Unexpected {
        /// Description of the failure.
        message: String,
    },
}

/// Outcome of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptResult {
    /// Config file the attempt was for.
    pub config_file: PathBuf,
    /// Whether a client is now running for it.
    pub success: bool,
    /// Local port, when it could be determined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Local HTTP proxy address, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_listen: Option<String>,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AttemptError>,
}

impl AttemptResult {
    /// A successful attempt.
    pub fn succeeded(config_file: impl Into<PathBuf>, port: u16, http_listen: impl Into<String>) -> Self {
        Self {
            config_file: config_file.into(),
            success: true,
            port: Some(port),
            http_listen: Some(http_listen.into()),
            error: None,
        }
    }

    /// A failed attempt.
    pub fn failed(config_file: impl Into<PathBuf>, port: Option<u16>, error: AttemptError) -> Self {
        Self {
            config_file: config_file.into(),
            success: false,
            port,
            http_listen: None,
            error: Some(error),
        }
    }
}

/// Timing used by each attempt.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    /// How long a fresh client must survive to count as launched.
    pub grace_period: Duration,
    /// SIGTERM grace when a duplicate client has to be stopped.
    pub terminate_timeout: Duration,
}

impl ConnectorSettings {
    /// Take timing from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            grace_period: settings.client.grace_period(),
            terminate_timeout: settings.supervisor.terminate_timeout(),
        }
    }
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self::from_settings(&Settings::with_defaults())
    }
}

/// Port of a `host:port` listen address: the text after the last `:`.
pub fn parse_port(listen: &str) -> Result<u16, AttemptError> {
    listen
        .rsplit(':')
        .next()
        .map(str::trim)
        .and_then(|port| port.parse().ok())
        .ok_or_else(|| AttemptError::AddressParse {
            listen: listen.to_string(),
        })
}

/// Launch one client and confirm it survives the grace period.
///
/// On success the handle is in the supervisor's set; on failure nothing is
/// left running.
pub async fn connect_one(
    supervisor: &ProcessSupervisor,
    entry: &ConfigEntry,
    settings: &ConnectorSettings,
) -> AttemptResult {
    let started = Instant::now();
    let name = entry.file_name();

    let listen = entry.http_listen().unwrap_or_default();
    let port = match parse_port(listen) {
        Ok(port) => port,
        Err(e) => {
            warn!("[{}] {}", name, e);
            return AttemptResult::failed(&entry.path, None, e);
        }
    };

    let mut handle = match supervisor.launch(entry, port) {
        Ok(handle) => handle,
        Err(e) => {
            warn!("[{}] {}", name, e);
            return AttemptResult::failed(
                &entry.path,
                Some(port),
                AttemptError::Launch {
                    message: e.to_string(),
                },
            );
        }
    };

    tokio::time::sleep(settings.grace_period).await;

    if let Some(code) = handle.poll_exit() {
        warn!(
            "[{}] Client exited with code {} ({:.2}s)",
            name,
            code,
            started.elapsed().as_secs_f64()
        );
        handle.collect_output(CRASH_OUTPUT_WAIT).await.log(&name);
        return AttemptResult::failed(&entry.path, Some(port), AttemptError::ExitedEarly { code });
    }

    let pid = handle.pid();
    if let Err(mut duplicate) = supervisor.adopt(handle).await {
        duplicate.terminate(settings.terminate_timeout).await;
        let e = SupervisorError::AlreadySupervised {
            path: entry.path.clone(),
        };
        warn!("[{}] {}", name, e);
        return AttemptResult::failed(
            &entry.path,
            Some(port),
            AttemptError::Launch {
                message: e.to_string(),
            },
        );
    }

    info!(
        "[{}] Connected, HTTP proxy on {} ({:.2}s)",
        name,
        listen,
        started.elapsed().as_secs_f64()
    );
    telemetry::emit(AuditEvent::ProcessLaunched {
        config: name,
        pid,
        port,
    });
    AttemptResult::succeeded(&entry.path, port, listen)
}
