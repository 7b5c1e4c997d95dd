//! Audit event types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle events recorded in the audit trail.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A fleet session started.
    SessionStart {
        /// Subcommand that started the session (`connect`, `api`, ...).
        command: String,
        /// Config directory in use.
        config_dir: String,
        /// Process ID of the supervisor.
        pid: u32,
    },

    /// A client process was launched and survived its grace period.
    ProcessLaunched {
        /// Config file name.
        config: String,
        /// Child process ID.
        pid: u32,
        /// Local port the client listens on.
        port: u16,
    },

    /// A supervised client exited on its own.
    ProcessExited {
        /// Config file name.
        config: String,
        /// Exit code; negative values are the terminating signal.
        code: Option<i32>,
    },

    /// A client was stopped during cleanup.
    ProcessTerminated {
        /// Config file name.
        config: String,
        /// How the process went away.
        how: TerminationKind,
    },

    /// A batch connect finished.
    BatchCompleted {
        /// Number of attempts made.
        attempted: usize,
        /// Number of clients now running.
        connected: usize,
        /// Wall time of the whole batch, in milliseconds.
        elapsed_ms: u64,
    },

    /// A fleet session ended.
    SessionEnd {
        /// Subcommand that ran.
        command: String,
        /// Session duration in seconds.
        duration_sec: u64,
        /// Processes that could not be confirmed dead.
        abandoned: usize,
    },
}

/// How a client process was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationKind {
    /// It had already exited.
    AlreadyExited,
    /// It exited after SIGTERM.
    Graceful,
    /// It had to be killed.
    Killed,
    /// It was still running when cleanup gave up.
    Abandoned,
}

/// Wrapper for serializing events with timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// ISO8601 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The event itself, flattened.
    #[serde(flatten)]
    pub event: &'a AuditEvent,
}

impl AuditEvent {
    /// Wrap this event with a timestamp for serialization.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json(event: &AuditEvent) -> String {
        serde_json::to_string(&event.with_timestamp()).unwrap()
    }

    #[test]
    fn test_session_start_serialization() {
        let json = to_json(&AuditEvent::SessionStart {
            command: "connect".to_string(),
            config_dir: "./configs".to_string(),
            pid: 12345,
        });

        assert!(json.contains("\"event\":\"session_start\""));
        assert!(json.contains("\"command\":\"connect\""));
        assert!(json.contains("\"pid\":12345"));
        assert!(json.contains("\"ts\""));
    }

    #[test]
    fn test_process_launched_serialization() {
        let json = to_json(&AuditEvent::ProcessLaunched {
            config: "hk1.json".to_string(),
            pid: 4711,
            port: 8080,
        });

        assert!(json.contains("\"event\":\"process_launched\""));
        assert!(json.contains("\"config\":\"hk1.json\""));
        assert!(json.contains("\"port\":8080"));
    }

    #[test]
    fn test_process_exited_with_signal() {
        let json = to_json(&AuditEvent::ProcessExited {
            config: "jp.json".to_string(),
            code: Some(-9),
        });

        assert!(json.contains("\"event\":\"process_exited\""));
        assert!(json.contains("\"code\":-9"));
    }

    #[test]
    fn test_process_terminated_serialization() {
        let json = to_json(&AuditEvent::ProcessTerminated {
            config: "us.json".to_string(),
            how: TerminationKind::Abandoned,
        });

        assert!(json.contains("\"event\":\"process_terminated\""));
        assert!(json.contains("\"how\":\"abandoned\""));
    }

    #[test]
    fn test_batch_completed_serialization() {
        let json = to_json(&AuditEvent::BatchCompleted {
            attempted: 5,
            connected: 3,
            elapsed_ms: 812,
        });

        assert!(json.contains("\"event\":\"batch_completed\""));
        assert!(json.contains("\"attempted\":5"));
        assert!(json.contains("\"connected\":3"));
    }
}
