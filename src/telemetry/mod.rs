//! Audit trail for fleet sessions.
//!
//! Process lifecycle events (launch, exit, termination, batch summaries) are
//! written to syslog as one JSON object per line, tagged `PROXY_FLEET`.
//! Diagnostic logging goes through `tracing` to stderr; the two never mix.
//!
//! ```json
//! {"ts":"2026-10-16T09:12:44Z","event":"process_launched","config":"hk1.json","pid":4711,"port":8080}
//! ```
//!
//! When no syslog daemon is reachable the binary installs a null logger and
//! carries on. Library code calls [`emit`], which is a no-op until a logger
//! has been installed.

mod error;
mod events;
mod syslog;

pub use error::TelemetryError;
pub use events::{AuditEvent, TerminationKind, TimestampedEvent};
pub use syslog::{AuditLogger, SYSLOG_TAG, emit, init_logger, init_null_logger, try_audit};
