//! Launch and shutdown of the client fleet.

use super::command::ClientCommand;
use super::error::SupervisorError;
use super::handle::{ProcessHandle, TerminationOutcome};
use super::set::SupervisionSet;
use crate::store::{ConfigEntry, file_name_of};
use crate::telemetry::{self, AuditEvent, TerminationKind};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// What happened during [`ProcessSupervisor::cleanup_all`].
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Processes confirmed gone, with how they went.
    pub stopped: Vec<(PathBuf, TerminationOutcome)>,
    /// Processes still unconfirmed when the overall timeout elapsed.
    pub abandoned: Vec<PathBuf>,
}

impl CleanupReport {
    /// Number of processes cleanup dealt with.
    pub fn total(&self) -> usize {
        self.stopped.len() + self.abandoned.len()
    }

    /// True when every process was confirmed gone.
    pub fn is_clean(&self) -> bool {
        self.abandoned.is_empty()
    }
}

/// Starts client processes and stops them again.
#[derive(Debug)]
pub struct ProcessSupervisor {
    command: ClientCommand,
    set: SupervisionSet,
}

impl ProcessSupervisor {
    /// Create a supervisor that launches `command` and tracks into `set`.
    pub fn new(command: ClientCommand, set: SupervisionSet) -> Self {
        Self { command, set }
    }

    /// The command used to launch clients.
    pub fn command(&self) -> &ClientCommand {
        &self.command
    }

    /// The shared set of live processes.
    pub fn set(&self) -> &SupervisionSet {
        &self.set
    }

    /// Launch the client for one config entry.
    ///
    /// The handle is returned to the caller; it is not added to the set.
    pub fn launch(&self, entry: &ConfigEntry, port: u16) -> Result<ProcessHandle, SupervisorError> {
        let listen = entry.http_listen().unwrap_or_default();
        debug!(
            "Launching {} {}",
            self.command.executable.display(),
            self.command.args(&entry.path).join(" ")
        );
        ProcessHandle::spawn(&self.command, &entry.path, port, listen)
    }

    /// Put a running handle under supervision.
    pub async fn adopt(&self, handle: ProcessHandle) -> Result<(), ProcessHandle> {
        self.set.insert(handle).await
    }

    /// Stop every supervised process.
    ///
    /// Handles are taken out of the set first, then terminated concurrently,
    /// each with `per_process` grace before it is killed. The whole operation
    /// is bounded by `overall`; anything not confirmed dead by then is
    /// abandoned and its handle dropped, which kills it without waiting. The
    /// set is empty when this returns.
    pub async fn cleanup_all(&self, per_process: Duration, overall: Duration) -> CleanupReport {
        let handles = self.set.drain().await;
        let mut report = CleanupReport::default();
        if handles.is_empty() {
            return report;
        }

        info!("Stopping {} client process(es)", handles.len());
        let mut pending: HashSet<PathBuf> =
            handles.iter().map(|h| h.path().to_path_buf()).collect();

        let mut tasks = JoinSet::new();
        for mut handle in handles {
            tasks.spawn(async move {
                let outcome = handle.terminate(per_process).await;
                (handle.path().to_path_buf(), outcome)
            });
        }

        let deadline = Instant::now() + overall;
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((path, outcome)))) => {
                    debug!("{} stopped: {:?}", path.display(), outcome);
                    pending.remove(&path);
                    telemetry::emit(AuditEvent::ProcessTerminated {
                        config: file_name_of(&path),
                        how: termination_kind(outcome),
                    });
                    report.stopped.push((path, outcome));
                }
                Ok(Some(Err(e))) => warn!("Termination task failed: {}", e),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Cleanup did not finish within {:?}, abandoning {} process(es)",
                        overall,
                        pending.len()
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        let mut abandoned: Vec<PathBuf> = pending.into_iter().collect();
        abandoned.sort();
        for path in &abandoned {
            warn!("Termination timed out for {}", path.display());
            telemetry::emit(AuditEvent::ProcessTerminated {
                config: file_name_of(path),
                how: TerminationKind::Abandoned,
            });
        }
        report.abandoned = abandoned;

        info!(
            "Cleanup finished: {} stopped, {} abandoned",
            report.stopped.len(),
            report.abandoned.len()
        );
        report
    }
}

fn termination_kind(outcome: TerminationOutcome) -> TerminationKind {
    match outcome {
        TerminationOutcome::AlreadyExited => TerminationKind::AlreadyExited,
        TerminationOutcome::Graceful => TerminationKind::Graceful,
        TerminationOutcome::Killed => TerminationKind::Killed,
    }
}
