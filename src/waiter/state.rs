//! Waiter states and outcome.

use crate::supervisor::CleanupReport;

/// Where the waiter is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterState {
    /// Created, not yet watching.
    Running,
    /// Watching for exits and the shutdown signal.
    Monitoring,
    /// Every supervised client exited on its own.
    AllExited,
    /// The shutdown signal fired.
    Interrupted,
    /// Stopping remaining clients.
    CleaningUp,
    /// Finished.
    Done,
}

/// What ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTrigger {
    /// No supervised clients were left.
    AllExited,
    /// Shutdown was requested.
    Interrupted,
}

impl From<WaitTrigger> for WaiterState {
    fn from(trigger: WaitTrigger) -> Self {
        match trigger {
            WaitTrigger::AllExited => WaiterState::AllExited,
            WaitTrigger::Interrupted => WaiterState::Interrupted,
        }
    }
}

/// Result of [`InterruptWaiter::run`](super::InterruptWaiter::run).
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    /// What ended the wait.
    pub trigger: WaitTrigger,
    /// What cleanup did.
    pub cleanup: CleanupReport,
}
