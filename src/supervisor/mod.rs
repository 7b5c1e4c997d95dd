//! Client process supervision.
//!
//! One external proxy client runs per config file:
//!
//! ```text
//! <executable> client -c <config-path> [--log-level <level>]
//! ```
//!
//! Each child is started in its own process group with stdout and stderr
//! piped into a bounded line tail. Running children live in a
//! [`SupervisionSet`] shared between the batch connector, the exit monitor
//! and cleanup. Shutdown sends SIGTERM to each process group, waits a grace
//! period, then sends SIGKILL to the group. Dropping a handle whose client
//! is still running kills its group too.

mod command;
mod error;
mod handle;
mod manager;
mod set;

pub use command::{ClientCommand, DEFAULT_BINARY_NAME, candidate_names, find_in_dir, locate_executable};
pub use error::SupervisorError;
pub use handle::{OUTPUT_TAIL_LINES, OutputTail, ProcessHandle, TerminationOutcome, exit_code_of};
pub use manager::{CleanupReport, ProcessSupervisor};
pub use set::{ExitedProcess, SupervisionSet};
