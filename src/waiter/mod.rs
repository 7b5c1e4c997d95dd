//! Waiting for the fleet to finish.
//!
//! After a batch connect the [`InterruptWaiter`] blocks until either the
//! shutdown signal fires or every supervised client has exited on its own,
//! then stops whatever is left. Progress is published on a watch channel:
//!
//! ```text
//! Running -> Monitoring -> AllExited | Interrupted -> CleaningUp -> Done
//! ```

mod interrupt;
mod monitor;
mod state;

pub use interrupt::InterruptWaiter;
pub use monitor::watch_exits;
pub use state::{WaitOutcome, WaitTrigger, WaiterState};
