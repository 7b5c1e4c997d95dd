//! Batch connection of proxy clients.
//!
//! A batch runs in two phases. Preparation loads every selected config
//! concurrently and drops the ones that cannot be used. Connection then
//! launches one client per remaining config, at most `max_parallel` at a
//! time, and keeps each client that survives a short grace period.
//!
//! Every prepared config produces exactly one [`AttemptResult`]; a failed
//! attempt never stops the rest of the batch.

mod attempt;
mod batch;
mod gate;

pub use attempt::{AttemptError, AttemptResult, ConnectorSettings, connect_one, parse_port};
pub use batch::{BatchConnector, BatchRequest, prepare_entries};
pub use gate::{Gate, GatePermit};
