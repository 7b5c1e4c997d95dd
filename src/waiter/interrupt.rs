//! Block until interrupt or until every client exits, then clean up.

use super::monitor::watch_exits;
use super::state::{WaitOutcome, WaitTrigger, WaiterState};
use crate::config::SupervisorSettings;
use crate::supervisor::{CleanupReport, ProcessSupervisor};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Waits on the fleet and stops it.
pub struct InterruptWaiter {
    supervisor: Arc<ProcessSupervisor>,
    settings: SupervisorSettings,
    shutdown_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<WaiterState>,
}

impl InterruptWaiter {
    /// Create a waiter.
    ///
    /// `shutdown_rx` flipping to `true` is the interrupt. Dropping its sender
    /// is not.
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        settings: SupervisorSettings,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (state_tx, _) = watch::channel(WaiterState::Running);
        Self {
            supervisor,
            settings,
            shutdown_rx,
            state_tx,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WaiterState> {
        self.state_tx.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> WaiterState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: WaiterState) {
        debug!("Waiter state: {:?}", state);
        self.state_tx.send_replace(state);
    }

    /// Wait for an interrupt or for all clients to exit, then stop the rest.
    pub async fn run(mut self) -> WaitOutcome {
        let set = self.supervisor.set().clone();
        if set.is_empty().await {
            info!("No running processes");
            self.set_state(WaiterState::AllExited);
            self.set_state(WaiterState::Done);
            return WaitOutcome {
                trigger: WaitTrigger::AllExited,
                cleanup: CleanupReport::default(),
            };
        }

        info!("{} client(s) running, press Ctrl+C to stop", set.len().await);
        self.set_state(WaiterState::Monitoring);

        let mut monitor = tokio::spawn(watch_exits(set, self.settings.poll_interval()));
        let mut monitor_done = false;
        let mut shutdown_open = true;

        let trigger = if *self.shutdown_rx.borrow_and_update() {
            WaitTrigger::Interrupted
        } else {
            loop {
                tokio::select! {
                    joined = &mut monitor => {
                        monitor_done = true;
                        match joined {
                            Ok(()) => break WaitTrigger::AllExited,
                            Err(e) => {
                                error!("Exit monitor failed: {}", e);
                                break WaitTrigger::Interrupted;
                            }
                        }
                    }
                    changed = self.shutdown_rx.changed(), if shutdown_open => {
                        match changed {
                            Ok(()) if *self.shutdown_rx.borrow_and_update() => {
                                info!("Interrupt received, stopping clients");
                                break WaitTrigger::Interrupted;
                            }
                            Ok(()) => {}
                            Err(_) => {
                                debug!("Shutdown channel closed");
                                shutdown_open = false;
                            }
                        }
                    }
                }
            }
        };

        if !monitor_done {
            monitor.abort();
            match monitor.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => debug!("Exit monitor stopped"),
                Err(e) => warn!("Exit monitor failed: {}", e),
            }
        }

        self.set_state(trigger.into());
        self.set_state(WaiterState::CleaningUp);
        let cleanup = self
            .supervisor
            .cleanup_all(
                self.settings.terminate_timeout(),
                self.settings.cleanup_timeout(),
            )
            .await;
        if !cleanup.is_clean() {
            warn!(
                "{} client(s) could not be confirmed stopped",
                cleanup.abandoned.len()
            );
        }
        info!("All resources released");
        self.set_state(WaiterState::Done);

        WaitOutcome { trigger, cleanup }
    }
}
