//! Periodic exit detection.

use crate::store::file_name_of;
use crate::supervisor::SupervisionSet;
use crate::telemetry::{self, AuditEvent};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Reap exited clients every `interval` until the set is empty.
///
/// Each exit is logged together with the client's last output lines.
pub async fn watch_exits(set: SupervisionSet, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        for exited in set.reap_exited().await {
            let name = file_name_of(&exited.path);
            warn!(
                "[{}] Client on port {} exited with code {}",
                name, exited.port, exited.code
            );
            exited.output.log(&name);
            telemetry::emit(AuditEvent::ProcessExited {
                config: name,
                code: Some(exited.code),
            });
        }

        if set.is_empty().await {
            info!("All clients have exited");
            break;
        }
    }
}
