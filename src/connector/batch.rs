//! Batch fan-out over many config files.

use super::attempt::{AttemptError, AttemptResult, ConnectorSettings, connect_one};
use super::gate::Gate;
use crate::store::{ConfigEntry, ConfigStore, StoreError};
use crate::supervisor::ProcessSupervisor;
use crate::telemetry::{self, AuditEvent};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Which configs to connect and how many at once.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    /// Maximum configs to select. 0 = all.
    pub limit: usize,
    /// Selection pattern, see [`ConfigStore::select`].
    pub filter: Option<String>,
    /// Maximum concurrent attempts. 0 = one per prepared entry.
    pub max_parallel: usize,
}

/// Connects many configs concurrently.
pub struct BatchConnector {
    store: ConfigStore,
    supervisor: Arc<ProcessSupervisor>,
    settings: ConnectorSettings,
}

impl BatchConnector {
    /// Create a connector over a store and supervisor.
    pub fn new(
        store: ConfigStore,
        supervisor: Arc<ProcessSupervisor>,
        settings: ConnectorSettings,
    ) -> Self {
        Self {
            store,
            supervisor,
            settings,
        }
    }

    /// Select, prepare and connect configs.
    ///
    /// Results are in completion order. Successful clients are left in the
    /// supervisor's set.
    pub async fn connect_batch(&self, request: &BatchRequest) -> Vec<AttemptResult> {
        let started = Instant::now();

        if !self.store.dir().is_dir() {
            warn!(
                "Config directory {} does not exist or is not a directory",
                self.store.dir().display()
            );
            return Vec::new();
        }

        let candidates = self.store.select(request.limit, request.filter.as_deref());
        if candidates.is_empty() {
            info!("No config files selected in {}", self.store.dir().display());
            return Vec::new();
        }
        info!("Preparing {} config file(s)", candidates.len());

        let entries = prepare_entries(candidates).await;
        info!(
            "Preparation finished in {:.2}s, {} usable",
            started.elapsed().as_secs_f64(),
            entries.len()
        );
        if entries.is_empty() {
            return Vec::new();
        }

        let size = if request.max_parallel > 0 {
            request.max_parallel
        } else {
            entries.len()
        };
        let gate = Gate::new(size);

        let connect_started = Instant::now();
        info!(
            "Connecting {} client(s), at most {} at once",
            entries.len(),
            gate.size()
        );
        let results = self.connect_entries(entries, &gate).await;
        info!(
            "Connection phase finished in {:.2}s",
            connect_started.elapsed().as_secs_f64()
        );

        let connected = results.iter().filter(|r| r.success).count();
        info!("Connected {}/{}", connected, results.len());
        info!(
            "Batch finished in {:.2}s",
            started.elapsed().as_secs_f64()
        );
        telemetry::emit(AuditEvent::BatchCompleted {
            attempted: results.len(),
            connected,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        results
    }

    /// Attempt every entry, admitting at most `gate.size()` at once.
    ///
    /// Every entry yields exactly one result, including attempts whose task
    /// panicked or was cancelled.
    pub async fn connect_entries(&self, entries: Vec<ConfigEntry>, gate: &Gate) -> Vec<AttemptResult> {
        let mut tasks = JoinSet::new();
        let mut paths = HashMap::with_capacity(entries.len());

        for entry in entries {
            let supervisor = Arc::clone(&self.supervisor);
            let settings = self.settings.clone();
            let gate = gate.clone();
            let path = entry.path.clone();

            let task = tasks.spawn(async move {
                let _permit = match gate.enter().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return AttemptResult::failed(
                            &entry.path,
                            None,
                            AttemptError::Unexpected {
                                message: e.to_string(),
                            },
                        );
                    }
                };
                connect_one(&supervisor, &entry, &settings).await
            });
            paths.insert(task.id(), path);
        }

        let mut results = Vec::with_capacity(paths.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                Err(e) => {
                    let path = paths.remove(&e.id()).unwrap_or_default();
                    error!("Attempt for {} failed: {}", path.display(), e);
                    results.push(AttemptResult::failed(
                        path,
                        None,
                        AttemptError::Unexpected {
                            message: e.to_string(),
                        },
                    ));
                }
            }
        }
        results
    }
}

/// Load candidates concurrently, keeping those with an HTTP listen address.
///
/// Unreadable, malformed and listen-less files are logged and dropped. The
/// returned entries keep the candidates' order.
pub async fn prepare_entries(candidates: Vec<PathBuf>) -> Vec<ConfigEntry> {
    let mut tasks = JoinSet::new();
    for (index, path) in candidates.into_iter().enumerate() {
        tasks.spawn(async move {
            let loaded = ConfigStore::load_async(&path).await;
            (index, path, loaded)
        });
    }

    let mut prepared = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, path, Ok(config))) => {
                if config.http_listen().is_none() {
                    warn!("Skipping: {}", StoreError::MissingListen { path });
                    continue;
                }
                debug!("Prepared {}", path.display());
                prepared.push((index, ConfigEntry::new(path, config)));
            }
            Ok((_, _, Err(e))) => warn!("Skipping: {}", e),
            Err(e) => error!("Preparation task failed: {}", e),
        }
    }

    prepared.sort_by_key(|(index, _)| *index);
    prepared.into_iter().map(|(_, entry)| entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_prepare_drops_invalid_and_listenless() {
        let dir = tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            path
        };
        let good = write("a.json", r#"{"http": {"listen": "127.0.0.1:9001"}}"#);
        let broken = write("b.json", "{nope");
        let no_http = write("c.json", r#"{"server": "x:443"}"#);
        let empty_listen = write("d.json", r#"{"http": {"listen": ""}}"#);
        let missing = dir.path().join("e.json");

        let entries = prepare_entries(vec![good.clone(), broken, no_http, empty_listen.clone(), missing]).await;
        let paths: Vec<PathBuf> = entries.into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec![good, empty_listen]);
    }

    #[tokio::test]
    async fn test_connect_batch_missing_dir() {
        let connector = BatchConnector::new(
            ConfigStore::new("/nonexistent/proxy-fleet"),
            Arc::new(ProcessSupervisor::new(
                crate::supervisor::ClientCommand::new("/bin/true"),
                crate::supervisor::SupervisionSet::new(),
            )),
            ConnectorSettings::default(),
        );
        assert!(connector.connect_batch(&BatchRequest::default()).await.is_empty());
    }
}
