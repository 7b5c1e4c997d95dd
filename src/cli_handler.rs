//! Subcommand dispatch for proxy-fleet.
//!
//! Each subcommand runs on its own tokio runtime. Ctrl+C (and SIGTERM on
//! unix) flips a shared shutdown flag that the waiter and the API server
//! both observe.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::ApiServer;
use crate::cli::Commands;
use crate::config::Settings;
use crate::connector::{
    AttemptResult, BatchConnector, BatchRequest, ConnectorSettings, Gate, prepare_entries,
};
use crate::convert::ProxyConverter;
use crate::store::ConfigStore;
use crate::supervisor::{ClientCommand, ProcessSupervisor, SupervisionSet, locate_executable};
use crate::telemetry::{self, AuditEvent};
use crate::waiter::{InterruptWaiter, WaitOutcome};

/// How long the discovery API gets to stop after the fleet is down.
const API_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause before starting the API so client startup logs come first.
const API_START_DELAY: Duration = Duration::from_millis(100);

/// Run a parsed subcommand with loaded settings.
pub fn handle_command(command: Commands, settings: Settings) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let started = Instant::now();
    let name = command.name();
    telemetry::emit(AuditEvent::SessionStart {
        command: name.to_string(),
        config_dir: settings.general.config_dir.display().to_string(),
        pid: std::process::id(),
    });

    let result = rt.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let signals = tokio::spawn(forward_signals(shutdown_tx));

        let result = match command {
            Commands::Convert { yaml_file, .. } => run_convert(&yaml_file, &settings)
                .await
                .map(|_| 0),
            Commands::Connect {
                config_file,
                batch,
                limit,
                filter,
                ..
            } => {
                let target = if batch {
                    ConnectTarget::Batch { limit, filter }
                } else {
                    ConnectTarget::Single(config_file)
                };
                run_connect(target, &settings, shutdown_rx).await
            }
            Commands::Api { .. } => run_api(&settings, shutdown_rx).await.map(|_| 0),
        };

        signals.abort();
        result
    });

    let abandoned = *result.as_ref().unwrap_or(&0);
    telemetry::emit(AuditEvent::SessionEnd {
        command: name.to_string(),
        duration_sec: started.elapsed().as_secs(),
        abandoned,
    });

    result.map(|_| ())
}

/// Flip the shutdown flag on Ctrl+C or SIGTERM.
async fn forward_signals(shutdown_tx: watch::Sender<bool>) {
    wait_for_signal().await;
    info!("Shutdown requested");
    shutdown_tx.send_replace(true);
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            wait_for_ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = term.recv() => debug!("SIGTERM received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn run_convert(yaml_file: &Path, settings: &Settings) -> Result<()> {
    let converter = ProxyConverter::from_file(yaml_file)
        .with_context(|| format!("Failed to load proxy list {}", yaml_file.display()))?;

    let convert = &settings.convert;
    let written = converter
        .generate_all(&convert.proxy_type, &convert.output_dir, convert.start_port)
        .await
        .context("Failed to generate client configs")?;

    if written.is_empty() {
        warn!("No {} proxies in {}", convert.proxy_type, yaml_file.display());
    }
    Ok(())
}

enum ConnectTarget {
    Single(PathBuf),
    Batch { limit: usize, filter: Option<String> },
}

/// Connect clients, wait for shutdown, stop them.
///
/// Returns how many clients could not be confirmed stopped.
async fn run_connect(
    target: ConnectTarget,
    settings: &Settings,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<usize> {
    if let ConnectTarget::Batch { .. } = target {
        require_config_dir(&ConfigStore::new(&settings.general.config_dir))?;
    }

    let executable = locate_executable(
        &settings.client.binary_name,
        settings.client.executable.as_deref(),
    )
    .context("Client executable not available")?;
    info!("Using client executable {}", executable.display());

    let command = ClientCommand::new(executable).with_log_level(settings.client.log_level.clone());
    let supervisor = Arc::new(ProcessSupervisor::new(command, SupervisionSet::new()));
    let connector_settings = ConnectorSettings::from_settings(settings);

    let mut api = None;
    match target {
        ConnectTarget::Batch { limit, filter } => {
            let store = ConfigStore::new(&settings.general.config_dir);
            let connector =
                BatchConnector::new(store.clone(), Arc::clone(&supervisor), connector_settings);
            let request = BatchRequest {
                limit,
                filter,
                max_parallel: settings.general.max_parallel,
            };
            let results = connector.connect_batch(&request).await;
            report(&results);

            if results.iter().any(|r| r.success) {
                tokio::time::sleep(API_START_DELAY).await;
                api = start_api(store, settings).await;
            }
        }
        ConnectTarget::Single(config_file) => {
            let result = connect_single(&config_file, Arc::clone(&supervisor), connector_settings).await?;
            report(std::slice::from_ref(&result));
            if let Some(ref e) = result.error {
                bail!("Failed to connect {}: {}", config_file.display(), e);
            }
        }
    }

    let waiter = InterruptWaiter::new(Arc::clone(&supervisor), settings.supervisor.clone(), shutdown_rx);
    let outcome: WaitOutcome = waiter.run().await;
    debug!("Wait ended: {:?}", outcome.trigger);

    if let Some((api_tx, task)) = api {
        api_tx.send_replace(true);
        match tokio::time::timeout(API_STOP_TIMEOUT, task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!("Discovery API failed: {}", e),
            Ok(Err(e)) => warn!("Discovery API task failed: {}", e),
            Err(_) => warn!("Discovery API did not stop in time"),
        }
    }

    Ok(outcome.cleanup.abandoned.len())
}

async fn connect_single(
    config_file: &Path,
    supervisor: Arc<ProcessSupervisor>,
    settings: ConnectorSettings,
) -> Result<AttemptResult> {
    let dir = match config_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let Some(file_name) = config_file.file_name().and_then(|n| n.to_str()) else {
        bail!("Invalid config file path {}", config_file.display());
    };

    let store = ConfigStore::new(dir);
    let Some(path) = store.select_specific(file_name) else {
        bail!("Config file {} not found", config_file.display());
    };

    let entries = prepare_entries(vec![path]).await;
    if entries.is_empty() {
        bail!("Config file {} is not usable", config_file.display());
    }

    let connector = BatchConnector::new(store, supervisor, settings);
    let mut results = connector.connect_entries(entries, &Gate::new(1)).await;
    results
        .pop()
        .context("Connection attempt produced no result")
}

/// Fail unless the directory exists and holds at least one config file.
fn require_config_dir(store: &ConfigStore) -> Result<()> {
    if !store.validate() {
        bail!(
            "Invalid config directory {}: missing or without config files",
            store.dir().display()
        );
    }
    Ok(())
}

/// Bind the discovery API and serve it in the background.
async fn start_api(
    store: ConfigStore,
    settings: &Settings,
) -> Option<(watch::Sender<bool>, tokio::task::JoinHandle<Result<(), crate::api::ApiError>>)> {
    let (api_tx, api_rx) = watch::channel(false);
    let server = ApiServer::new(store, &settings.api, api_rx);
    match server.bind().await {
        Ok(listener) => Some((api_tx, tokio::spawn(server.serve(listener)))),
        Err(e) => {
            warn!("Discovery API disabled: {}", e);
            None
        }
    }
}

async fn run_api(settings: &Settings, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
    let store = ConfigStore::new(&settings.general.config_dir);
    if !store.validate() {
        warn!(
            "No config files in {}, the API will report no proxies",
            store.dir().display()
        );
    }
    ApiServer::new(store, &settings.api, shutdown_rx)
        .run()
        .await
        .context("Discovery API failed")
}

fn report(results: &[AttemptResult]) {
    for result in results {
        match (&result.http_listen, &result.error) {
            (Some(listen), None) => info!(
                "{}: HTTP proxy at http://{}",
                result.config_file.display(),
                listen
            ),
            (_, Some(e)) => error!("{}: {}", result.config_file.display(), e),
            (None, None) => {}
        }
    }
}
