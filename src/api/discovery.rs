//! Building the proxy list from config files.

use crate::store::{ConfigStore, file_name_of};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Server shown when a config does not name one.
const UNKNOWN_SERVER: &str = "unknown";

/// One local HTTP proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyInfo {
    /// Config `name`, or the file name.
    pub name: String,
    /// `http://host:port`.
    pub url: String,
    /// Listen host.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Path of the config file.
    pub config_file: String,
    /// Remote server the client connects to.
    pub server: String,
    /// Result of the TCP probe, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

impl ProxyInfo {
    /// `host:port`, the text form of an endpoint.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which proxies to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyQuery {
    /// Maximum configs to consider. 0 = all.
    pub limit: usize,
    /// Selection pattern, see [`ConfigStore::select`].
    pub filter: Option<String>,
    /// Probe each endpoint with a TCP connect.
    pub check: bool,
}

/// Proxy endpoints described by a config directory.
#[derive(Debug, Clone)]
pub struct ProxyDirectory {
    store: ConfigStore,
    check_timeout: Duration,
}

impl ProxyDirectory {
    /// Create a directory view with the given probe timeout.
    pub fn new(store: ConfigStore, check_timeout: Duration) -> Self {
        Self {
            store,
            check_timeout,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Endpoints matching `query`, in selection order.
    ///
    /// Configs that cannot be read, lack an HTTP listen address, or whose
    /// address has no valid port are left out.
    pub async fn list(&self, query: &ProxyQuery) -> Vec<ProxyInfo> {
        let candidates = self.store.select(query.limit, query.filter.as_deref());
        let mut proxies = load_all(candidates).await;

        if query.check && !proxies.is_empty() {
            let mut probes = JoinSet::new();
            for (index, proxy) in proxies.iter().enumerate() {
                let host = proxy.host.clone();
                let port = proxy.port;
                let timeout = self.check_timeout;
                probes.spawn(async move { (index, check_available(&host, port, timeout).await) });
            }
            while let Some(joined) = probes.join_next().await {
                match joined {
                    Ok((index, available)) => proxies[index].available = Some(available),
                    Err(e) => warn!("Availability probe failed: {}", e),
                }
            }
        }

        proxies
    }
}

async fn load_all(candidates: Vec<PathBuf>) -> Vec<ProxyInfo> {
    let mut tasks = JoinSet::new();
    for (index, path) in candidates.into_iter().enumerate() {
        tasks.spawn(async move {
            let info = match ConfigStore::load_async(&path).await {
                Ok(config) => {
                    let name = config.name.clone().unwrap_or_else(|| file_name_of(&path));
                    let server = config
                        .server
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_SERVER.to_string());
                    config
                        .http_listen()
                        .and_then(|listen| proxy_info(&path, listen, name, server))
                }
                Err(e) => {
                    warn!("Skipping: {}", e);
                    None
                }
            };
            (index, info)
        });
    }

    let mut loaded = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Some(info))) => loaded.push((index, info)),
            Ok((_, None)) => {}
            Err(e) => warn!("Loading task failed: {}", e),
        }
    }
    loaded.sort_by_key(|(index, _)| *index);
    loaded.into_iter().map(|(_, info)| info).collect()
}

fn proxy_info(path: &std::path::Path, listen: &str, name: String, server: String) -> Option<ProxyInfo> {
    let Some((host, port)) = listen.rsplit_once(':') else {
        debug!("{}: listen address {:?} has no port", path.display(), listen);
        return None;
    };
    let port = match port.trim().parse::<u16>() {
        Ok(port) => port,
        Err(_) => {
            debug!("{}: invalid port in {:?}", path.display(), listen);
            return None;
        }
    };

    Some(ProxyInfo {
        name,
        url: format!("http://{}", listen),
        host: host.to_string(),
        port,
        config_file: path.display().to_string(),
        server,
        available: None,
    })
}

/// Whether a TCP connection to `host:port` opens within `timeout`.
pub async fn check_available(host: &str, port: u16, timeout: Duration) -> bool {
    if port == 0 {
        return false;
    }
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("{}:{} unreachable: {}", host, port, e);
            false
        }
        Err(_) => {
            debug!("{}:{} probe timed out", host, port);
            false
        }
    }
}
