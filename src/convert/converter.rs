//! Proxy list to client config conversion.

use super::error::ConvertError;
use super::source::{ProxyList, ProxySpec};
use crate::store::{CONFIG_EXTENSION, ClientConfig, HttpSection, TlsSection};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Proxy types a client config can be generated for.
pub const SUPPORTED_TYPES: &[&str] = &["hysteria2"];

/// Host every generated client listens on.
const LISTEN_HOST: &str = "127.0.0.1";

/// Converts a parsed proxy list into client configs.
#[derive(Debug, Clone)]
pub struct ProxyConverter {
    proxies: Vec<ProxySpec>,
}

impl ProxyConverter {
    /// Load a YAML proxy list from disk.
    pub fn from_file(path: &Path) -> Result<Self, ConvertError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConvertError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// Parse a YAML proxy list; `source` is only used in errors.
    pub fn from_yaml_str(text: &str, source: &Path) -> Result<Self, ConvertError> {
        let list: ProxyList = serde_yaml_ng::from_str(text).map_err(|e| ConvertError::Parse {
            path: source.to_path_buf(),
            source: e,
        })?;
        let proxies = list.proxies.ok_or_else(|| ConvertError::MissingProxies {
            path: source.to_path_buf(),
        })?;
        info!("Loaded {} proxy entries", proxies.len());
        Ok(Self { proxies })
    }

    /// Every proxy in the list.
    pub fn proxies(&self) -> &[ProxySpec] {
        &self.proxies
    }

    /// Proxies of the given type.
    pub fn by_type(&self, proxy_type: &str) -> Vec<&ProxySpec> {
        self.proxies
            .iter()
            .filter(|p| p.proxy_type.as_deref() == Some(proxy_type))
            .collect()
    }

    /// Output file name and client config for one proxy.
    pub fn client_config(proxy: &ProxySpec, port: u16) -> (String, ClientConfig) {
        let prefix = proxy.server_prefix();
        let config = ClientConfig {
            server: proxy.server_address(),
            auth: proxy.password.clone(),
            tls: TlsSection {
                insecure: proxy.skip_cert_verify,
            },
            transport: Default::default(),
            http: Some(HttpSection {
                listen: Some(format!("{}:{}", LISTEN_HOST, port)),
            }),
            name: Some(proxy.name.clone().unwrap_or_else(|| prefix.to_string())),
        };
        (format!("{}.{}", prefix, CONFIG_EXTENSION), config)
    }

    /// Write one config per proxy of `proxy_type` into `output_dir`.
    ///
    /// Proxies get consecutive local ports from `start_port`. Returns the
    /// written paths.
    pub async fn generate_all(
        &self,
        proxy_type: &str,
        output_dir: &Path,
        start_port: u16,
    ) -> Result<Vec<PathBuf>, ConvertError> {
        if !SUPPORTED_TYPES.contains(&proxy_type) {
            return Err(ConvertError::UnsupportedType(proxy_type.to_string()));
        }

        let proxies = self.by_type(proxy_type);
        if proxies.is_empty() {
            warn!("No proxies of type {}", proxy_type);
            return Ok(Vec::new());
        }
        if usize::from(start_port) + proxies.len() - 1 > usize::from(u16::MAX) {
            return Err(ConvertError::PortsExhausted {
                start: start_port,
                count: proxies.len(),
            });
        }

        info!(
            "Generating {} {} config(s) in {}",
            proxies.len(),
            proxy_type,
            output_dir.display()
        );
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| ConvertError::Write {
                path: output_dir.to_path_buf(),
                source: e,
            })?;

        let mut written = Vec::with_capacity(proxies.len());
        let mut seen = HashSet::new();
        for (offset, proxy) in proxies.into_iter().enumerate() {
            let port = start_port + offset as u16;
            let (file_name, config) = Self::client_config(proxy, port);
            if !seen.insert(file_name.clone()) {
                warn!("{} generated twice, later entry overwrites", file_name);
            }

            let path = output_dir.join(&file_name);
            tokio::fs::write(&path, to_pretty_json(&config)?)
                .await
                .map_err(|e| ConvertError::Write {
                    path: path.clone(),
                    source: e,
                })?;
            info!("Wrote {} (HTTP proxy {}:{})", path.display(), LISTEN_HOST, port);
            written.push(path);
        }

        info!("Generated {} config file(s)", written.len());
        Ok(written)
    }
}

/// JSON with four-space indentation, non-ASCII kept as is.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}
