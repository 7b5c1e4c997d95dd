//! YAML proxy list schema.

use serde::Deserialize;
use std::fmt;

/// Top-level YAML document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyList {
    /// Proxy servers. `None` when the section is absent.
    #[serde(default)]
    pub proxies: Option<Vec<ProxySpec>>,
}

/// One proxy server entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxySpec {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Protocol, e.g. `hysteria2`.
    #[serde(default, rename = "type")]
    pub proxy_type: Option<String>,

    /// Server host name.
    #[serde(default)]
    pub server: Option<String>,

    /// Server port.
    #[serde(default)]
    pub port: Option<PortValue>,

    /// Port-hopping range, `first-last`.
    #[serde(default)]
    pub ports: Option<String>,

    /// Authentication secret.
    #[serde(default)]
    pub password: Option<String>,

    /// Skip TLS verification.
    #[serde(default, rename = "skip-cert-verify")]
    pub skip_cert_verify: bool,
}

/// A port written either as a number or as text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    /// `port: 443`
    Number(u64),
    /// `port: "443"`
    Text(String),
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortValue::Number(n) => write!(f, "{}", n),
            PortValue::Text(s) => f.write_str(s),
        }
    }
}

impl ProxySpec {
    /// First label of the server host name, used as the output file stem.
    pub fn server_prefix(&self) -> &str {
        self.server
            .as_deref()
            .and_then(|s| s.split('.').next())
            .unwrap_or("unknown")
    }

    /// Server address with port: `port` if given, else the first port of a
    /// `first-last` range, else the bare host.
    pub fn server_address(&self) -> Option<String> {
        let server = self.server.as_deref()?;
        if let Some(ref port) = self.port {
            return Some(format!("{}:{}", server, port));
        }
        if let Some(ref ports) = self.ports {
            let parts: Vec<&str> = ports.split('-').collect();
            if parts.len() == 2 {
                return Some(format!("{}:{}", server, parts[0]));
            }
        }
        Some(server.to_string())
    }
}
