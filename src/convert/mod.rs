//! Proxy list conversion.
//!
//! Reads a YAML document with a top-level `proxies` list and writes one JSON
//! client config per matching proxy into an output directory:
//!
//! ```yaml
//! proxies:
//!   - name: HK 01
//!     type: hysteria2
//!     server: hk1.example.com
//!     port: 443            # or ports: "20000-30000"
//!     password: secret
//!     skip-cert-verify: true
//! ```
//!
//! becomes `hk1.json`, listening locally on the next free slot of a
//! contiguous port range (8080, 8081, ... by default).

mod converter;
mod error;
mod source;

pub use converter::{ProxyConverter, SUPPORTED_TYPES};
pub use error::ConvertError;
pub use source::{PortValue, ProxyList, ProxySpec};
