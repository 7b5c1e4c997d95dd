//! Read-only discovery API over the config directory.
//!
//! Lists the local HTTP proxy endpoints described by the config files so
//! other programs can pick one up without parsing the configs themselves:
//!
//! ```text
//! GET /                                   usage text
//! GET /api/proxies?limit=&filter=&check=1&format=json|text
//! GET /api/proxy?random=1&format=json|text
//! ```
//!
//! The text format is one `host:port` per line and is the default.

mod discovery;
mod error;
mod server;

pub use discovery::{ProxyDirectory, ProxyInfo, ProxyQuery, check_available};
pub use error::ApiError;
pub use server::{ApiServer, ResponseFormat};
