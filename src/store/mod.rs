//! Client configuration store.
//!
//! A config directory holds one JSON file per proxy server, produced by the
//! `convert` command. This module lists, filters and loads those files.
//!
//! # Selection
//!
//! [`ConfigStore::select`] applies a filter pattern with the following
//! precedence:
//!
//! 1. A pattern containing `|` is a set of literal file names; only exact
//!    basename matches are kept (`hk.json|jp.json`).
//! 2. Otherwise the pattern is compiled as a case-insensitive regex and
//!    matched against each basename (`^hk\d+`).
//! 3. If the regex does not compile, a case-insensitive substring match is
//!    used instead (`hk[`).
//!
//! The filtered list is then truncated to `limit` and only afterwards sorted.
//! With a limit smaller than the number of matches, *which* files are kept
//! depends on directory-listing order.

mod error;
mod filter;
mod schema;
mod directory;

pub use error::StoreError;
pub use filter::SelectionFilter;
pub use schema::{ClientConfig, ConfigEntry, HttpSection, TlsSection};
pub(crate) use schema::file_name_of;
pub use directory::{CONFIG_EXTENSION, ConfigStore};
