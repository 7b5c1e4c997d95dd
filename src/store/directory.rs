//! Directory-backed config store.

use super::error::StoreError;
use super::filter::SelectionFilter;
use super::schema::{ClientConfig, file_name_of};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension of recognized client config files.
pub const CONFIG_EXTENSION: &str = "json";

/// Read-only view over a directory of client config files.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Create a store over the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory this store reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True when the directory exists and holds at least one config file.
    pub fn validate(&self) -> bool {
        if !self.dir.is_dir() {
            return false;
        }
        !self.list().is_empty()
    }

    /// Config files in directory-listing order.
    ///
    /// A missing or unreadable directory lists as empty.
    pub fn list(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_config_file(path))
            .collect()
    }

    /// Select config files by pattern, keeping at most `limit` (0 = all).
    ///
    /// See the module docs for pattern precedence.
    pub fn select(&self, limit: usize, pattern: Option<&str>) -> Vec<PathBuf> {
        let filter = pattern.and_then(SelectionFilter::parse);
        self.select_with(limit, filter.as_ref())
    }

    /// Select config files with an already-parsed filter.
    pub fn select_with(&self, limit: usize, filter: Option<&SelectionFilter>) -> Vec<PathBuf> {
        Self::select_from(self.list(), limit, filter)
    }

    /// Select the single config file whose name is exactly `file_name`.
    pub fn select_specific(&self, file_name: &str) -> Option<PathBuf> {
        let filter = SelectionFilter::exact(file_name);
        self.select_with(1, Some(&filter)).into_iter().next()
    }

    /// Apply filter, limit and ordering to an already-listed set of files.
    ///
    /// Truncation happens before sorting.
    pub fn select_from(
        files: Vec<PathBuf>,
        limit: usize,
        filter: Option<&SelectionFilter>,
    ) -> Vec<PathBuf> {
        let mut selected: Vec<PathBuf> = match filter {
            Some(filter) => files
                .into_iter()
                .filter(|path| filter.matches(&file_name_of(path)))
                .collect(),
            None => files,
        };

        if limit > 0 {
            selected.truncate(limit);
        }
        selected.sort();
        selected
    }

    /// Load and parse a config file.
    pub fn load(path: &Path) -> Result<ClientConfig, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        parse(path, &content)
    }

    /// Load and parse a config file without blocking the runtime.
    pub async fn load_async(path: &Path) -> Result<ClientConfig, StoreError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        parse(path, &content)
    }
}

fn parse(path: &Path, content: &str) -> Result<ClientConfig, StoreError> {
    serde_json::from_str(content).map_err(|e| {
        warn!("Invalid config {}: {}", path.display(), e);
        StoreError::InvalidFormat {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

fn is_config_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext == CONFIG_EXTENSION)
}
