//! Client executable lookup and command line construction.

use super::error::SupervisorError;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Default base name of the client binary.
pub const DEFAULT_BINARY_NAME: &str = "hysteria";

/// How to invoke the proxy client for one config file.
#[derive(Debug, Clone)]
pub struct ClientCommand {
    /// Resolved client executable.
    pub executable: PathBuf,
    /// Value for `--log-level`; omitted when `None`.
    pub log_level: Option<String>,
}

impl ClientCommand {
    /// Create a command for an already-resolved executable.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            log_level: None,
        }
    }

    /// Set the client log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        let level = level.into();
        self.log_level = (!level.is_empty()).then_some(level);
        self
    }

    /// Arguments passed to the client for a given config file.
    pub fn args(&self, config_path: &Path) -> Vec<String> {
        let mut args = vec![
            "client".to_string(),
            "-c".to_string(),
            config_path.display().to_string(),
        ];
        if let Some(ref level) = self.log_level {
            args.push("--log-level".to_string());
            args.push(level.clone());
        }
        args
    }

    /// Build the tokio command for a config file.
    ///
    /// The child gets its own process group so a terminal interrupt aimed at
    /// the supervisor does not reach it, and is killed if its handle is
    /// dropped.
    pub fn build(&self, config_path: &Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(self.args(config_path))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

/// Platform-specific file names for a binary base name.
pub fn candidate_names(base: &str) -> Vec<String> {
    let exe = format!("{}.exe", base);
    if cfg!(windows) {
        vec![exe, base.to_string()]
    } else {
        vec![base.to_string(), exe]
    }
}

/// Resolve the client executable.
///
/// An explicit path must exist. Otherwise the current directory is searched
/// for an executable named after `base`, then `PATH`.
pub fn locate_executable(base: &str, explicit: Option<&Path>) -> Result<PathBuf, SupervisorError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(SupervisorError::ExecutableNotFound(
            path.display().to_string(),
        ));
    }

    let cwd = std::env::current_dir().map_err(|e| {
        SupervisorError::ExecutableNotFound(format!("{} (cannot read current dir: {})", base, e))
    })?;
    if let Some(found) = find_in_dir(&cwd, base) {
        debug!("Using client executable from working directory: {}", found.display());
        return Ok(found);
    }

    for name in candidate_names(base) {
        if let Ok(found) = which::which(&name) {
            debug!("Using client executable from PATH: {}", found.display());
            return Ok(found);
        }
    }

    Err(SupervisorError::ExecutableNotFound(base.to_string()))
}

/// Look for an executable named after `base` directly inside `dir`.
pub fn find_in_dir(dir: &Path, base: &str) -> Option<PathBuf> {
    candidate_names(base)
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_args_with_log_level() {
        let cmd = ClientCommand::new("/usr/bin/hysteria").with_log_level("debug");
        assert_eq!(
            cmd.args(Path::new("/configs/hk.json")),
            vec!["client", "-c", "/configs/hk.json", "--log-level", "debug"]
        );
    }

    #[test]
    fn test_args_without_log_level() {
        let cmd = ClientCommand::new("hysteria").with_log_level("");
        assert_eq!(cmd.args(Path::new("a.json")), vec!["client", "-c", "a.json"]);
    }

    #[test]
    fn test_candidate_names_order() {
        let names = candidate_names("hysteria");
        assert_eq!(names.len(), 2);
        if cfg!(windows) {
            assert_eq!(names[0], "hysteria.exe");
        } else {
            assert_eq!(names[0], "hysteria");
        }
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let result = locate_executable("hysteria", Some(Path::new("/nonexistent/hysteria")));
        assert!(matches!(result, Err(SupervisorError::ExecutableNotFound(_))));
    }

    #[test]
    fn test_explicit_path_is_used() {
        let dir = tempdir().unwrap();
        let bin = dir.path().join("client");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();

        let found = locate_executable("hysteria", Some(&bin)).unwrap();
        assert_eq!(found, bin);
    }

    #[test]
    fn test_unknown_binary_not_found() {
        let result = locate_executable("proxy-fleet-no-such-binary-4b1d", None);
        assert!(matches!(result, Err(SupervisorError::ExecutableNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_find_in_dir_requires_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let bin = dir.path().join("hysteria");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(find_in_dir(dir.path(), "hysteria").is_none());

        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(find_in_dir(dir.path(), "hysteria"), Some(bin));
    }
}
