//! The shared collection of live client processes.

use super::handle::{OutputTail, ProcessHandle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Time allowed for an exited client's output readers to drain.
const OUTPUT_DRAIN_WAIT: Duration = Duration::from_millis(200);

/// A supervised process that was found to have exited.
#[derive(Debug, Clone)]
pub struct ExitedProcess {
    /// Config file the process was launched for.
    pub path: PathBuf,
    /// Port it was listening on.
    pub port: u16,
    /// Exit code; negative values are the terminating signal.
    pub code: i32,
    /// What it printed last.
    pub output: OutputTail,
}

/// Live client processes keyed by config path.
///
/// Cloning shares the same underlying set. All access goes through an async
/// mutex; the lock is never held while a process is being terminated.
#[derive(Clone, Default)]
pub struct SupervisionSet {
    inner: Arc<Mutex<HashMap<PathBuf, ProcessHandle>>>,
}

impl SupervisionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle.
    ///
    /// A handle whose config already has a live process is rejected and
    /// given back. A stale entry whose process has exited is replaced.
    pub async fn insert(&self, handle: ProcessHandle) -> Result<(), ProcessHandle> {
        let mut set = self.inner.lock().await;
        if let Some(existing) = set.get_mut(handle.path())
            && existing.poll_exit().is_none()
        {
            return Err(handle);
        }
        set.insert(handle.path().to_path_buf(), handle);
        Ok(())
    }

    /// Remove and return the handle for a config path.
    pub async fn remove(&self, path: &Path) -> Option<ProcessHandle> {
        self.inner.lock().await.remove(path)
    }

    /// Whether a handle is held for a config path.
    pub async fn contains(&self, path: &Path) -> bool {
        self.inner.lock().await.contains_key(path)
    }

    /// Number of handles held.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// True when no handles are held.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Config paths currently held, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.inner.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Remove every handle whose process has exited and report them.
    pub async fn reap_exited(&self) -> Vec<ExitedProcess> {
        let mut exited = Vec::new();
        {
            let mut set = self.inner.lock().await;
            let done: Vec<PathBuf> = set
                .iter_mut()
                .filter_map(|(path, handle)| handle.poll_exit().map(|_| path.clone()))
                .collect();
            for path in done {
                if let Some(handle) = set.remove(&path) {
                    exited.push(handle);
                }
            }
        }

        let mut reports = Vec::with_capacity(exited.len());
        for mut handle in exited {
            let output = handle.collect_output(OUTPUT_DRAIN_WAIT).await;
            reports.push(ExitedProcess {
                path: handle.path().to_path_buf(),
                port: handle.port(),
                code: handle.exit_code().unwrap_or(-1),
                output,
            });
        }
        reports.sort_by(|a, b| a.path.cmp(&b.path));
        reports
    }

    /// Take every handle out, leaving the set empty.
    pub async fn drain(&self) -> Vec<ProcessHandle> {
        self.inner.lock().await.drain().map(|(_, h)| h).collect()
    }
}

impl std::fmt::Debug for SupervisionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisionSet").finish_non_exhaustive()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::supervisor::ClientCommand;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::{TempDir, tempdir};

    fn stub(dir: &TempDir, body: &str) -> ClientCommand {
        let path = dir.path().join("stub-client");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        ClientCommand::new(path)
    }

    fn spawn(cmd: &ClientCommand, name: &str, port: u16) -> ProcessHandle {
        ProcessHandle::spawn(cmd, Path::new(name), port, format!("127.0.0.1:{}", port)).unwrap()
    }

    #[tokio::test]
    async fn test_insert_rejects_live_duplicate() {
        let dir = tempdir().unwrap();
        let cmd = stub(&dir, "exec sleep 30");
        let set = SupervisionSet::new();

        set.insert(spawn(&cmd, "a.json", 9001)).await.unwrap();
        let rejected = set.insert(spawn(&cmd, "a.json", 9002)).await;
        let mut duplicate = rejected.unwrap_err();
        assert_eq!(duplicate.port(), 9002);
        assert_eq!(set.len().await, 1);

        duplicate.terminate(Duration::from_secs(1)).await;
        for mut handle in set.drain().await {
            handle.terminate(Duration::from_secs(1)).await;
        }
        assert!(set.is_empty().await);
    }

    #[tokio::test]
    async fn test_reap_exited_removes_only_finished() {
        let dir = tempdir().unwrap();
        let quick = stub(&dir, "echo bye\nexit 2");
        let slow_dir = tempdir().unwrap();
        let slow = stub(&slow_dir, "exec sleep 30");
        let set = SupervisionSet::new();

        set.insert(spawn(&quick, "quick.json", 9001)).await.unwrap();
        set.insert(spawn(&slow, "slow.json", 9002)).await.unwrap();

        let mut reaped = Vec::new();
        for _ in 0..50 {
            reaped.extend(set.reap_exited().await);
            if !reaped.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].path, PathBuf::from("quick.json"));
        assert_eq!(reaped[0].code, 2);
        assert_eq!(reaped[0].output.stdout, vec!["bye".to_string()]);
        assert_eq!(set.paths().await, vec![PathBuf::from("slow.json")]);

        for mut handle in set.drain().await {
            handle.terminate(Duration::from_secs(1)).await;
        }
    }
}
