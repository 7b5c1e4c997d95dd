//! Handle to a running client process.

use super::command::ClientCommand;
use super::error::SupervisorError;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lines kept per output stream.
pub const OUTPUT_TAIL_LINES: usize = 50;

type LineBuffer = Arc<Mutex<VecDeque<String>>>;

/// How [`ProcessHandle::terminate`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The process had already exited.
    AlreadyExited,
    /// The process exited after SIGTERM within the timeout.
    Graceful,
    /// The process had to be killed.
    Killed,
}

/// Last lines a client wrote to stdout and stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTail {
    /// Captured stdout lines, oldest first.
    pub stdout: Vec<String>,
    /// Captured stderr lines, oldest first.
    pub stderr: Vec<String>,
}

impl OutputTail {
    /// True when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    /// Write the captured lines to the log, prefixed with `label`.
    pub fn log(&self, label: &str) {
        for line in &self.stdout {
            info!("[{}] stdout: {}", label, line);
        }
        for line in &self.stderr {
            warn!("[{}] stderr: {}", label, line);
        }
    }
}

/// A launched client process and everything known about it.
pub struct ProcessHandle {
    path: PathBuf,
    child: Child,
    pid: u32,
    port: u16,
    listen: String,
    exit_code: Option<i32>,
    stdout: LineBuffer,
    stderr: LineBuffer,
    readers: Vec<JoinHandle<()>>,
}

impl ProcessHandle {
    /// Spawn the client for `path` and start capturing its output.
    pub fn spawn(
        command: &ClientCommand,
        path: &Path,
        port: u16,
        listen: impl Into<String>,
    ) -> Result<Self, SupervisorError> {
        let mut child = command
            .build(path)
            .spawn()
            .map_err(|e| SupervisorError::LaunchFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        let Some(pid) = child.id() else {
            return Err(SupervisorError::LaunchFailed {
                path: path.to_path_buf(),
                source: std::io::Error::other("client exited before its PID was read"),
            });
        };
        let stdout = LineBuffer::default();
        let stderr = LineBuffer::default();
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_tail_task(out, Arc::clone(&stdout)));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_tail_task(err, Arc::clone(&stderr)));
        }

        debug!("Spawned client for {} with PID {}", path.display(), pid);
        Ok(Self {
            path: path.to_path_buf(),
            child,
            pid,
            port,
            listen: listen.into(),
            exit_code: None,
            stdout,
            stderr,
            readers,
        })
    }

    /// Config file this process was launched for.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Process ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Local port the client was told to listen on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Local listen address, `host:port`.
    pub fn listen(&self) -> &str {
        &self.listen
    }

    /// Exit code, if the process is known to have exited.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Check for exit without blocking.
    pub fn try_wait(&mut self) -> Result<Option<i32>, SupervisorError> {
        if self.exit_code.is_some() {
            return Ok(self.exit_code);
        }
        let status = self.child.try_wait().map_err(SupervisorError::Wait)?;
        self.exit_code = status.map(exit_code_of);
        Ok(self.exit_code)
    }

    /// Check for exit without blocking, treating wait errors as "still running".
    pub fn poll_exit(&mut self) -> Option<i32> {
        match self.try_wait() {
            Ok(code) => code,
            Err(e) => {
                warn!("{}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Send a signal to the client's process group.
    #[cfg(unix)]
    pub fn signal(&self, signal: nix::sys::signal::Signal) -> Result<(), SupervisorError> {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        killpg(Pid::from_raw(self.pid as i32), signal).map_err(SupervisorError::Signal)
    }

    /// Stop the process: SIGTERM, wait up to `timeout`, then kill.
    ///
    /// Safe to call on a process that has already exited.
    pub async fn terminate(&mut self, timeout: Duration) -> TerminationOutcome {
        if self.poll_exit().is_some() {
            return TerminationOutcome::AlreadyExited;
        }

        #[cfg(unix)]
        if let Err(e) = self.signal(nix::sys::signal::Signal::SIGTERM) {
            debug!("SIGTERM to {} failed: {}", self.pid, e);
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.exit_code = Some(exit_code_of(status));
                TerminationOutcome::Graceful
            }
            Ok(Err(e)) => {
                warn!("Waiting on {} failed: {}", self.pid, e);
                self.kill().await
            }
            Err(_) => {
                debug!(
                    "Client {} did not exit within {:?}, killing",
                    self.pid, timeout
                );
                self.kill().await
            }
        }
    }

    async fn kill(&mut self) -> TerminationOutcome {
        #[cfg(unix)]
        if let Err(e) = self.signal(nix::sys::signal::Signal::SIGKILL) {
            debug!("SIGKILL to group {} failed: {}", self.pid, e);
        }
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill client {}: {}", self.pid, e);
        }
        self.poll_exit();
        TerminationOutcome::Killed
    }

    /// Snapshot captured output without waiting.
    pub fn output(&self) -> OutputTail {
        OutputTail {
            stdout: snapshot(&self.stdout),
            stderr: snapshot(&self.stderr),
        }
    }

    /// Wait up to `wait` for the output readers to reach end of stream, then
    /// snapshot what was captured.
    pub async fn collect_output(&mut self, wait: Duration) -> OutputTail {
        let deadline = tokio::time::Instant::now() + wait;
        for reader in std::mem::take(&mut self.readers) {
            let abort = reader.abort_handle();
            if tokio::time::timeout_at(deadline, reader).await.is_err() {
                abort.abort();
            }
        }
        self.output()
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
        // kill_on_drop only reaches the leader; an unreaped leader keeps the
        // group id from being reused.
        #[cfg(unix)]
        if self.exit_code.is_none() {
            let _ = self.signal(nix::sys::signal::Signal::SIGKILL);
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("path", &self.path)
            .field("pid", &self.pid)
            .field("port", &self.port)
            .field("listen", &self.listen)
            .field("exit_code", &self.exit_code)
            .finish_non_exhaustive()
    }
}

fn spawn_tail_task(
    stream: impl AsyncRead + Unpin + Send + 'static,
    buffer: LineBuffer,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Ok(mut buf) = buffer.lock() {
                if buf.len() == OUTPUT_TAIL_LINES {
                    buf.pop_front();
                }
                buf.push_back(line);
            }
        }
    })
}

fn snapshot(buffer: &LineBuffer) -> Vec<String> {
    buffer
        .lock()
        .map(|buf| buf.iter().cloned().collect())
        .unwrap_or_default()
}

/// Exit code of a finished process; a signal death reports `-signal`.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::{TempDir, tempdir};

    fn stub(dir: &TempDir, body: &str) -> ClientCommand {
        let path = dir.path().join("stub-client");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        ClientCommand::new(path)
    }

    #[tokio::test]
    async fn test_poll_exit_reports_code() {
        let dir = tempdir().unwrap();
        let cmd = stub(&dir, "exit 3");
        let mut handle =
            ProcessHandle::spawn(&cmd, Path::new("a.json"), 9001, "127.0.0.1:9001").unwrap();

        let mut code = None;
        for _ in 0..50 {
            code = handle.poll_exit();
            if code.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(code, Some(3));
        assert_eq!(handle.exit_code(), Some(3));
    }

    #[tokio::test]
    async fn test_terminate_running_process() {
        let dir = tempdir().unwrap();
        let cmd = stub(&dir, "exec sleep 30");
        let mut handle =
            ProcessHandle::spawn(&cmd, Path::new("a.json"), 9001, "127.0.0.1:9001").unwrap();
        assert!(handle.poll_exit().is_none());

        let outcome = handle.terminate(Duration::from_secs(2)).await;
        assert_eq!(outcome, TerminationOutcome::Graceful);
        assert_eq!(handle.exit_code(), Some(-15));

        let again = handle.terminate(Duration::from_secs(2)).await;
        assert_eq!(again, TerminationOutcome::AlreadyExited);
    }

    #[tokio::test]
    async fn test_terminate_kills_after_timeout() {
        let dir = tempdir().unwrap();
        let cmd = stub(&dir, "trap '' TERM\nwhile true; do sleep 1; done");
        let mut handle =
            ProcessHandle::spawn(&cmd, Path::new("a.json"), 9001, "127.0.0.1:9001").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let outcome = handle.terminate(Duration::from_millis(200)).await;
        assert_eq!(outcome, TerminationOutcome::Killed);
        assert_eq!(handle.exit_code(), Some(-9));
    }

    /// Stub whose background helper ignores SIGTERM and writes its PID.
    #[cfg(target_os = "linux")]
    fn stubborn_group(dir: &TempDir) -> (ClientCommand, PathBuf) {
        let pid_file = dir.path().join("helper.pid");
        let cmd = stub(
            dir,
            &format!(
                "trap '' TERM\nsleep 300 &\necho $! > {}\nwait",
                pid_file.display()
            ),
        );
        (cmd, pid_file)
    }

    #[cfg(target_os = "linux")]
    async fn helper_pid(pid_file: &Path) -> i32 {
        for _ in 0..100 {
            if let Ok(text) = std::fs::read_to_string(pid_file)
                && let Ok(pid) = text.trim().parse()
            {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("helper never started");
    }

    /// Running and not a zombie.
    #[cfg(target_os = "linux")]
    fn is_running(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    async fn wait_until_gone(pid: i32) -> bool {
        for _ in 0..100 {
            if !is_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_kill_reaches_whole_group() {
        let dir = tempdir().unwrap();
        let (cmd, pid_file) = stubborn_group(&dir);
        let mut handle =
            ProcessHandle::spawn(&cmd, Path::new("a.json"), 9001, "127.0.0.1:9001").unwrap();
        let helper = helper_pid(&pid_file).await;
        assert!(is_running(helper));

        let outcome = handle.terminate(Duration::from_millis(200)).await;
        assert_eq!(outcome, TerminationOutcome::Killed);
        assert!(wait_until_gone(helper).await, "helper {} still running", helper);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_drop_kills_whole_group() {
        let dir = tempdir().unwrap();
        let (cmd, pid_file) = stubborn_group(&dir);
        let handle =
            ProcessHandle::spawn(&cmd, Path::new("a.json"), 9001, "127.0.0.1:9001").unwrap();
        let helper = helper_pid(&pid_file).await;

        drop(handle);
        assert!(wait_until_gone(helper).await, "helper {} still running", helper);
    }

    #[tokio::test]
    async fn test_spawn_records_real_pid() {
        let dir = tempdir().unwrap();
        let cmd = stub(&dir, "exec sleep 30");
        let mut handle =
            ProcessHandle::spawn(&cmd, Path::new("a.json"), 9001, "127.0.0.1:9001").unwrap();
        assert_ne!(handle.pid(), 0);
        handle.terminate(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_output_tail_is_bounded() {
        let dir = tempdir().unwrap();
        let cmd = stub(
            &dir,
            "i=0\nwhile [ $i -lt 80 ]; do echo line$i; i=$((i+1)); done\necho oops >&2",
        );
        let mut handle =
            ProcessHandle::spawn(&cmd, Path::new("a.json"), 9001, "127.0.0.1:9001").unwrap();

        let tail = handle.collect_output(Duration::from_secs(5)).await;
        assert_eq!(tail.stdout.len(), OUTPUT_TAIL_LINES);
        assert_eq!(tail.stdout.first().map(String::as_str), Some("line30"));
        assert_eq!(tail.stdout.last().map(String::as_str), Some("line79"));
        assert_eq!(tail.stderr, vec!["oops".to_string()]);
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let cmd = ClientCommand::new("/nonexistent/hysteria");
        let result = ProcessHandle::spawn(&cmd, Path::new("a.json"), 9001, "127.0.0.1:9001");
        assert!(matches!(result, Err(SupervisorError::LaunchFailed { .. })));
    }
}
