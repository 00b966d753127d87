//! Worker process supervision.
//!
//! Spawns the browser worker executable with the startup contract the
//! worker expects (`--parentProcessId` first, then optional cache paths,
//! then raw pass-through arguments), and watches its exit from a
//! background task that publishes the exit code as a cooperative stop
//! signal.

use crate::connection::Connection;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, watch};

/// Immutable worker configuration, captured at construction.
///
/// Read-only after the worker is spawned. `additional_args` are appended
/// verbatim; callers must pre-escape them.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Browser cache path (`--cachePath`)
    pub cache_path: Option<PathBuf>,
    /// Root cache path (`--rootCachePath`)
    pub root_cache_path: Option<PathBuf>,
    /// Raw pass-through arguments for the worker
    pub additional_args: Vec<String>,
}

/// Builds the worker command line per the startup contract:
/// `--parentProcessId=<pid>`, then `--cachePath`/`--rootCachePath` when
/// set, then the raw pass-through arguments, in that order.
pub fn build_worker_args(parent_pid: u32, settings: &Settings) -> Vec<String> {
    let mut args = vec![format!("--parentProcessId={parent_pid}")];

    if let Some(cache_path) = &settings.cache_path {
        args.push(format!("--cachePath={}", cache_path.display()));
    }
    if let Some(root_cache_path) = &settings.root_cache_path {
        args.push(format!("--rootCachePath={}", root_cache_path.display()));
    }
    args.extend(settings.additional_args.iter().cloned());

    args
}

/// The spawned worker process, before its stdio is handed to the transport.
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    pid: Option<u32>,
}

impl WorkerProcess {
    /// Spawns the worker executable.
    ///
    /// Fails with [`Error::InvalidArgument`] for an empty path and
    /// [`Error::ExecutableNotFound`] when the path does not resolve to an
    /// existing file - both before any process is spawned.
    pub fn launch(path: &Path, settings: &Settings) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument(
                "worker executable path is empty".to_string(),
            ));
        }

        if !path.is_file() {
            return Err(Error::ExecutableNotFound(path.to_path_buf()));
        }

        let args = build_worker_args(std::process::id(), settings);
        tracing::debug!(path = %path.display(), ?args, "launching worker");

        let child = Command::new(path)
            .args(&args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|e| Error::LaunchFailed(format!("failed to spawn worker: {e}")))?;

        let pid = child.id();
        Ok(Self { child, pid })
    }

    /// OS process identifier, if the process is still running.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Takes the stdio streams the transport is layered over.
    pub fn take_stdio(&mut self) -> Result<(ChildStdin, ChildStdout)> {
        let stdin = self
            .child
            .stdin
            .take()
            .ok_or_else(|| Error::LaunchFailed("worker stdin was not piped".to_string()))?;
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| Error::LaunchFailed("worker stdout was not piped".to_string()))?;
        Ok((stdin, stdout))
    }

    /// Hands the process to a background exit watcher.
    pub fn into_supervisor(self, connection: Option<Arc<Connection>>) -> WorkerSupervisor {
        WorkerSupervisor::spawn(self.child, connection)
    }
}

/// Background watcher owning the worker [`Child`].
///
/// Waits for the process to exit (or for a kill request), records the exit
/// code exactly once, and closes the session so pending and future calls
/// fail instead of hanging. The exit code is published on a `watch`
/// channel - the cross-context stop signal an embedding run loop can
/// select on.
#[derive(Debug)]
pub struct WorkerSupervisor {
    exit_rx: watch::Receiver<Option<i32>>,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl WorkerSupervisor {
    fn spawn(mut child: Child, connection: Option<Arc<Connection>>) -> Self {
        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    let _ = child.start_kill();
                    child.wait().await
                }
            };

            // A signal-terminated process has no code; record -1.
            let code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    tracing::error!("failed to wait for worker: {e}");
                    -1
                }
            };
            tracing::debug!(code, "worker exited");

            let _ = exit_tx.send(Some(code));

            if let Some(connection) = connection {
                connection.close().await;
            }
        });

        Self {
            exit_rx,
            kill_tx: Mutex::new(Some(kill_tx)),
        }
    }

    /// Exit code observed so far; `None` while the worker is running.
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_rx.borrow()
    }

    /// A watch channel that flips from `None` to `Some(code)` on exit.
    pub fn exited(&self) -> watch::Receiver<Option<i32>> {
        self.exit_rx.clone()
    }

    /// Requests termination of the worker process. Idempotent.
    pub fn request_kill(&self) {
        if let Some(tx) = self.kill_tx.lock().take() {
            let _ = tx.send(());
        }
    }

    /// Waits for the worker to exit, returning its exit code.
    pub async fn wait(&self) -> i32 {
        let mut rx = self.exit_rx.clone();
        loop {
            if let Some(code) = *rx.borrow_and_update() {
                return code;
            }
            if rx.changed().await.is_err() {
                return -1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parent_pid_only() {
        let args = build_worker_args(1234, &Settings::default());
        assert_eq!(args, vec!["--parentProcessId=1234".to_string()]);
    }

    #[test]
    fn test_args_cache_path_ordering() {
        let settings = Settings {
            cache_path: Some(PathBuf::from("/tmp/c")),
            root_cache_path: None,
            additional_args: vec![],
        };

        let args = build_worker_args(42, &settings);
        assert_eq!(args[0], "--parentProcessId=42");
        assert_eq!(args[1], "--cachePath=/tmp/c");
        assert!(!args.iter().any(|a| a.starts_with("--rootCachePath")));
    }

    #[test]
    fn test_args_full_ordering() {
        let settings = Settings {
            cache_path: Some(PathBuf::from("/tmp/c")),
            root_cache_path: Some(PathBuf::from("/tmp/r")),
            additional_args: vec!["--disable-gpu".to_string(), "--lang=en".to_string()],
        };

        let args = build_worker_args(7, &settings);
        assert_eq!(
            args,
            vec![
                "--parentProcessId=7".to_string(),
                "--cachePath=/tmp/c".to_string(),
                "--rootCachePath=/tmp/r".to_string(),
                "--disable-gpu".to_string(),
                "--lang=en".to_string(),
            ]
        );
    }

    #[test]
    fn test_launch_empty_path() {
        let result = WorkerProcess::launch(Path::new(""), &Settings::default());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_launch_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-worker");

        let result = WorkerProcess::launch(&missing, &Settings::default());
        assert!(matches!(result, Err(Error::ExecutableNotFound(p)) if p == missing));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_supervisor_kill_and_exit_code() {
        // /bin/cat blocks on stdin, so it stays alive until killed.
        let mut worker =
            WorkerProcess::launch(Path::new("/bin/cat"), &Settings::default()).unwrap();
        assert!(worker.id().is_some());
        let _stdio = worker.take_stdio().unwrap();

        let supervisor = worker.into_supervisor(None);
        assert_eq!(supervisor.exit_code(), None);

        supervisor.request_kill();
        let code = supervisor.wait().await;
        // Killed by signal on unix.
        assert_eq!(code, -1);
        assert_eq!(supervisor.exit_code(), Some(code));
    }
}
