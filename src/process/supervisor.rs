//! Tokio-backed process supervisor.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt as _;
use tokio::process::Command;
use tokio::sync::watch;

use super::control::{force_kill, graceful_signal, group_alive};
use super::{
    wait_for_exit, ExitReport, ExitWatch, ProcessControl, ProcessSupervisor, SpawnedProcess,
    GRACEFUL_SHUTDOWN_TIMEOUT,
};

const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);
use crate::args::CommandLine;
use crate::error::{AppError, Result};

/// Spawns commands with piped output in their own process group.
#[derive(Debug, Clone)]
pub struct CommandSupervisor {
    current_dir: Option<PathBuf>,
    shutdown_timeout: Duration,
}

impl CommandSupervisor {
    pub fn new() -> Self {
        Self {
            current_dir: None,
            shutdown_timeout: GRACEFUL_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for CommandSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor for CommandSupervisor {
    fn spawn(&self, command: &CommandLine) -> Result<SpawnedProcess> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::spawn(&command.program, e.to_string()))?;

        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::process("Failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::process("Failed to capture stderr"))?;

        let (exit_tx, exit_rx) = watch::channel(None);
        let program = command.program.clone();

        // Wait for child process in background
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    log::warn!("Failed to wait for {} (pid: {:?}): {}", program, pid, e);
                    None
                }
            };
            log::info!("{} (pid: {:?}) exited with {:?}", program, pid, code);
            exit_tx.send_replace(Some(ExitReport { code }));
        });

        Ok(SpawnedProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            control: Box::new(ChildControl {
                pid,
                exited: exit_rx,
                shutdown_timeout: self.shutdown_timeout,
            }),
        })
    }
}

struct ChildControl {
    pid: Option<u32>,
    exited: ExitWatch,
    shutdown_timeout: Duration,
}

impl ChildControl {
    /// Wait for the leader's exit and for the rest of its process group to
    /// go away. Returns `false` on timeout.
    async fn wait_for_group(&self, pid: u32) -> bool {
        let mut exited = self.exited.clone();
        let drained = async {
            wait_for_exit(&mut exited).await;
            while group_alive(pid) {
                tokio::time::sleep(GROUP_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(self.shutdown_timeout, drained)
            .await
            .is_ok()
    }

    /// SIGTERM the whole group, SIGKILL it after the grace period. Runs even
    /// when the leader has already exited, so leftover children are reaped.
    async fn terminate(&self) -> Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        if !group_alive(pid) {
            return Ok(());
        }

        if let Err(e) = graceful_signal(pid) {
            log::warn!("Graceful signal failed for PID {pid}: {e}, will force kill immediately");
            force_kill(pid)?;
        }

        if self.wait_for_group(pid).await {
            return Ok(());
        }

        log::warn!(
            "Process group {pid} did not exit within {}s, force killing",
            self.shutdown_timeout.as_secs()
        );
        if let Err(e) = force_kill(pid) {
            log::error!("Failed to force kill process group {pid}: {e}");
        }

        let mut exited = self.exited.clone();
        tokio::time::timeout(self.shutdown_timeout, wait_for_exit(&mut exited))
            .await
            .map(|_| ())
            .map_err(|_| AppError::process(format!("PID {pid} did not exit after SIGKILL")))
    }
}

impl ProcessControl for ChildControl {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn exit_watch(&self) -> ExitWatch {
        self.exited.clone()
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<()>> {
        self.terminate().boxed()
    }

    fn kill_now(&self) {
        let Some(pid) = self.pid else {
            return;
        };
        if !group_alive(pid) {
            return;
        }
        if let Err(e) = force_kill(pid) {
            log::warn!("Failed to kill process group {pid}: {e}");
        }
    }
}
