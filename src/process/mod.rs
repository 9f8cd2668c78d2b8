//! Process supervision for the dev server.
//!
//! The lifecycle adapter only sees [`ProcessSupervisor`] and
//! [`ProcessControl`]; [`CommandSupervisor`] is the tokio-backed default.

mod control;
mod supervisor;

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::AsyncRead;
use tokio::sync::watch;

use crate::args::CommandLine;
use crate::error::Result;

pub use control::{force_kill, graceful_signal, group_alive, is_process_alive};
pub use supervisor::CommandSupervisor;

/// Timeout for graceful shutdown before force killing.
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Published once when the process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

pub type ExitWatch = watch::Receiver<Option<ExitReport>>;

/// A freshly spawned process: its output streams plus a control handle.
pub struct SpawnedProcess {
    pub stdout: OutputStream,
    pub stderr: OutputStream,
    pub control: Box<dyn ProcessControl>,
}

pub trait ProcessControl: Send + Sync {
    fn pid(&self) -> Option<u32>;

    /// Receiver that holds `Some` once the process has exited.
    fn exit_watch(&self) -> ExitWatch;

    /// Terminate the process and resolve once its exit has been observed.
    fn stop(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Kill immediately without waiting. Used when an instance is dropped
    /// while its process is still running.
    fn kill_now(&self);
}

pub trait ProcessSupervisor: Send + Sync {
    fn spawn(&self, command: &CommandLine) -> Result<SpawnedProcess>;
}

/// Wait until `exited` reports an exit. Returns `None` if the sender went
/// away without reporting one.
pub async fn wait_for_exit(exited: &mut ExitWatch) -> Option<ExitReport> {
    match exited.wait_for(Option::is_some).await {
        Ok(report) => *report,
        Err(_) => None,
    }
}
