//! Instance lifecycle management (start/stop/restart).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::types::{InstanceSnapshot, InstanceStatus, StartOptions};
use crate::args::build_command;
use crate::config::{DevOptions, LauncherConfig};
use crate::error::{AppError, Result};
use crate::hooks::{placeholders, run_hooks, HookMode, Placeholders};
use crate::process::{wait_for_exit, ExitWatch, ProcessControl, ProcessSupervisor};
use crate::watcher::{
    watch_stderr, watch_stdout, ContainsText, MessageBuffer, Readiness, ReadinessLatch,
    ReadinessPredicate, StreamContext,
};

pub const INSTANCE_NAME: &str = "wrangler";

/// How long output pumps may keep draining after the process exits before
/// an early exit is reported.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

struct RunningProcess {
    control: Box<dyn ProcessControl>,
    exited: ExitWatch,
    monitor: JoinHandle<()>,
}

impl RunningProcess {
    fn has_exited(&self) -> bool {
        self.exited.borrow().is_some()
    }
}

/// One managed dev server process.
pub struct DevServerInstance<S> {
    name: String,
    host: String,
    /// Last assigned port; replaced by every `start`.
    port: u16,
    status: InstanceStatus,
    binary: String,
    options: DevOptions,
    on_ready: Vec<String>,
    on_stop: Vec<String>,
    verbose: bool,
    messages: MessageBuffer,
    predicate: Arc<dyn ReadinessPredicate>,
    supervisor: S,
    running: Option<RunningProcess>,
}

impl<S: ProcessSupervisor> DevServerInstance<S> {
    pub fn new(config: &LauncherConfig, supervisor: S) -> Self {
        Self {
            name: INSTANCE_NAME.to_string(),
            host: config.dev.effective_host().to_string(),
            port: config.dev.effective_port(),
            status: InstanceStatus::Idle,
            binary: config.binary.clone(),
            options: config.dev.clone(),
            on_ready: config.on_ready_commands.clone(),
            on_stop: config.on_stop_commands.clone(),
            verbose: config.verbose,
            messages: MessageBuffer::new(config.message_buffer),
            predicate: Arc::new(ContainsText::ready_on()),
            supervisor,
            running: None,
        }
    }

    /// Replace the default `"Ready on"` readiness check.
    pub fn with_predicate(mut self, predicate: impl ReadinessPredicate + 'static) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Current status. A started (or half-stopped) instance whose process
    /// has since died reports `Stopped`.
    pub fn status(&self) -> InstanceStatus {
        match &self.running {
            Some(running)
                if matches!(
                    self.status,
                    InstanceStatus::Started | InstanceStatus::Stopping
                ) && running.has_exited() =>
            {
                InstanceStatus::Stopped
            }
            _ => self.status,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.running.as_ref().and_then(|r| r.control.pid())
    }

    /// Recent ANSI-stripped output lines, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.get()
    }

    pub fn clear_messages(&self) {
        self.messages.clear();
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            status: self.status(),
            pid: self.pid(),
        }
    }

    fn placeholders(&self) -> Placeholders {
        placeholders(&self.name, &self.host, self.port)
    }

    /// Start the dev server and resolve once it reports readiness and the
    /// on-ready hooks have succeeded.
    pub async fn start(&mut self, options: StartOptions) -> Result<()> {
        self.reap_crashed();
        if !self.status.can_start() || self.running.is_some() {
            return Err(AppError::instance_running(&self.name));
        }

        self.port = options.port.unwrap_or(self.port);
        self.status = InstanceStatus::Starting;

        match self.launch().await {
            Ok(()) => {
                self.status = InstanceStatus::Started;
                log::info!(
                    "Instance {} started (pid: {:?}, port: {})",
                    self.name,
                    self.pid(),
                    self.port
                );
                Ok(())
            }
            Err(e) => {
                log::error!("Instance {} failed to start: {}", self.name, e);
                self.abort_launch().await;
                self.status = InstanceStatus::Stopped;
                Err(e)
            }
        }
    }

    async fn launch(&mut self) -> Result<()> {
        let options = self.options.with_port(self.port);
        let command = build_command(&self.binary, &options)?;
        log::info!("Starting instance {}: {}", self.name, command);

        let spawned = self.supervisor.spawn(&command)?;
        let (latch, ready) = ReadinessLatch::new();
        let ctx = StreamContext {
            name: self.name.clone(),
            verbose: self.verbose,
            messages: self.messages.clone(),
            latch: latch.clone(),
        };

        let stdout_task = tokio::spawn(watch_stdout(
            spawned.stdout,
            Arc::clone(&self.predicate),
            ctx.clone(),
        ));
        let stderr_task = tokio::spawn(watch_stderr(spawned.stderr, ctx));

        let mut exited = spawned.control.exit_watch();
        let name = self.name.clone();
        let monitor = tokio::spawn(async move {
            let Some(report) = wait_for_exit(&mut exited).await else {
                return;
            };
            let drained = async {
                let _ = stdout_task.await;
                let _ = stderr_task.await;
            };
            let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, drained).await;
            if latch.resolve(Readiness::Exited(report.code)) {
                log::warn!("Instance {} exited before it was ready", name);
            } else {
                log::info!("Instance {} process exited ({:?})", name, report.code);
            }
        });

        self.running = Some(RunningProcess {
            exited: spawned.control.exit_watch(),
            control: spawned.control,
            monitor,
        });

        match ready.await.unwrap_or(Readiness::Exited(None)) {
            Readiness::Ready => {}
            Readiness::Failed(stderr) => return Err(AppError::startup_output(stderr)),
            Readiness::Exited(code) => return Err(AppError::early_exit(code)),
        }

        log::debug!("Instance {} is ready on port {}", self.name, self.port);
        run_hooks(&self.on_ready, &self.placeholders(), HookMode::Strict).await
    }

    /// Forget a process that died after it was ready.
    fn reap_crashed(&mut self) {
        if self.status() != InstanceStatus::Stopped {
            return;
        }
        if let Some(running) = self.running.take() {
            log::warn!("Instance {} exited while running", self.name);
            running.monitor.abort();
            running.control.kill_now();
            self.status = InstanceStatus::Stopped;
        }
    }

    /// Tear down a process whose start failed. No hooks run.
    async fn abort_launch(&mut self) {
        if let Some(mut running) = self.running.take() {
            if let Err(e) = running.control.stop().await {
                log::warn!("Failed to stop instance {} after failed start: {}", self.name, e);
                running.control.kill_now();
            }
            running.monitor.abort();
        }
    }

    /// Run the on-stop hooks (failures ignored) and terminate the process.
    /// Does nothing when no process is running. A start that was abandoned
    /// before it finished is torn down without hooks. If termination fails
    /// the process handle is kept so `stop` can be retried.
    pub async fn stop(&mut self) -> Result<()> {
        if self.running.is_none() {
            log::debug!("Instance {} is not running", self.name);
            return Ok(());
        }

        let abandoned_start = self.status == InstanceStatus::Starting;
        if self.status != InstanceStatus::Restarting {
            self.status = InstanceStatus::Stopping;
        }

        if abandoned_start {
            log::info!("Instance {} was still starting, skipping on-stop hooks", self.name);
        } else if let Err(e) =
            run_hooks(&self.on_stop, &self.placeholders(), HookMode::BestEffort).await
        {
            log::warn!("On-stop hooks for {} failed: {}", self.name, e);
        }

        let Some(running) = self.running.as_mut() else {
            return Ok(());
        };
        if let Err(e) = running.control.stop().await {
            log::error!("Instance {} did not stop cleanly: {}", self.name, e);
            return Err(e);
        }

        if let Some(running) = self.running.take() {
            running.monitor.abort();
        }
        self.status = InstanceStatus::Stopped;
        log::info!("Instance {} stopped", self.name);
        Ok(())
    }

    /// Stop, then start again on the last assigned port.
    pub async fn restart(&mut self) -> Result<()> {
        log::info!("Restarting instance {}", self.name);
        self.status = InstanceStatus::Restarting;
        self.stop().await?;
        self.start(StartOptions::port(self.port)).await
    }
}

impl<S> Drop for DevServerInstance<S> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            log::warn!("Instance {} dropped while running, killing it", self.name);
            running.control.kill_now();
            running.monitor.abort();
        }
    }
}
