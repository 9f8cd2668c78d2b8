//! Dev server instances.
//!
//! [`Instance`] is the contract a pool manager drives; [`DevServerInstance`]
//! implements it on top of a [`ProcessSupervisor`].

mod lifecycle;
mod types;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt as _;

use crate::config::LauncherConfig;
use crate::error::Result;
use crate::process::{CommandSupervisor, ProcessSupervisor};

pub use lifecycle::{DevServerInstance, INSTANCE_NAME};
pub use types::{InstanceSnapshot, InstanceStatus, StartOptions};

pub trait Instance: Send {
    fn name(&self) -> &str;
    fn host(&self) -> &str;
    fn port(&self) -> u16;
    fn status(&self) -> InstanceStatus;

    /// Resolves once the instance is ready to serve traffic.
    fn start(&mut self, options: StartOptions) -> BoxFuture<'_, Result<()>>;

    fn stop(&mut self) -> BoxFuture<'_, Result<()>>;

    /// `stop` followed by `start` on the last assigned port.
    fn restart(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            self.stop().await?;
            let port = self.port();
            self.start(StartOptions::port(port)).await
        }
        .boxed()
    }
}

/// Builds one instance per pool slot.
pub type InstanceFactory = Arc<dyn Fn(StartOptions) -> Box<dyn Instance> + Send + Sync>;

impl<S> Instance for DevServerInstance<S>
where
    S: ProcessSupervisor + 'static,
{
    fn name(&self) -> &str {
        DevServerInstance::name(self)
    }

    fn host(&self) -> &str {
        DevServerInstance::host(self)
    }

    fn port(&self) -> u16 {
        DevServerInstance::port(self)
    }

    fn status(&self) -> InstanceStatus {
        DevServerInstance::status(self)
    }

    fn start(&mut self, options: StartOptions) -> BoxFuture<'_, Result<()>> {
        DevServerInstance::start(self, options).boxed()
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<()>> {
        DevServerInstance::stop(self).boxed()
    }

    fn restart(&mut self) -> BoxFuture<'_, Result<()>> {
        DevServerInstance::restart(self).boxed()
    }
}

/// Factory for `wrangler dev` instances backed by real processes. The
/// options' port, when given, replaces the configured one.
pub fn wrangler_dev(config: LauncherConfig) -> InstanceFactory {
    Arc::new(move |options: StartOptions| {
        let mut config = config.clone();
        if let Some(port) = options.port {
            config.dev.port = Some(port);
        }
        Box::new(DevServerInstance::new(&config, CommandSupervisor::new())) as Box<dyn Instance>
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn factory_applies_port_and_defaults() {
        let factory = wrangler_dev(LauncherConfig::default());

        let default = factory(StartOptions::default());
        assert_eq!(default.name(), "wrangler");
        assert_eq!(default.host(), "localhost");
        assert_eq!(default.port(), 8787);
        assert_eq!(default.status(), InstanceStatus::Idle);

        let slot = factory(StartOptions::port(8790));
        assert_eq!(slot.port(), 8790);
    }

    #[tokio::test]
    async fn stopping_idle_instance_is_a_no_op() {
        let factory = wrangler_dev(LauncherConfig::default());
        let mut instance = factory(StartOptions::default());

        instance.stop().await.unwrap();
        assert_eq!(instance.status(), InstanceStatus::Idle);
    }
}
