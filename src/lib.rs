pub mod args;
pub mod cli;
pub mod config;
mod error;
pub mod hooks;
pub mod instance;
pub mod logging;
pub mod paths;
pub mod pool;
pub mod process;
pub mod validation;
pub mod watcher;

pub use error::{AppError, ErrorKind, Result};
pub use instance::{
    wrangler_dev, DevServerInstance, Instance, InstanceFactory, InstanceStatus, StartOptions,
};
pub use pool::PoolClient;
