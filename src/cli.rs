//! Command-line entry points.

use std::future::Future;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::args::build_command;
use crate::config::{load_config, LauncherConfig};
use crate::error::Result;
use crate::instance::{wrangler_dev, Instance, StartOptions};
use crate::paths::resolve_config_path;
use crate::pool::PoolClient;

#[derive(Parser, Debug)]
#[command(
    name = "wrangler-dev-launcher",
    version,
    about = "Run a local worker dev server and restart pool slots",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Path to the launcher config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Log dev server output and enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Start the dev server, wait for Ctrl-C, then stop it.
    Run {
        /// Port to run the dev server on.
        #[arg(long)]
        port: Option<u16>,
        /// Command used to launch the dev server.
        #[arg(long)]
        binary: Option<String>,
    },
    /// Print the command line that `run` would execute.
    Args {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Restart a pool slot through the pool server.
    Restart {
        /// Pool server base URL, e.g. http://127.0.0.1.
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        pool_id: Option<u32>,
    },
}

fn load(cli: &Cli) -> Result<LauncherConfig> {
    let cwd = std::env::current_dir()?;
    let path = resolve_config_path(cli.config.as_deref(), &cwd);
    let mut config = load_config(&path)?;
    if cli.verbose {
        config.verbose = true;
    }
    Ok(config)
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load(&cli)?;

    match cli.command {
        CliCommand::Run { port, binary } => {
            if let Some(binary) = binary {
                crate::validation::validate_binary(&binary)?;
                config.binary = binary;
            }
            run_instance(config, port).await
        }
        CliCommand::Args { port } => {
            let options = match port {
                Some(port) => config.dev.with_port(port),
                None => config.dev.clone(),
            };
            println!("{}", build_command(&config.binary, &options)?);
            Ok(())
        }
        CliCommand::Restart {
            host,
            port,
            pool_id,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(pool_id) = pool_id {
                config.server.pool_id = pool_id;
            }
            PoolClient::new(&config.server)?.restart().await
        }
    }
}

async fn run_instance(config: LauncherConfig, port: Option<u16>) -> Result<()> {
    let factory = wrangler_dev(config);
    let mut instance = factory(StartOptions { port });

    serve_until(instance.as_mut(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await
}

/// Start `instance` and keep it running until `shutdown` completes, then
/// stop it. A shutdown that arrives while the instance is still starting
/// stops it too, so the dev server never outlives the launcher.
async fn serve_until<F>(instance: &mut dyn Instance, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    tokio::select! {
        started = instance.start(StartOptions::default()) => started?,
        () = &mut shutdown => {
            log::info!("Interrupted before the dev server was ready, shutting down...");
            return instance.stop().await;
        }
    }

    log::info!(
        "Dev server ready at {}:{}, press Ctrl-C to stop",
        instance.host(),
        instance.port()
    );

    shutdown.await;
    log::info!("Shutting down...");
    instance.stop().await
}
