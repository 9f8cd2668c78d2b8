use std::process::ExitCode;

use clap::Parser as _;

use wrangler_dev_launcher::cli::{self, Cli};
use wrangler_dev_launcher::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
