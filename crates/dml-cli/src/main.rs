use dml_core::logging;

mod cli;
mod discord;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("dml error: {:#}", err);
        std::process::exit(1);
    }
}
