use std::env;
use std::error::Error;

use clap::Parser;

use crate::cli::{main_cli, Args, Commands};
use crate::config::Config;
use crate::constants::VERSION;
use crate::input::manager::{Command, Manager};

mod cli;
mod config;
mod constants;
mod drivers;
mod input;
mod transport;
mod udev;
mod watcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let log_level = match env::var("LOG_LEVEL") {
        Ok(value) => value,
        Err(_) => "info".to_string(),
    };
    env::set_var("RUST_LOG", log_level);
    env_logger::init();

    let args = Args::parse();
    match args.cmd {
        None | Some(Commands::Run) => run().await,
        Some(_) => main_cli(args).await,
    }
}

/// Run the driver until interrupted
async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    log::info!("Starting 8bd-u2cw v{}", VERSION);

    let config = Config::load()?;
    log::debug!("Using config: {config:?}");

    let mut manager = Manager::new(config);

    // Setup CTRL+C handler
    let tx = manager.transmitter();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Unable to listen for shutdown signal: {e}");
            return;
        }
        log::info!("Shutting down");
        if let Err(e) = tx.send(Command::Stop).await {
            log::error!("Unable to stop manager: {e}");
        }
    });

    if let Err(e) = manager.run().await {
        log::error!("Error running the manager: {e}");
        return Err(e);
    }

    log::info!("8bd-u2cw stopped");

    Ok(())
}
