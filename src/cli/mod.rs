pub mod decode;
pub mod devices;

#[cfg(test)]
mod decode_test;

use std::error::Error;

use clap::{Parser, Subcommand};

use self::{decode::handle_decode, devices::handle_devices};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the driver daemon (default)
    Run,
    /// List connected gamepads that the driver supports
    Devices,
    /// Decode a raw input packet and show what would be reported
    Decode {
        /// Packet bytes as hex, e.g. "0000100080800000..."
        packet: String,
    },
}

pub async fn main_cli(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(cmd) = args.cmd else {
        return Ok(());
    };

    match cmd {
        Commands::Run => (),
        Commands::Devices => handle_devices()?,
        Commands::Decode { packet } => handle_decode(packet.as_str())?,
    }

    Ok(())
}
