// CLI module for handling command-line interface

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "plugin-gateway")]
#[command(about = "Marketplace search and install gateway for hosted Minecraft servers")]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8480")]
    pub bind: String,

    /// SQLite database holding Polymart account links.
    #[arg(long, default_value = "polymart-links.db")]
    pub database: PathBuf,
}
