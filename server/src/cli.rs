use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(about = "Weatherlog CLI.")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server, plus the ingestion scheduler when enabled.
    Http {
        #[arg(env = "WEATHERLOG_SERVER_ADDRESS", default_value = "127.0.0.1:8000")]
        address: std::net::SocketAddr,
    },
    /// Run one fetch+save cycle and print the stored reading.
    Fetch {
        /// Latitude; defaults to the configured location (0 counts as unset).
        #[arg(long)]
        lat: Option<f64>,
        /// Longitude; defaults to the configured location (0 counts as unset).
        #[arg(long)]
        lon: Option<f64>,
    },
    Db(DbCommand),
}

#[derive(Debug, Parser)]
pub struct DbCommand {
    #[command(subcommand)]
    pub cmd: DbSubCommand,
}

#[derive(Debug, Subcommand)]
pub enum DbSubCommand {
    /// Delete all stored readings.
    Reset,
}
