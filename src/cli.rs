//! Command-line interface.

use crate::config::PartialConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "agency")]
#[command(about = "Upload an agency's bets to the lottery aggregator and fetch its winners", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Agency id (0-255)
    #[arg(long, env = "CLI_ID")]
    pub id: Option<String>,

    /// Aggregator address as host:port
    #[arg(long, env = "CLI_SERVER_ADDRESS")]
    pub server_address: Option<String>,

    /// Maximum bets per batch
    #[arg(long, env = "CLI_MAX_BATCH_AMOUNT")]
    pub max_batch_amount: Option<usize>,

    /// CSV file with one bet per line: first,last,document,birthdate,number
    #[arg(long, env = "CLI_BETS_FILE")]
    pub bets_file: Option<PathBuf>,

    /// Seconds to wait for the connection
    #[arg(long, env = "CLI_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, env = "CLI_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// TOML file with any of the settings above
    #[arg(long, short = 'c', env = "CLI_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// The flags as a configuration layer.
    pub fn overrides(&self) -> PartialConfig {
        PartialConfig {
            id: self.id.clone(),
            server_address: self.server_address.clone(),
            max_batch_amount: self.max_batch_amount,
            bets_file: self.bets_file.clone(),
            connect_timeout_secs: self.connect_timeout,
            log_level: self.log_level.clone(),
        }
    }
}
