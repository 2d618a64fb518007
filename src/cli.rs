use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "block-enricher",
    version,
    about = "Follows the chain head and logs one enriched MEV record per block"
)]
pub struct Cli {
    /// Specify the config file path (default: ./config.yaml)
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start the tracker and enricher (default)
    Run,
    /// Load and validate the config, then exit
    CheckConfig,
}
