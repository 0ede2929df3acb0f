//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_SAMPLE_PATH: &str = "config.example.toml";

/// Morphlink - a link shortener with a switchable service topology
#[derive(Parser, Debug)]
#[command(name = "morphlink")]
#[command(version)]
#[command(about = "A link shortener whose services run embedded or across the network", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,
    },
}
