//! Command-line interface definitions using clap

#[cfg(feature = "cli")]
pub mod commands;

use clap::{Parser, Subcommand};

/// GeoTrace - IP intelligence and visitor tracking service
#[derive(Parser, Debug)]
#[command(name = "geotrace")]
#[command(version)]
#[command(about = "IP intelligence and visitor tracking service", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Geolocate and score IP addresses without storing the result
    Analyze {
        /// IP addresses (IPv4 / IPv6, optionally with port)
        #[arg(required = true, num_args = 1..)]
        ips: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
