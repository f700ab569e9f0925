//! Command-line interface for the squares server.

use clap::{Parser, Subcommand};

/// Squares pool server
#[derive(Parser, Debug)]
#[command(name = "squares")]
#[command(about = "Squares pool server with a JSON API", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Path to the TOML config file (defaults apply if it doesn't exist)
        #[arg(short, long, default_value = "squares.toml")]
        config: std::path::PathBuf,

        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create or upgrade the database schema and exit
    Migrate {
        /// Path to the database file (created if it doesn't exist)
        #[arg(long, default_value = "squares.db")]
        database_path: String,
    },
}
