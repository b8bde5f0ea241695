//! CLI module - Command-line interface for strmarr
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// strmarr - keeps stream pointer files in sync with Sonarr and Radarr
#[derive(Parser)]
#[command(name = "strmarr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler and HTTP server until Ctrl+C
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Run one full series sweep
    #[command(alias = "full-sweep")]
    Sweep {
        /// Include unmonitored series
        #[arg(long)]
        all: bool,
    },

    /// Run one wanted/missing sweep (episodes and movies)
    #[command(alias = "w", alias = "missing")]
    Wanted,

    /// Probe a single stream URL
    CheckLink {
        /// URL to probe
        url: String,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create the default config file if it does not exist
    #[command(alias = "--init")]
    Init,
    /// Print the effective config with secrets masked
    Show,
}

pub use commands::*;
