//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inactivity watchdog for dashboard views.
///
/// Sends idle users back to a dashboard's home view after a configurable
/// timeout.
#[derive(Debug, Parser)]
#[command(name = "vt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate a dashboard configuration and show the resolved timeout settings.
    Check {
        /// Dashboard configuration file (JSON).
        path: PathBuf,

        /// User name to evaluate the allow-list against.
        #[arg(long)]
        user: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Replay a scripted scenario in virtual time and list the redirects.
    Simulate {
        /// Scenario file (JSON).
        path: PathBuf,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the watchdog live against a host state file.
    ///
    /// The state file is re-read every tick and redirects are written back
    /// to it. Type `click` or `move` on stdin to signal activity.
    Watch {
        /// Host state file (JSON).
        state: PathBuf,
    },
}
