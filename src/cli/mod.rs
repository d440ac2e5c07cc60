//! Command-line interface for the scanner collaborator.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Static pattern-based code-risk scanner.
#[derive(Parser, Debug)]
#[command(name = "veilscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (cli, json)
    #[arg(short = 'f', long, global = true, default_value = "cli")]
    pub format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a file or directory
    Scan {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Allowlist file (TOML)
        #[arg(short, long)]
        allowlist: Option<PathBuf>,

        /// Maximum decoding depth
        #[arg(long, default_value = "3")]
        max_depth: usize,

        /// Maximum decoded variants per unit
        #[arg(long, default_value = "50")]
        max_variants: usize,

        /// Exit with code 1 if any unit scores at or above this value
        #[arg(long)]
        fail_on_score: Option<f64>,
    },

    /// Show information about the loaded rules
    Rules {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a string and show the resulting variants
    Decode {
        /// The encoded string to expand
        input: String,

        /// Maximum decode depth
        #[arg(short, long, default_value = "3")]
        depth: usize,
    },
}
