//! scriptmap CLI - shell-script dependency analysis from the command line.
//!
//! scriptmap indexes `.ksh`/`.sh` scripts and `.ctl` control files into
//! `SQLite` and provides fast forward/backward dependency queries and
//! stored-procedure search.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// scriptmap: static dependency analyzer for ksh/sh script estates.
#[derive(Parser)]
#[command(name = "scriptmap")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Script root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the script and control-file trees and rebuild the index
    Analyze {
        /// Control-file root directory (defaults to the script root)
        #[arg(long)]
        ctl_root: Option<PathBuf>,

        /// Delete vanished files from the index instead of marking them stale
        #[arg(long)]
        prune: bool,
    },

    /// Search stored-procedure calls by case-insensitive substring
    Search {
        /// Substring of the qualified procedure name
        needle: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show everything a script calls (forward dependencies)
    Forward {
        /// Script basename, e.g. "nightly_load.ksh"
        script: String,
    },

    /// Show everything that calls a target (backward dependencies)
    Backward {
        /// Basename of a script or control file, or qualified procedure name
        name: String,

        /// Target kind: script, control_file, or procedure
        #[arg(short, long, default_value = "script")]
        kind: String,
    },

    /// Write the portable JSON serialization of the graph
    Export {
        /// Output file path
        destination: PathBuf,
    },

    /// List distinct stored procedures with call-site counts
    Procedures,

    /// Show index statistics
    Stats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Determine the script root
    let root = match cli.root {
        Some(r) => r,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!(
                    "{}: failed to get current directory: {e}",
                    "error".red().bold()
                );
                return ExitCode::from(3);
            }
        },
    };

    let result = match cli.command {
        Commands::Analyze { ctl_root, prune } => {
            cli::analyze::run(&root, ctl_root.as_deref(), prune)
        }
        Commands::Search { needle, limit } => cli::search::run(&root, &needle, limit),
        Commands::Forward { script } => cli::forward::run(&root, &script),
        Commands::Backward { name, kind } => cli::backward::run(&root, &name, &kind),
        Commands::Export { destination } => cli::export::run(&root, &destination),
        Commands::Procedures => cli::procedures::run(&root),
        Commands::Stats => cli::stats::run(&root),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {}: {cause}", "caused by".dimmed());
                source = cause.source();
            }
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Map library errors onto the documented exit codes.
fn exit_code_for(e: &scriptmap::Error) -> u8 {
    match e {
        scriptmap::Error::Config(_) => 2,
        scriptmap::Error::InputNotFound(_) | scriptmap::Error::Io(_) => 3,
        scriptmap::Error::Store(_) | scriptmap::Error::Internal(_) => 4,
        scriptmap::Error::StoreIncompatible { .. } => 5,
        scriptmap::Error::Cancelled => 130,
    }
}
