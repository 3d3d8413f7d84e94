//! realmkit CLI
//!
//! Command-line tools for file-backed realmkit stores.
//!
//! # Commands
//!
//! - `inspect` - Show classes, record counts and commit log statistics
//! - `dump` - Print records as JSON lines
//! - `query` - Run a predicate against a class
//! - `compact` - Rewrite the commit log as a single snapshot
//! - `dump-log` - List commit log records for debugging

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// realmkit command-line store tools.
#[derive(Parser)]
#[command(name = "realmkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show classes, record counts and commit log statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print records as JSON lines
    Dump {
        /// Only dump this class
        #[arg(short, long)]
        class: Option<String>,
    },

    /// Run a predicate against a class
    Query {
        /// Class to query
        #[arg(short, long)]
        class: String,

        /// Predicate terms as JSON, e.g. '[["greaterThan","age",20]]'
        #[arg(long)]
        predicate: Option<String>,
    },

    /// Rewrite the commit log as a single snapshot
    Compact,

    /// List commit log records for debugging
    DumpLog {
        /// Maximum number of records to list
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Dump { class } => {
            let path = cli.path.ok_or("Store path required for dump")?;
            commands::dump::run(&path, class.as_deref())?;
        }
        Commands::Query { class, predicate } => {
            let path = cli.path.ok_or("Store path required for query")?;
            commands::query::run(&path, &class, predicate.as_deref())?;
        }
        Commands::Compact => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path)?;
        }
        Commands::DumpLog { limit, format } => {
            let path = cli.path.ok_or("Store path required for dump-log")?;
            commands::dump_log::run(&path, limit, &format)?;
        }
        Commands::Version => {
            println!("realmkit CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("realmkit core v{}", realmkit_core::VERSION);
        }
    }

    Ok(())
}
