//! lazyseg CLI
//!
//! Command-line workloads for lazyseg containers.
//!
//! # Commands
//!
//! - `list` - Fill, read and thin out a segmented list
//! - `map` - Fill, read and thin out a segmented map
//! - `compact` - Rewrite a file store keeping only live payloads

mod commands;

use clap::{Parser, Subcommand};
use commands::{StoreTarget, WorkloadArgs};
use tracing_subscriber::EnvFilter;

/// lazyseg command-line tools.
#[derive(Parser)]
#[command(name = "lazyseg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Payload store: a directory path, or `memory`
    #[arg(global = true, short, long, default_value = "memory")]
    store: StoreTarget,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workload against a segmented list
    List(WorkloadArgs),

    /// Run a workload against a segmented map with string keys
    Map(WorkloadArgs),

    /// Rewrite a file store keeping only live payloads
    Compact {
        /// Show what would be reclaimed without rewriting
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::List(args) => commands::list::run(&cli.store, &args)?,
        Commands::Map(args) => commands::map::run(&cli.store, &args)?,
        Commands::Compact { dry_run } => {
            let StoreTarget::Directory(path) = &cli.store else {
                return Err("compact needs a store directory".into());
            };
            commands::compact::run(path, dry_run)?;
        }
        Commands::Version => {
            println!("lazyseg CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("lazyseg Core v{}", lazyseg_core::VERSION);
        }
    }

    Ok(())
}
