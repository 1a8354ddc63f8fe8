//! Plymesh Application
//!
//! Command line inspector for PLY files: prints the header schema or the
//! decoded mesh summary.

mod app;

use app::{InspectConfig, LoggingConfig};
use clap::Parser;
use std::path::PathBuf;

/// Plymesh - PLY mesh inspector
#[derive(Parser, Debug)]
#[command(name = "plymesh")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to PLY file to load
    #[arg(short, long)]
    file: PathBuf,

    /// JSON file replacing the default vertex semantic table
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Generate vertex normals when the file has faces but no normals
    #[arg(long)]
    compute_normals: bool,

    /// Only print the header
    #[arg(long)]
    header_only: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    app::init_logging(&LoggingConfig {
        level: args.log_level,
    });

    let config = InspectConfig {
        file: args.file,
        registry: args.registry,
        compute_normals: args.compute_normals,
        header_only: args.header_only,
    };

    if let Err(e) = app::run(&config) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
