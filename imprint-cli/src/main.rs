//! Imprint CLI - image fingerprinting and misuse detection tool.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error
  65  Data error (file is not a decodable image, bad manifest)
  66  Input file or dataset not found
  69  Service unavailable (classifier, download)
  74  I/O or fingerprint store error";

#[derive(Parser)]
#[command(name = "imprint")]
#[command(author, version, about = "Image fingerprinting and misuse detection", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress decorated output (results are still printed)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Fingerprint store location.
#[derive(Args, Clone)]
pub struct StoreArgs {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:imprint.db")]
    pub database: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the content digest and perceptual hash of image files
    Fingerprint {
        /// Images to fingerprint
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Emit JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Find exact copies of an image in a dataset directory
    Search {
        /// Image to look for
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Reference dataset directory
        #[arg(short, long, env = "DATASET_DIR", default_value = "dataset")]
        dataset: PathBuf,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Print the match result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find stored fingerprints perceptually similar to an image
    Similar {
        /// Image to compare
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        /// Maximum Hamming distance (0-64)
        #[arg(
            short,
            long,
            env = "SIMILARITY_THRESHOLD",
            default_value_t = imprint_core::search::DEFAULT_THRESHOLD
        )]
        threshold: u32,

        /// Maximum number of matches to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the match result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the full analysis pipeline on an image
    Analyze(commands::analyze::AnalyzeArgs),

    /// Administer the fingerprint store
    Store {
        #[command(flatten)]
        store: StoreArgs,

        #[command(subcommand)]
        action: StoreAction,
    },

    /// Download a reference dataset from a manifest of "path URL" lines
    Bootstrap(commands::bootstrap::BootstrapArgs),
}

#[derive(Subcommand)]
pub enum StoreAction {
    /// List stored fingerprints
    List,
    /// Show one stored fingerprint
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Delete one stored fingerprint
    Delete {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Print the number of stored fingerprints
    Count,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;

    match cli.command {
        Commands::Fingerprint { files, json } => commands::fingerprint::execute(files, json),
        Commands::Search {
            file,
            dataset,
            recursive,
            json,
        } => commands::search::execute(file, dataset, recursive, json, quiet).await,
        Commands::Similar {
            file,
            store,
            threshold,
            limit,
            json,
        } => commands::similar::execute(file, store, threshold, limit, json, quiet).await,
        Commands::Analyze(args) => commands::analyze::execute(args, quiet).await,
        Commands::Store { store, action } => commands::store::execute(store, action, quiet).await,
        Commands::Bootstrap(args) => commands::bootstrap::execute(args, quiet).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}
