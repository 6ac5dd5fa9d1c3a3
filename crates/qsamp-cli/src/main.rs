//! qsamp command-line interface
//!
//! Runs subset sampling on catalog protocols and works with saved
//! statistics trees.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{inspect, merge, run};

/// Rare-event estimation of logical failure rates
#[derive(Parser)]
#[command(name = "qsamp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample a protocol described by a YAML run configuration
    Run {
        /// Run configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Number of shots (overrides the configuration)
        #[arg(short, long)]
        shots: Option<u64>,

        /// Save the statistics tree as JSON
        #[arg(long)]
        save: Option<PathBuf>,

        /// Continue from a previously saved tree
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Use the direct Monte Carlo sampler instead of subset sampling
        #[arg(long)]
        direct: bool,

        /// Print the statistic as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a saved statistics tree
    Inspect {
        /// Tree file (JSON)
        tree: PathBuf,

        /// Also print the full tree
        #[arg(long)]
        full: bool,
    },

    /// Merge two saved statistics trees
    Merge {
        /// First tree
        a: PathBuf,

        /// Second tree
        b: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            shots,
            save,
            resume,
            direct,
            json,
        } => run::execute(&run::RunArgs {
            config,
            shots,
            save,
            resume,
            direct,
            json,
        }),

        Commands::Inspect { tree, full } => inspect::execute(&tree, full),

        Commands::Merge { a, b, output } => merge::execute(&a, &b, &output),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}
