mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "t2map", about = "T2 relaxometry map generator for multi-echo MRI")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a T2 map from a folder of echo images
    Run(commands::pipeline::RunArgs),
    /// Show the echoes found in a series folder
    Info(commands::info::InfoArgs),
    /// Print or save the default run config as TOML
    Config(commands::config::ConfigArgs),
    /// Render the histogram of an existing T2 map
    Histogram(commands::histogram::HistogramArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => commands::pipeline::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Histogram(args) => commands::histogram::run(args),
    }
}
