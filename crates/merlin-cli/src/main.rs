mod commands;
mod params;
mod progress;
mod script;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use merlin_core::pipeline::RunKind;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "merlinio", about = "Merlin 4D-STEM data set processing tool")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress progress bars and summaries
    #[arg(short, long, global = true)]
    silent: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show acquisition header and frame layout
    Info(commands::info::InfoArgs),
    /// Copy the raw pixel data of the ROI frames into one file
    Extract(commands::run::RunArgs),
    /// Per-pixel mean and standard deviation of the ROI frames
    Average(commands::run::RunArgs),
    /// Annular detector sum per scan position
    Integrate(commands::run::RunArgs),
    /// Annular detector center of mass per scan position
    Com(commands::run::RunArgs),
    /// Execute a control file, or record one from console input
    Script(commands::script::ScriptArgs),
    /// Print or save a default processing config
    Config(commands::config::ConfigArgs),
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
        Commands::Info(args) => commands::info::run(args),
        Commands::Extract(args) => commands::run::run(args, RunKind::Extract, cli.silent),
        Commands::Average(args) => commands::run::run(args, RunKind::Average, cli.silent),
        Commands::Integrate(args) => commands::run::run(args, RunKind::Integrate, cli.silent),
        Commands::Com(args) => commands::run::run(args, RunKind::CenterOfMass, cli.silent),
        Commands::Script(args) => commands::script::run(args, cli.silent),
        Commands::Config(args) => commands::config::run(args),
    }
}
