//! Reftest CLI - reference tests for a document renderer
//!
//! Renders every assertion of the matched fixtures and compares the rasters
//! against each test's baseline. Exits with status 1 if anything failed.

use clap::Parser;
use reftest::commands::Commands;
use reftest::{cli, common::logging};

#[derive(Parser)]
#[command(name = "reftest", about = "Reference tests for a document renderer")]
#[command(version, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    match cli::dispatch(cli.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}
