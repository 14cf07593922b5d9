//! The main entry point for the command line interface.
use anyhow::Result;
use clap::Parser;
use human_panic::setup_panic;
use prospect::commands::{handle_run_command, Cli, Commands};

fn main() -> Result<()> {
    setup_panic!();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { model_dir } => handle_run_command(&model_dir),
    }
}
