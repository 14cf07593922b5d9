//! The command line interface for the planner.
use crate::output::write_output;
use crate::parameters::Parameters;
use crate::settings::Settings;
use crate::{log, simulation};
use ::log::info;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Folder used for output files when the settings don't name one
const DEFAULT_OUTPUT_FOLDER: &str = "output";

#[derive(Parser)]
#[command(version, about)]
/// The command line interface for the planner.
pub struct Cli {
    #[command(subcommand)]
    /// The available commands.
    pub command: Commands,
}

#[derive(Subcommand)]
/// The available commands.
pub enum Commands {
    /// Run a planning model.
    Run {
        /// Path to the model directory.
        #[arg(help = "Path to the model directory")]
        model_dir: PathBuf,
    },
}

/// Handle the `run` command.
pub fn handle_run_command(model_dir: &Path) -> Result<()> {
    let settings = Settings::from_path(model_dir)?;
    log::init(settings.log_level.as_deref()).context("Failed to initialise logging.")?;

    let params = Parameters::from_path(model_dir).context("Failed to load model.")?;
    info!("Model loaded successfully.");

    let outcome = simulation::run(&params)?;
    if let Some(convergence) = &outcome.convergence {
        info!(
            "Hydro head loop finished: {} after {} iteration(s), residual {:.6}",
            convergence.status, convergence.iterations, convergence.residual
        );
    }
    info!(
        "Solve finished with status {}; total discounted cost {:.6e}",
        outcome.solution.status(),
        outcome.solution.objective()
    );

    let output_folder = settings
        .output_folder
        .unwrap_or_else(|| DEFAULT_OUTPUT_FOLDER.to_string());
    let output_path = model_dir.join(output_folder);
    write_output(&output_path, &outcome)?;
    info!("Results written to {}", output_path.display());

    Ok(())
}
