//! Functionality for running the planner.
use crate::finance::DiscountFactors;
use crate::model::build_program;
use crate::parameters::Parameters;
use crate::sets::IndexSets;
use anyhow::Result;
use log::info;

pub mod head_iteration;
pub mod optimisation;

use head_iteration::{run_head_iteration, Convergence};
use optimisation::Solution;

/// The result of one run: the solved program plus hydro convergence diagnostics
pub struct RunOutcome {
    /// Solved values of every decision variable, keyed as they were created
    pub solution: Solution,
    /// Convergence record of the head iteration; `None` when no network was simulated
    pub convergence: Option<Convergence>,
}

/// Run the planner on the given parameter set.
///
/// This is the single external control surface: sets are built, the program is assembled
/// once, and either solved directly or driven through the head iteration when a hydropower
/// network is simulated.
pub fn run(params: &Parameters) -> Result<RunOutcome> {
    params.validate()?;
    let sets = IndexSets::build(params)?;
    let factors = DiscountFactors::calculate(params, &sets)?;

    let mut program = build_program(params, &sets, &factors)?;
    info!(
        "Assembled program with {} variables and {} constraints",
        program.num_variables(),
        program.num_constraints()
    );

    if sets.stations.is_empty() {
        let solution = optimisation::solve(&program, &params.config.solver)?;
        Ok(RunOutcome {
            solution,
            convergence: None,
        })
    } else {
        let (solution, convergence) = run_head_iteration(&mut program, params, &sets)?;
        Ok(RunOutcome {
            solution,
            convergence: Some(convergence),
        })
    }
}
