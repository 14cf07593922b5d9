//! The iterative head-convergence driver.
//!
//! Hydropower output depends on the water head, which in turn depends on reservoir storage
//! and discharge, so the head-to-power relation is nonlinear. The driver resolves it by
//! successive linearisation: solve the program with the current heads, recompute the heads
//! implied by the solved flows and storage through each station's level curves, and repeat
//! until the relative head change is within the error threshold or the iteration cap is hit.
//! Only the hydropower coefficients are touched between solves.
use crate::id::StationID;
use crate::model::{Program, VariableKey};
use crate::parameters::Parameters;
use crate::sets::IndexSets;
use crate::simulation::optimisation::{self, Solution};
use anyhow::{Context, Result};
use itertools::iproduct;
use log::{info, warn};
use std::collections::HashMap;
use strum::Display;

/// The driver's state between transitions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeadLoopState {
    /// Seed the heads with each station's nominal value
    Initializing,
    /// Patch coefficients and solve the program
    Solving,
    /// Recompute heads from the solution and measure the change
    Evaluating,
    /// Terminal: the head change is within the threshold
    Converged,
    /// Terminal: the iteration cap was hit without convergence
    Exhausted,
}

/// Whether the head loop converged
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// The relative head change fell within the error threshold
    Converged,
    /// The iteration cap was hit; the last iterate is reported as-is
    Exhausted,
}

/// Diagnostics of a finished head loop
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Convergence {
    /// Terminal status
    pub status: ConvergenceStatus,
    /// Number of solves performed
    pub iterations: u32,
    /// Relative head change at the last evaluation
    pub residual: f64,
}

/// Water head per (station, year, month, hour)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaterHead {
    values: HashMap<(StationID, u32, u32, u32), f64>,
}

impl WaterHead {
    /// Seed every entry with the station's nominal head
    pub fn seed(params: &Parameters, sets: &IndexSets) -> WaterHead {
        let values = iproduct!(&sets.stations, &sets.years, &sets.months, &sets.hours)
            .map(|(s, &y, &m, &h)| {
                ((s.clone(), y, m, h), params.stations[s].nominal_head)
            })
            .collect();
        WaterHead { values }
    }

    /// The head at the given index tuple
    pub fn get(&self, station: &StationID, year: u32, month: u32, hour: u32) -> f64 {
        self.values[&(station.clone(), year, month, hour)]
    }

    /// Set the head at the given index tuple
    pub fn set(&mut self, station: &StationID, year: u32, month: u32, hour: u32, head: f64) {
        self.values
            .insert((station.clone(), year, month, hour), head);
    }

    /// Replace non-positive heads with one, so relative errors stay defined
    pub fn clamp_nonpositive(&mut self) {
        for value in self.values.values_mut() {
            if *value <= 0.0 {
                *value = 1.0;
            }
        }
    }

    /// Mean relative difference against `new`, taken entry by entry
    pub fn relative_error(&self, new: &WaterHead) -> f64 {
        let total: f64 = new
            .values
            .iter()
            .map(|(key, new_head)| (new_head - self.values[key]).abs() / new_head)
            .sum();
        total / new.values.len() as f64
    }

    /// Move each head a fraction `alpha` of the way towards `new`
    pub fn relax(&mut self, alpha: f64, new: &WaterHead) {
        for (key, value) in &mut self.values {
            *value += alpha * (new.values[key] - *value);
        }
    }
}

/// Run the head loop to a terminal state.
///
/// Returns the last solution together with the convergence diagnostics. Exhaustion is not an
/// error: the last iterate is returned with an [`ConvergenceStatus::Exhausted`] marker and a
/// warning, leaving the decision to the caller. Solver failures are fatal and carry the
/// iteration number.
pub fn run_head_iteration(
    program: &mut Program,
    params: &Parameters,
    sets: &IndexSets,
) -> Result<(Solution, Convergence)> {
    let hydro = &params.config.hydro;
    if hydro.iteration_number <= 1 {
        info!("Iteration cap is 1; the model is solved with fixed heads");
    }

    let mut state = HeadLoopState::Initializing;
    let mut heads = WaterHead::default();
    let mut last_solution = None;
    let mut iteration = 0;
    let mut residual = f64::INFINITY;

    loop {
        state = match state {
            HeadLoopState::Initializing => {
                heads = WaterHead::seed(params, sets);
                HeadLoopState::Solving
            }
            HeadLoopState::Solving => {
                iteration += 1;
                program.update_hydro_coefficients(params, &heads);
                let solution = optimisation::solve(program, &params.config.solver)
                    .with_context(|| format!("Head iteration {iteration} failed"))?;
                last_solution = Some(solution);
                HeadLoopState::Evaluating
            }
            HeadLoopState::Evaluating => {
                if hydro.iteration_number <= 1 {
                    residual = 0.0;
                    HeadLoopState::Converged
                } else {
                    let solution = last_solution.as_ref().unwrap();
                    let mut new_heads = evaluate_heads(solution, params, sets);
                    new_heads.clamp_nonpositive();
                    residual = heads.relative_error(&new_heads);
                    info!("Head iteration {iteration}: relative error {residual:.6}");

                    if residual <= hydro.error_threshold {
                        HeadLoopState::Converged
                    } else if iteration >= hydro.iteration_number {
                        HeadLoopState::Exhausted
                    } else {
                        heads.relax(1.0 / f64::from(iteration), &new_heads);
                        HeadLoopState::Solving
                    }
                }
            }
            HeadLoopState::Converged => {
                info!("Head iteration converged after {iteration} solve(s)");
                let convergence = Convergence {
                    status: ConvergenceStatus::Converged,
                    iterations: iteration,
                    residual,
                };
                return Ok((last_solution.unwrap(), convergence));
            }
            HeadLoopState::Exhausted => {
                warn!(
                    "Head iteration failed to converge within {iteration} iterations \
                     (residual {residual:.6}); reporting the last iterate"
                );
                let convergence = Convergence {
                    status: ConvergenceStatus::Exhausted,
                    iterations: iteration,
                    residual,
                };
                return Ok((last_solution.unwrap(), convergence));
            }
        };
    }
}

/// Recompute the heads implied by a solution.
///
/// The forebay level over a step is the midpoint of the levels at its boundary storage
/// samples; the tailrace level follows from the total outflow through the station's
/// level-discharge curve. The head is their difference, floored at zero.
fn evaluate_heads(solution: &Solution, params: &Parameters, sets: &IndexSets) -> WaterHead {
    let mut heads = WaterHead::default();

    for (s, &y, &m) in iproduct!(&sets.stations, &sets.years, &sets.months) {
        let forebay = &params.forebay_curves[s];
        let tailrace = &params.tailrace_curves[s];

        let levels: Vec<f64> = sets
            .hours0
            .iter()
            .map(|&h| {
                let storage = solution.value(&VariableKey::ReservoirStorage {
                    hour: h,
                    station: s.clone(),
                    month: m,
                    year: y,
                });
                forebay.value_at(storage)
            })
            .collect();

        for (i, &h) in sets.hours.iter().enumerate() {
            let outflow = solution.value(&VariableKey::GenFlow {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            }) + solution.value(&VariableKey::SpillFlow {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            });

            let fore = (levels[i] + levels[i + 1]) / 2.0;
            let tail = tailrace.value_at(outflow);
            heads.set(s, y, m, h, (fore - tail).max(0.0));
        }
    }

    heads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finance::DiscountFactors;
    use crate::fixture::hydro_parameters;
    use crate::model::build_program;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_flat_curves_converge_in_one_iteration() {
        // The fixture's level curves are flat, so the implied head never moves from the
        // seed value and the first evaluation already satisfies the threshold
        let params = hydro_parameters();
        let sets = IndexSets::build(&params).unwrap();
        let factors = DiscountFactors::calculate(&params, &sets).unwrap();
        let mut program = build_program(&params, &sets, &factors).unwrap();

        let (_, convergence) = run_head_iteration(&mut program, &params, &sets).unwrap();
        assert_eq!(convergence.status, ConvergenceStatus::Converged);
        assert_eq!(convergence.iterations, 1);
        assert_approx_eq!(f64, convergence.residual, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fixed_head_mode_solves_once() {
        let mut params = hydro_parameters();
        params.config.hydro.iteration_number = 1;
        let sets = IndexSets::build(&params).unwrap();
        let factors = DiscountFactors::calculate(&params, &sets).unwrap();
        let mut program = build_program(&params, &sets, &factors).unwrap();

        let (_, convergence) = run_head_iteration(&mut program, &params, &sets).unwrap();
        assert_eq!(convergence.status, ConvergenceStatus::Converged);
        assert_eq!(convergence.iterations, 1);
    }

    #[test]
    fn test_exhaustion_is_reported_not_fatal() {
        // Power-bound stations make the generation flow depend on the linearisation head,
        // and a steep tailrace curve feeds that dependence back into the implied head, so
        // consecutive iterates keep moving; a tiny threshold and a cap of two then leave
        // the loop exhausted rather than converged
        let mut params = hydro_parameters();
        params.config.hydro.error_threshold = 1e-12;
        params.config.hydro.iteration_number = 2;
        for station in params.stations.values_mut() {
            station.power_max = 3.0;
            // All excess water must be withdrawn, so the tailrace sees the turbine flow only
            station.spillflow_max = 0.0;
        }
        for curve in params.tailrace_curves.values_mut() {
            *curve = crate::interpolate::LevelCurve::new(vec![(0.0, 0.0), (20.0, 40.0)]).unwrap();
        }

        let sets = IndexSets::build(&params).unwrap();
        let factors = DiscountFactors::calculate(&params, &sets).unwrap();
        let mut program = build_program(&params, &sets, &factors).unwrap();

        let (_, convergence) = run_head_iteration(&mut program, &params, &sets).unwrap();
        assert_eq!(convergence.status, ConvergenceStatus::Exhausted);
        assert_eq!(convergence.iterations, 2);
        assert!(convergence.residual > 1e-12);
    }

    #[test]
    fn test_relative_error_clamps_nonpositive() {
        let station = StationID::new("s");
        let mut old = WaterHead::default();
        old.set(&station, 2025, 1, 1, 2.0);
        let mut new = WaterHead::default();
        new.set(&station, 2025, 1, 1, -3.0);

        new.clamp_nonpositive();
        // Clamped to 1, so the relative error is |1 - 2| / 1
        assert_approx_eq!(f64, old.relative_error(&new), 1.0);
    }

    #[test]
    fn test_relax_moves_towards_new() {
        let station = StationID::new("s");
        let mut old = WaterHead::default();
        old.set(&station, 2025, 1, 1, 10.0);
        let mut new = WaterHead::default();
        new.set(&station, 2025, 1, 1, 20.0);

        old.relax(0.5, &new);
        assert_approx_eq!(f64, old.get(&station, 2025, 1, 1), 15.0);
    }
}
