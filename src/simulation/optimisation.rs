//! Lowering the symbolic program to the HiGHS solver.
//!
//! Each solve is atomic: the program is lowered to a fresh [`highs::RowProblem`] (columns in
//! registry order, then rows), handed to the solver with the configured wall-clock limit,
//! and read back into a [`Solution`] keyed like the variable registry. Infeasible and
//! unbounded outcomes are fatal; hitting the time limit yields the best-known solution,
//! clearly labelled.
use crate::model::{Program, VariableKey};
use crate::parameters::SolverConfig;
use anyhow::{bail, Result};
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;
use log::warn;
use strum::Display;

/// How the solver finished
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum SolveStatus {
    /// The returned solution is optimal
    Optimal,
    /// The per-solve wall-clock limit was hit; the solution is the best known, possibly
    /// suboptimal
    TimeLimit,
}

/// The primal solution of one solve
pub struct Solution {
    values: IndexMap<VariableKey, f64>,
    objective: f64,
    status: SolveStatus,
}

impl Solution {
    /// The solved value of the variable for the given key
    pub fn value(&self, key: &VariableKey) -> f64 {
        *self
            .values
            .get(key)
            .expect("No variable found for given params")
    }

    /// Iterate over all variables and their solved values
    pub fn iter(&self) -> impl Iterator<Item = (&VariableKey, f64)> {
        self.values.iter().map(|(key, value)| (key, *value))
    }

    /// The objective value of this solution
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// How the solve finished
    pub fn status(&self) -> SolveStatus {
        self.status
    }
}

/// Solve the program, returning the keyed primal solution.
///
/// # Arguments
///
/// * `program` - The assembled program
/// * `solver` - Solver options (time limit)
pub fn solve(program: &Program, solver: &SolverConfig) -> Result<Solution> {
    let mut problem = Problem::default();

    let columns: Vec<_> = program
        .iter_variables()
        .map(|(_, def)| problem.add_column(def.objective, def.lower..=def.upper))
        .collect();
    for (_, constraint) in program.iter_constraints() {
        problem.add_row(
            constraint.lower..=constraint.upper,
            constraint
                .terms
                .iter()
                .map(|&(var, coeff)| (columns[var], coeff)),
        );
    }

    let mut model = problem.optimise(Sense::Minimise);
    if let Some(limit) = solver.time_limit {
        model.set_option("time_limit", limit);
    }
    enable_solver_logging(&mut model);

    let solved = model.solve();
    let status = match solved.status() {
        HighsModelStatus::Optimal => SolveStatus::Optimal,
        HighsModelStatus::ReachedTimeLimit => {
            warn!("Solver hit the time limit; reporting the best-known solution");
            SolveStatus::TimeLimit
        }
        HighsModelStatus::Infeasible => bail!("Problem is infeasible"),
        HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
            bail!("Problem is unbounded")
        }
        status => bail!("Could not solve: {status:?}"),
    };

    let highs_solution = solved.get_solution();
    let values: IndexMap<VariableKey, f64> = program
        .iter_variables()
        .map(|(key, _)| key.clone())
        .zip(highs_solution.columns().iter().copied())
        .collect();
    let objective = program
        .iter_variables()
        .zip(highs_solution.columns())
        .map(|((_, def), value)| def.objective * value)
        .sum();

    Ok(Solution {
        values,
        objective,
        status,
    })
}

/// Route the solver's own output to the console when debug logging is on
fn enable_solver_logging(model: &mut highs::Model) {
    if log::log_enabled!(log::Level::Debug) {
        model.set_option("log_to_console", true);
        model.set_option("output_flag", true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::build_simple_program;
    use crate::id::{TechID, ZoneID};
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_solve_simple_program() {
        let program = build_simple_program();
        let solution = solve(&program, &SolverConfig::default()).unwrap();
        assert_eq!(solution.status(), SolveStatus::Optimal);

        // The balance forces generation to track demand exactly
        let value = solution.value(&VariableKey::Generation {
            hour: 2,
            month: 1,
            year: 2025,
            zone: ZoneID::new("A"),
            tech: TechID::new("coal"),
        });
        assert_approx_eq!(f64, value, 15.0, epsilon = 1e-6);
        assert!(solution.objective() > 0.0);
    }

    #[test]
    fn test_infeasible_program_fails() {
        let mut program = build_simple_program();
        // Demand that no capacity bound allows
        program.add_le(
            crate::model::ConstraintKey::CapacityUpperBound {
                year: 2025,
                zone: ZoneID::new("A"),
                tech: TechID::new("coal"),
            },
            vec![(
                program.var(&VariableKey::CapExisting {
                    year: 2025,
                    zone: ZoneID::new("A"),
                    tech: TechID::new("coal"),
                }),
                1.0,
            )],
            5.0,
        );

        let err = solve(&program, &SolverConfig::default()).unwrap_err();
        assert!(format!("{err}").contains("infeasible"));
    }
}
