//! The discounted total-cost objective.
//!
//! The objective is linear, so it is expressed entirely through per-variable coefficients:
//! operating costs on generation, transfer and withdrawal variables (scaled from the
//! representative period to a full year by the period weight and discounted with the variable
//! factor), fixed O&M on the existing-capacity variables, and investment costs on the
//! new-capacity variables. Corridor costs carry a factor of one half because each physical
//! line appears under both orientations. Withdrawal income enters with a negative sign.
use super::{Program, VariableKey};
use crate::finance::DiscountFactors;
use crate::parameters::{require, Parameters};
use anyhow::{Context, Result};

/// Set the objective coefficient of every variable in the program
pub fn apply(
    program: &mut Program,
    params: &Parameters,
    factors: &DiscountFactors,
) -> Result<()> {
    program.set_objective(|key| coefficient(key, params, factors))
}

/// The objective coefficient for a single decision variable
fn coefficient(key: &VariableKey, params: &Parameters, factors: &DiscountFactors) -> Result<f64> {
    let weight = params.config.time.weight();
    let dt = params.config.time.dt;
    let var_factor = |y: u32| {
        factors
            .var_factor
            .get(&y)
            .copied()
            .with_context(|| format!("Missing variable cost factor for year {y}"))
    };

    let coefficient = match key {
        VariableKey::Generation { year, tech, .. } => {
            let om = require(&params.variable_om_cost, &(tech.clone(), *year), "variable O&M")?;
            let fuel = require(&params.fuel_price, &(tech.clone(), *year), "fuel price")?;
            (om + fuel) * var_factor(*year)? / weight
        }
        VariableKey::CapExisting { year, tech, .. } => {
            let om = require(&params.fixed_om_cost, &(tech.clone(), *year), "fixed O&M")?;
            om * factors.fix_factor[year]
        }
        VariableKey::CapNew { year, tech, .. } => {
            let cost = require(&params.investment_cost, &(tech.clone(), *year), "investment cost")?;
            cost * factors.inv_factor[&(tech.clone(), *year)]
        }
        VariableKey::Export { year, from, to, .. } => {
            let corridor = &params.corridors[&(from.clone(), to.clone())];
            0.5 * corridor.variable_om_cost * var_factor(*year)? / weight
        }
        VariableKey::LineCapExisting { year, from, to } => {
            let corridor = &params.corridors[&(from.clone(), to.clone())];
            0.5 * corridor.fixed_om_cost * factors.fix_factor[year]
        }
        VariableKey::LineCapNew { year, from, to } => {
            let corridor = &params.corridors[&(from.clone(), to.clone())];
            0.5 * corridor.investment_cost * corridor.distance * factors.trans_inv_factor[year]
        }
        VariableKey::Withdrawal { year, .. } => {
            // Water sold for non-power uses earns income
            -3600.0 * dt * params.config.hydro.withdrawal_price * var_factor(*year)? / weight
        }
        _ => 0.0,
    };

    Ok(coefficient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{build_simple_program, simple_parameters};
    use crate::id::TechID;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_generation_and_investment_coefficients() {
        let params = simple_parameters();
        let sets = crate::sets::IndexSets::build(&params).unwrap();
        let factors = DiscountFactors::calculate(&params, &sets).unwrap();
        let program = build_simple_program();

        let weight = params.config.time.weight();
        let coal = TechID::new("coal");

        for (key, def) in program.iter_variables() {
            match key {
                VariableKey::Generation { .. } => {
                    // (var O&M + fuel) scaled to a year and discounted; single year => factor 1
                    let expected = (3.0 + 10.0) * factors.var_factor[&2025] / weight;
                    assert_approx_eq!(f64, def.objective, expected, epsilon = 1e-12);
                }
                VariableKey::CapNew { .. } => {
                    let expected = 700.0 * factors.inv_factor[&(coal.clone(), 2025)];
                    assert_approx_eq!(f64, def.objective, expected, epsilon = 1e-12);
                }
                VariableKey::CapExisting { .. } => {
                    assert_approx_eq!(f64, def.objective, 20.0, epsilon = 1e-12);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_total_cost_is_positive() {
        let program = build_simple_program();
        assert!(program.iter_variables().any(|(_, def)| def.objective > 0.0));
        assert!(program.iter_variables().all(|(_, def)| def.objective >= 0.0));
    }
}
