//! Present-value conversion factors for costs.
//!
//! Every cost stream in the objective is discounted back to the first planning year. Because
//! each modelled year stands in for a span of non-modelled years, operating costs are converted
//! with an annuity over that span; investments are first annualised over the depreciation
//! period with the capital recovery factor and then discounted over the years the investment
//! overlaps the modelled horizon.
use crate::id::TechID;
use crate::parameters::{require, Parameters};
use crate::sets::IndexSets;
use anyhow::{ensure, Result};
use std::collections::HashMap;

/// Calculates the capital recovery factor (CRF) for a given lifetime and discount rate.
///
/// The CRF is used to annualize capital costs over the lifetime of an asset.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: f64) -> f64 {
    if lifetime == 0 {
        return 0.0;
    }
    if discount_rate == 0.0 {
        return 1.0 / f64::from(lifetime);
    }
    let factor = (1.0 + discount_rate).powi(lifetime as i32);
    (discount_rate * factor) / (factor - 1.0)
}

/// The factor converting an operating cost in a modelled year to a present value.
///
/// # Arguments
///
/// * `discount_rate` - Annual discount rate, must be positive
/// * `year` - The modelled year the cost occurs in
/// * `year_min` - First planning year (the present-value reference)
/// * `next_year` - The next modelled year; `year + 1` when `year` is the last
///
/// The cost is assumed to repeat in each of the `next_year - year` years the modelled year
/// represents, giving an annuity discounted back to `year_min`.
pub fn cost_factor(discount_rate: f64, year: u32, year_min: u32, next_year: u32) -> Result<f64> {
    ensure!(discount_rate > 0.0, "discount rate must be positive");
    ensure!(year >= year_min, "year {year} precedes first year {year_min}");
    ensure!(
        next_year > year,
        "next modelled year {next_year} must come after {year}"
    );

    let m = i32::try_from(year - year_min)?;
    let k = i32::try_from(next_year - year)?;
    let r = discount_rate;
    Ok((1.0 + r).powi(1 - m) * (1.0 - (1.0 + r).powi(-k)) / r)
}

/// The factor converting an investment made in a modelled year to a present value.
///
/// The upfront cost is annualised over the depreciation period with the capital recovery
/// factor at the interest rate, and the annual payments falling inside the modelled horizon
/// are discounted back to `year_min`. Payments beyond `year_max` are outside the planning
/// scope and are not charged, so the present-value annuity runs over
/// `min(dep_period, year_max - year + 1)` years.
pub fn inv_cost_factor(
    dep_period: u32,
    interest_rate: f64,
    discount_rate: f64,
    year: u32,
    year_min: u32,
    year_max: u32,
) -> Result<f64> {
    ensure!(dep_period > 0, "depreciation period must be positive");
    ensure!(interest_rate > 0.0, "interest rate must be positive");
    ensure!(discount_rate > 0.0, "discount rate must be positive");
    ensure!(
        year_min <= year && year <= year_max,
        "year {year} outside planning horizon {year_min}..={year_max}"
    );

    let m = i32::try_from(year - year_min)?;
    let horizon = year_max - year + 1;
    let pv_years = i32::try_from(dep_period.min(horizon))?;
    let r = discount_rate;

    let annuity = capital_recovery_factor(dep_period, interest_rate);
    Ok(annuity * (1.0 - (1.0 + r).powi(-pv_years)) / (r * (1.0 + r).powi(m)))
}

/// The per-year present-value factors used by the objective
#[derive(Debug, Default, PartialEq)]
pub struct DiscountFactors {
    /// Factor for variable costs per year
    pub var_factor: HashMap<u32, f64>,
    /// Factor for fixed costs per year; identical to `var_factor` by definition
    pub fix_factor: HashMap<u32, f64>,
    /// Factor for technology investment per (technology, year)
    pub inv_factor: HashMap<(TechID, u32), f64>,
    /// Factor for transmission investment per year
    pub trans_inv_factor: HashMap<u32, f64>,
}

impl DiscountFactors {
    /// Compute all factors for the given parameter store and index sets
    pub fn calculate(params: &Parameters, sets: &IndexSets) -> Result<DiscountFactors> {
        let finance = &params.config.finance;
        let (y_min, y_max) = (sets.years[0], *sets.years.last().unwrap());

        let mut factors = DiscountFactors::default();
        // Pre-existing corridor capacity is depreciated over the longest corridor lifetime
        let line_lifetime = params.corridors.values().map(|c| c.lifetime).max();

        for (i, &y) in sets.years.iter().enumerate() {
            let next_year = sets.years.get(i + 1).copied().unwrap_or(y + 1);
            let factor = cost_factor(finance.discount_rate, y, y_min, next_year)?;
            factors.var_factor.insert(y, factor);
            factors.fix_factor.insert(y, factor);

            for te in &sets.techs {
                let lifetime = require(&params.lifetime, &(te.clone(), y), "lifetime")?;
                factors.inv_factor.insert(
                    (te.clone(), y),
                    inv_cost_factor(
                        lifetime,
                        finance.interest_rate,
                        finance.discount_rate,
                        y,
                        y_min,
                        y_max,
                    )?,
                );
            }

            if let Some(lifetime) = line_lifetime {
                factors.trans_inv_factor.insert(
                    y,
                    inv_cost_factor(
                        lifetime,
                        finance.interest_rate,
                        finance.discount_rate,
                        y,
                        y_min,
                        y_max,
                    )?,
                );
            }
        }

        Ok(factors)
    }
}
