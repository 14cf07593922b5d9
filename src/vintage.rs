//! Vintage-capacity accounting.
//!
//! The capacity of a technology in service in year `y` combines two groups of survivors: the
//! historical cohorts that entered service before the planning horizon began, and the capacity
//! invested in earlier planning years that has not yet reached its end of life. A cohort or
//! investment either survives in full or is excluded; survival is never clamped to a partial
//! value. Survivor membership depends on `y` and is recomputed for every year.
use crate::id::{TechID, ZoneID};
use crate::parameters::{require, Corridor, Parameters};
use anyhow::Result;

/// The historical capacity of `(z, te)` still in service in year `y`.
///
/// A cohort that entered service `age` years before the first planning year survives while
/// `lifetime(te, y) - age > y - y_min`, i.e. while its remaining life still covers `y`.
pub fn surviving_historical(
    params: &Parameters,
    y_min: u32,
    y: u32,
    z: &ZoneID,
    te: &TechID,
) -> Result<f64> {
    let lifetime = require(&params.lifetime, &(te.clone(), y), "lifetime")?;
    let service_time = y - y_min;
    if lifetime <= service_time {
        return Ok(0.0);
    }

    let remaining = lifetime - service_time;
    let total = (0..remaining)
        .filter_map(|age| params.historical_capacity.get(&(z.clone(), te.clone(), age)))
        .sum();
    Ok(total)
}

/// The planning years `yy <= y` whose investments in `te` are still in service in year `y`
pub fn surviving_build_years(
    params: &Parameters,
    years: &[u32],
    y: u32,
    te: &TechID,
) -> Result<Vec<u32>> {
    let lifetime = require(&params.lifetime, &(te.clone(), y), "lifetime")?;
    Ok(years
        .iter()
        .copied()
        .filter(|&yy| yy <= y && y - yy < lifetime)
        .collect())
}

/// The planning years `yy <= y` whose corridor investments are still in service in year `y`
pub fn surviving_line_build_years(years: &[u32], lifetime: u32, y: u32) -> Vec<u32> {
    years
        .iter()
        .copied()
        .filter(|&yy| yy <= y && y - yy < lifetime)
        .collect()
}

/// The pre-existing capacity of a corridor still in service in year `y`.
///
/// Existing lines carry no age data, so they are treated as a single cohort aged zero at the
/// first planning year.
pub fn surviving_existing_line_capacity(corridor: &Corridor, y_min: u32, y: u32) -> f64 {
    if corridor.lifetime > y - y_min {
        corridor.existing_capacity
    } else {
        0.0
    }
}
