//! Code for reading demand and emission-limit tables.
use super::{read_csv, read_csv_optional};
use crate::id::ZoneID;
use crate::parameters::Parameters;
use anyhow::{ensure, Result};
use serde::Deserialize;
use std::path::Path;

const DEMAND_FILE_NAME: &str = "demand.csv";
const CARBON_LIMITS_FILE_NAME: &str = "carbon_limits.csv";

#[derive(Debug, Deserialize)]
struct DemandRaw {
    zone: ZoneID,
    year: u32,
    month: u32,
    hour: u32,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct CarbonLimitRaw {
    zone: ZoneID,
    year: u32,
    limit: f64,
}

/// Read demand and carbon limits from the model directory into `params`.
///
/// The set of zones is derived from the demand table, so the table is mandatory.
pub fn read_demand_data(model_dir: &Path, params: &mut Parameters) -> Result<()> {
    for row in read_csv::<DemandRaw>(&model_dir.join(DEMAND_FILE_NAME))? {
        let key = (row.zone, row.year, row.month, row.hour);
        let existing = params.demand.insert(key.clone(), row.value);
        ensure!(existing.is_none(), "Duplicate demand entry {key:?}");
    }

    for row in read_csv_optional::<CarbonLimitRaw>(&model_dir.join(CARBON_LIMITS_FILE_NAME))? {
        params.carbon_limit.insert((row.zone, row.year), row.limit);
    }

    Ok(())
}
