//! Code for reading technology-related input tables.
use super::{read_csv, read_csv_optional};
use crate::id::{TechID, ZoneID};
use crate::parameters::{Parameters, TechCategory};
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::Path;

const TECHNOLOGIES_FILE_NAME: &str = "technologies.csv";
const COSTS_FILE_NAME: &str = "technology_costs.csv";
const PARAMETERS_FILE_NAME: &str = "technology_parameters.csv";
const RAMP_RATES_FILE_NAME: &str = "technology_ramp_rates.csv";
const STORAGE_FILE_NAME: &str = "storage_technologies.csv";
const BOUNDS_FILE_NAME: &str = "capacity_bounds.csv";
const HISTORICAL_FILE_NAME: &str = "historical_capacity.csv";
const CAPACITY_FACTORS_FILE_NAME: &str = "capacity_factors.csv";

#[derive(Debug, Deserialize)]
struct TechnologyRaw {
    tech: TechID,
    category: TechCategory,
}

#[derive(Debug, Deserialize)]
struct CostsRaw {
    tech: TechID,
    year: u32,
    investment_cost: f64,
    fixed_om_cost: f64,
    variable_om_cost: f64,
    fuel_price: f64,
    emission_factor: f64,
}

#[derive(Debug, Deserialize)]
struct ParametersRaw {
    tech: TechID,
    year: u32,
    lifetime: u32,
    charge_efficiency: Option<f64>,
    discharge_efficiency: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RampRatesRaw {
    tech: TechID,
    ramp_up: f64,
    ramp_down: f64,
}

#[derive(Debug, Deserialize)]
struct StorageRaw {
    tech: TechID,
    zone: ZoneID,
    energy_to_power_ratio: f64,
    initial_storage_level: f64,
}

#[derive(Debug, Deserialize)]
struct BoundsRaw {
    tech: TechID,
    zone: ZoneID,
    upper_bound: Option<f64>,
    new_upper_bound: Option<f64>,
    new_lower_bound: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HistoricalRaw {
    zone: ZoneID,
    tech: TechID,
    age: u32,
    capacity: f64,
}

#[derive(Debug, Deserialize)]
struct CapacityFactorRaw {
    tech: TechID,
    zone: ZoneID,
    year: u32,
    month: u32,
    hour: u32,
    value: f64,
}

/// Check that a table row refers to a known technology
fn check_tech(params: &Parameters, te: &TechID, file_name: &str) -> Result<()> {
    ensure!(
        params.technologies.contains_key(te),
        "Unknown technology {te} in {file_name}"
    );
    Ok(())
}

/// Read all technology tables from the model directory into `params`
pub fn read_technology_data(model_dir: &Path, params: &mut Parameters) -> Result<()> {
    for row in read_csv::<TechnologyRaw>(&model_dir.join(TECHNOLOGIES_FILE_NAME))? {
        let existing = params.technologies.insert(row.tech.clone(), row.category);
        ensure!(existing.is_none(), "Duplicate technology {}", row.tech);
    }

    for row in read_csv::<CostsRaw>(&model_dir.join(COSTS_FILE_NAME))? {
        check_tech(params, &row.tech, COSTS_FILE_NAME)?;
        let key = (row.tech, row.year);
        params.investment_cost.insert(key.clone(), row.investment_cost);
        params.fixed_om_cost.insert(key.clone(), row.fixed_om_cost);
        params
            .variable_om_cost
            .insert(key.clone(), row.variable_om_cost);
        params.fuel_price.insert(key.clone(), row.fuel_price);
        params.emission_factor.insert(key, row.emission_factor);
    }

    for row in read_csv::<ParametersRaw>(&model_dir.join(PARAMETERS_FILE_NAME))? {
        check_tech(params, &row.tech, PARAMETERS_FILE_NAME)?;
        let key = (row.tech, row.year);
        params.lifetime.insert(key.clone(), row.lifetime);
        if let Some(efficiency) = row.charge_efficiency {
            params.charge_efficiency.insert(key.clone(), efficiency);
        }
        if let Some(efficiency) = row.discharge_efficiency {
            params.discharge_efficiency.insert(key, efficiency);
        }
    }

    for row in read_csv_optional::<RampRatesRaw>(&model_dir.join(RAMP_RATES_FILE_NAME))? {
        check_tech(params, &row.tech, RAMP_RATES_FILE_NAME)?;
        params.ramp_up.insert(row.tech.clone(), row.ramp_up);
        params.ramp_down.insert(row.tech, row.ramp_down);
    }

    for row in read_csv_optional::<StorageRaw>(&model_dir.join(STORAGE_FILE_NAME))? {
        check_tech(params, &row.tech, STORAGE_FILE_NAME)?;
        if let Some(&ratio) = params.energy_to_power_ratio.get(&row.tech) {
            // The ratio is a per-technology attribute; rows for other zones must agree
            ensure!(
                ratio == row.energy_to_power_ratio,
                "Conflicting energy-to-power ratio for technology {}",
                row.tech
            );
        }
        params
            .energy_to_power_ratio
            .insert(row.tech.clone(), row.energy_to_power_ratio);
        params
            .initial_storage_level
            .insert((row.tech, row.zone), row.initial_storage_level);
    }

    for row in read_csv_optional::<BoundsRaw>(&model_dir.join(BOUNDS_FILE_NAME))? {
        check_tech(params, &row.tech, BOUNDS_FILE_NAME)?;
        let key = (row.tech, row.zone);
        if let Some(bound) = row.upper_bound {
            params.capacity_upper_bound.insert(key.clone(), bound);
        }
        if let Some(bound) = row.new_upper_bound {
            params.new_capacity_upper_bound.insert(key.clone(), bound);
        }
        if let Some(bound) = row.new_lower_bound {
            params.new_capacity_lower_bound.insert(key, bound);
        }
    }

    for row in read_csv_optional::<HistoricalRaw>(&model_dir.join(HISTORICAL_FILE_NAME))? {
        check_tech(params, &row.tech, HISTORICAL_FILE_NAME)?;
        let key = (row.zone, row.tech, row.age);
        let existing = params.historical_capacity.insert(key.clone(), row.capacity);
        ensure!(
            existing.is_none(),
            "Duplicate historical capacity entry {key:?}"
        )
    }

    for row in read_csv_optional::<CapacityFactorRaw>(&model_dir.join(CAPACITY_FACTORS_FILE_NAME))?
    {
        check_tech(params, &row.tech, CAPACITY_FACTORS_FILE_NAME)
            .context("Invalid capacity factor entry")?;
        params
            .capacity_factor
            .insert((row.tech, row.zone, row.year, row.month, row.hour), row.value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, file_name: &str, contents: &str) {
        let mut file = File::create(dir.join(file_name)).unwrap();
        writeln!(file, "{contents}").unwrap();
    }

    #[test]
    fn test_read_technology_data() {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            TECHNOLOGIES_FILE_NAME,
            "tech,category\ncoal,dispatchable\nbattery,storage",
        );
        write_file(
            dir.path(),
            COSTS_FILE_NAME,
            "tech,year,investment_cost,fixed_om_cost,variable_om_cost,fuel_price,emission_factor\n\
             coal,2025,700.0,20.0,3.0,10.0,0.9\n\
             battery,2025,300.0,5.0,0.5,0.0,0.0",
        );
        write_file(
            dir.path(),
            PARAMETERS_FILE_NAME,
            "tech,year,lifetime,charge_efficiency,discharge_efficiency\n\
             coal,2025,30,,\n\
             battery,2025,15,0.95,0.95",
        );

        let mut params = Parameters::default();
        read_technology_data(dir.path(), &mut params).unwrap();

        let coal = TechID::new("coal");
        let battery = TechID::new("battery");
        assert_eq!(params.technologies[&coal], TechCategory::Dispatchable);
        assert_eq!(params.investment_cost[&(coal.clone(), 2025)], 700.0);
        assert_eq!(params.lifetime[&(coal.clone(), 2025)], 30);
        assert!(!params.charge_efficiency.contains_key(&(coal, 2025)));
        assert_eq!(params.charge_efficiency[&(battery, 2025)], 0.95);
    }

    #[test]
    fn test_unknown_technology_in_costs() {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            TECHNOLOGIES_FILE_NAME,
            "tech,category\ncoal,dispatchable",
        );
        write_file(
            dir.path(),
            COSTS_FILE_NAME,
            "tech,year,investment_cost,fixed_om_cost,variable_om_cost,fuel_price,emission_factor\n\
             wind,2025,1000.0,25.0,0.0,0.0,0.0",
        );
        write_file(
            dir.path(),
            PARAMETERS_FILE_NAME,
            "tech,year,lifetime,charge_efficiency,discharge_efficiency\ncoal,2025,30,,",
        );

        let mut params = Parameters::default();
        assert!(read_technology_data(dir.path(), &mut params).is_err());
    }
}
