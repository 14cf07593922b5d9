//! Code for reading hydropower network tables.
use super::{read_csv, read_csv_optional};
use crate::id::{StationID, ZoneID};
use crate::interpolate::LevelCurve;
use crate::parameters::{BoundaryStorage, Parameters, Station, StorageBounds, TravelTimeEdge};
use anyhow::{ensure, Result};
use itertools::Itertools;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const STATIONS_FILE_NAME: &str = "stations.csv";
const DELAYS_FILE_NAME: &str = "water_delay_times.csv";
const INFLOW_FILE_NAME: &str = "natural_inflow.csv";
const STORAGE_BOUNDS_FILE_NAME: &str = "reservoir_storage_bounds.csv";
const BOUNDARY_STORAGE_FILE_NAME: &str = "reservoir_boundary_storage.csv";
const FOREBAY_CURVES_FILE_NAME: &str = "forebay_curves.csv";
const TAILRACE_CURVES_FILE_NAME: &str = "tailrace_curves.csv";
const PREDEFINED_FILE_NAME: &str = "predefined_hydropower.csv";

#[derive(Debug, Deserialize)]
struct StationRaw {
    station: StationID,
    zone: ZoneID,
    nominal_head: f64,
    efficiency: f64,
    outflow_min: f64,
    outflow_max: f64,
    genflow_max: f64,
    spillflow_max: f64,
    power_min: f64,
    power_max: f64,
}

#[derive(Debug, Deserialize)]
struct DelayRaw {
    upstream: StationID,
    downstream: StationID,
    delay: f64,
}

#[derive(Debug, Deserialize)]
struct InflowRaw {
    station: StationID,
    year: u32,
    month: u32,
    hour: u32,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct StorageBoundsRaw {
    station: StationID,
    month: u32,
    hour: u32,
    lower: f64,
    upper: f64,
}

#[derive(Debug, Deserialize)]
struct BoundaryStorageRaw {
    station: StationID,
    month: u32,
    initial: f64,
    terminal: f64,
}

#[derive(Debug, Deserialize)]
struct CurvePointRaw {
    station: StationID,
    x: f64,
    level: f64,
}

#[derive(Debug, Deserialize)]
struct PredefinedRaw {
    zone: ZoneID,
    year: u32,
    month: u32,
    hour: u32,
    value: f64,
}

/// Group curve sample points by station and build one curve per station
fn read_curves(file_path: &Path) -> Result<HashMap<StationID, LevelCurve>> {
    let rows = read_csv_optional::<CurvePointRaw>(file_path)?;
    rows.into_iter()
        .into_group_map_by(|row| row.station.clone())
        .into_iter()
        .map(|(station, points)| {
            let curve =
                LevelCurve::new(points.into_iter().map(|p| (p.x, p.level)).collect())?;
            Ok((station, curve))
        })
        .collect()
}

/// Read all hydropower tables from the model directory into `params`.
///
/// All hydro files are optional; a model without a `stations.csv` simply has no network. When
/// stations are present, the network-mode tables are required.
pub fn read_hydro_data(model_dir: &Path, params: &mut Parameters) -> Result<()> {
    for row in read_csv_optional::<StationRaw>(&model_dir.join(STATIONS_FILE_NAME))? {
        let existing = params.stations.insert(
            row.station.clone(),
            Station {
                zone: row.zone,
                nominal_head: row.nominal_head,
                efficiency: row.efficiency,
                outflow_min: row.outflow_min,
                outflow_max: row.outflow_max,
                genflow_max: row.genflow_max,
                spillflow_max: row.spillflow_max,
                power_min: row.power_min,
                power_max: row.power_max,
            },
        );
        ensure!(existing.is_none(), "Duplicate station {}", row.station);
    }

    for row in read_csv_optional::<DelayRaw>(&model_dir.join(DELAYS_FILE_NAME))? {
        params.travel_time_edges.push(TravelTimeEdge {
            upstream: row.upstream,
            downstream: row.downstream,
            delay: row.delay,
        });
    }

    for row in read_csv_optional::<InflowRaw>(&model_dir.join(INFLOW_FILE_NAME))? {
        params
            .natural_inflow
            .insert((row.station, row.year, row.month, row.hour), row.value);
    }

    for row in read_csv_optional::<StorageBoundsRaw>(&model_dir.join(STORAGE_BOUNDS_FILE_NAME))? {
        params.reservoir_storage_bounds.insert(
            (row.station, row.month, row.hour),
            StorageBounds {
                lower: row.lower,
                upper: row.upper,
            },
        );
    }

    for row in
        read_csv_optional::<BoundaryStorageRaw>(&model_dir.join(BOUNDARY_STORAGE_FILE_NAME))?
    {
        params.reservoir_boundary_storage.insert(
            (row.station, row.month),
            BoundaryStorage {
                initial: row.initial,
                terminal: row.terminal,
            },
        );
    }

    params.forebay_curves = read_curves(&model_dir.join(FOREBAY_CURVES_FILE_NAME))?;
    params.tailrace_curves = read_curves(&model_dir.join(TAILRACE_CURVES_FILE_NAME))?;

    if params.config.hydro.enabled {
        ensure!(
            !params.stations.is_empty(),
            "Hydro network simulation is enabled but {STATIONS_FILE_NAME} has no stations"
        );
    }

    for row in read_csv_optional::<PredefinedRaw>(&model_dir.join(PREDEFINED_FILE_NAME))? {
        params
            .predefined_hydropower
            .insert((row.zone, row.year, row.month, row.hour), row.value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_read_hydro_data_absent_files() {
        let dir = tempdir().unwrap();
        let mut params = Parameters::default();
        read_hydro_data(dir.path(), &mut params).unwrap();
        assert!(params.stations.is_empty());
        assert!(params.travel_time_edges.is_empty());
    }

    #[test]
    fn test_read_curves() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(FOREBAY_CURVES_FILE_NAME);
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(
                file,
                "station,x,level\ns1,0.0,100.0\ns1,10.0,110.0\ns2,0.0,50.0"
            )
            .unwrap();
        }

        let curves = read_curves(&file_path).unwrap();
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[&StationID::new("s1")].value_at(5.0), 105.0);
        assert_eq!(curves[&StationID::new("s2")].value_at(123.0), 50.0);
    }

    #[test]
    fn test_network_mode_requires_stations() {
        let dir = tempdir().unwrap();
        let mut params = Parameters::default();
        params.config.hydro.enabled = true;
        assert!(read_hydro_data(dir.path(), &mut params).is_err());
    }
}
