//! Code for reading transmission corridor tables.
//!
//! The corridor capacity table is the authoritative relation: a zone pair absent from it cannot
//! build transmission capacity. A pair which has no existing line but should be buildable must
//! appear with an existing capacity of zero.
use super::read_csv_optional;
use crate::id::ZoneID;
use crate::parameters::{Corridor, Parameters};
use anyhow::{ensure, Result};
use serde::Deserialize;
use std::path::Path;

const LINES_FILE_NAME: &str = "transmission_lines.csv";
const EFFICIENCY_FILE_NAME: &str = "transmission_efficiency.csv";

#[derive(Debug, Deserialize)]
struct LineRaw {
    from: ZoneID,
    to: ZoneID,
    existing_capacity: f64,
    investment_cost: f64,
    fixed_om_cost: f64,
    variable_om_cost: f64,
    lifetime: u32,
    distance: f64,
}

#[derive(Debug, Deserialize)]
struct EfficiencyRaw {
    from: ZoneID,
    to: ZoneID,
    efficiency: f64,
}

/// Read transmission tables from the model directory into `params`
pub fn read_transmission_data(model_dir: &Path, params: &mut Parameters) -> Result<()> {
    for row in read_csv_optional::<LineRaw>(&model_dir.join(LINES_FILE_NAME))? {
        ensure!(
            row.from != row.to,
            "Transmission line from zone {} to itself",
            row.from
        );
        let key = (row.from, row.to);
        let existing = params.corridors.insert(
            key.clone(),
            Corridor {
                existing_capacity: row.existing_capacity,
                investment_cost: row.investment_cost,
                fixed_om_cost: row.fixed_om_cost,
                variable_om_cost: row.variable_om_cost,
                lifetime: row.lifetime,
                distance: row.distance,
            },
        );
        ensure!(
            existing.is_none(),
            "Duplicate transmission line entry {key:?}"
        );
    }

    for row in read_csv_optional::<EfficiencyRaw>(&model_dir.join(EFFICIENCY_FILE_NAME))? {
        params
            .line_efficiency
            .insert((row.from, row.to), row.efficiency);
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
    fn test_read_transmission_data() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(LINES_FILE_NAME)).unwrap();
            writeln!(
                file,
                "from,to,existing_capacity,investment_cost,fixed_om_cost,variable_om_cost,\
                 lifetime,distance\nA,B,100.0,500.0,10.0,0.1,40,250.0\nB,A,100.0,500.0,10.0,0.1,40,250.0"
            )
            .unwrap();
        }
        {
            let mut file = File::create(dir.path().join(EFFICIENCY_FILE_NAME)).unwrap();
            writeln!(file, "from,to,efficiency\nA,B,0.95\nB,A,0.95").unwrap();
        }

        let mut params = Parameters::default();
        read_transmission_data(dir.path(), &mut params).unwrap();

        let key = (ZoneID::new("A"), ZoneID::new("B"));
        assert_eq!(params.corridors[&key].existing_capacity, 100.0);
        assert_eq!(params.line_efficiency[&key], 0.95);
    }

    #[test]
    fn test_self_loop_rejected() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(LINES_FILE_NAME)).unwrap();
            writeln!(
                file,
                "from,to,existing_capacity,investment_cost,fixed_om_cost,variable_om_cost,\
                 lifetime,distance\nA,A,100.0,500.0,10.0,0.1,40,250.0"
            )
            .unwrap();
        }

        let mut params = Parameters::default();
        assert!(read_transmission_data(dir.path(), &mut params).is_err());
    }
}
