//! Writing solved results to CSV files.
//!
//! Every decision variable is written under the same index tuple it was created with, grouped
//! into one file per variable family, plus a summary with the objective and the solve and
//! convergence diagnostics.
use crate::model::VariableKey;
use crate::simulation::RunOutcome;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Serialize)]
struct CapacityRow<'a> {
    year: u32,
    zone: &'a str,
    tech: &'a str,
    variable: &'a str,
    value: f64,
}

#[derive(Serialize)]
struct LineCapacityRow<'a> {
    year: u32,
    from: &'a str,
    to: &'a str,
    variable: &'a str,
    value: f64,
}

#[derive(Serialize)]
struct DispatchRow<'a> {
    hour: u32,
    month: u32,
    year: u32,
    zone: &'a str,
    tech: &'a str,
    variable: &'a str,
    value: f64,
}

#[derive(Serialize)]
struct TradeRow<'a> {
    hour: u32,
    month: u32,
    year: u32,
    from: &'a str,
    to: &'a str,
    variable: &'a str,
    value: f64,
}

#[derive(Serialize)]
struct HydroRow<'a> {
    station: &'a str,
    hour: u32,
    month: u32,
    year: u32,
    variable: &'a str,
    value: f64,
}

#[derive(Serialize)]
struct SummaryRow {
    objective: f64,
    solve_status: String,
    hydro_status: Option<String>,
    hydro_iterations: Option<u32>,
    hydro_residual: Option<f64>,
}

/// Write one CSV file of serialisable rows, skipping empty groups
fn write_rows<T: Serialize>(output_path: &Path, file_name: &str, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let file_path = output_path.join(file_name);
    let mut writer = csv::Writer::from_path(&file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the full outcome of a run to the given directory
pub fn write_output(output_path: &Path, outcome: &RunOutcome) -> Result<()> {
    fs::create_dir_all(output_path)
        .with_context(|| format!("Could not create {}", output_path.display()))?;

    let mut capacity = Vec::new();
    let mut line_capacity = Vec::new();
    let mut dispatch = Vec::new();
    let mut trade = Vec::new();
    let mut hydro = Vec::new();

    for (key, value) in outcome.solution.iter() {
        match key {
            VariableKey::CapNew { year, zone, tech } => capacity.push(CapacityRow {
                year: *year,
                zone: &zone.0,
                tech: &tech.0,
                variable: "new",
                value,
            }),
            VariableKey::CapExisting { year, zone, tech } => capacity.push(CapacityRow {
                year: *year,
                zone: &zone.0,
                tech: &tech.0,
                variable: "existing",
                value,
            }),
            VariableKey::LineCapNew { year, from, to } => line_capacity.push(LineCapacityRow {
                year: *year,
                from: &from.0,
                to: &to.0,
                variable: "new",
                value,
            }),
            VariableKey::LineCapExisting { year, from, to } => {
                line_capacity.push(LineCapacityRow {
                    year: *year,
                    from: &from.0,
                    to: &to.0,
                    variable: "existing",
                    value,
                })
            }
            VariableKey::Generation {
                hour,
                month,
                year,
                zone,
                tech,
            }
            | VariableKey::Charge {
                hour,
                month,
                year,
                zone,
                tech,
            }
            | VariableKey::StorageLevel {
                hour,
                month,
                year,
                zone,
                tech,
            } => dispatch.push(DispatchRow {
                hour: *hour,
                month: *month,
                year: *year,
                zone: &zone.0,
                tech: &tech.0,
                variable: match key {
                    VariableKey::Generation { .. } => "generation",
                    VariableKey::Charge { .. } => "charge",
                    _ => "storage_level",
                },
                value,
            }),
            VariableKey::Export {
                hour,
                month,
                year,
                from,
                to,
            }
            | VariableKey::Import {
                hour,
                month,
                year,
                from,
                to,
            } => trade.push(TradeRow {
                hour: *hour,
                month: *month,
                year: *year,
                from: &from.0,
                to: &to.0,
                variable: if matches!(key, VariableKey::Export { .. }) {
                    "export"
                } else {
                    "import"
                },
                value,
            }),
            VariableKey::GenFlow {
                station,
                hour,
                month,
                year,
            }
            | VariableKey::SpillFlow {
                station,
                hour,
                month,
                year,
            }
            | VariableKey::Withdrawal {
                station,
                hour,
                month,
                year,
            }
            | VariableKey::StationPower {
                station,
                hour,
                month,
                year,
            }
            | VariableKey::ReservoirStorage {
                station,
                hour,
                month,
                year,
            } => hydro.push(HydroRow {
                station: &station.0,
                hour: *hour,
                month: *month,
                year: *year,
                variable: match key {
                    VariableKey::GenFlow { .. } => "genflow",
                    VariableKey::SpillFlow { .. } => "spillflow",
                    VariableKey::Withdrawal { .. } => "withdrawal",
                    VariableKey::StationPower { .. } => "power",
                    _ => "reservoir_storage",
                },
                value,
            }),
        }
    }

    write_rows(output_path, "capacity.csv", &capacity)?;
    write_rows(output_path, "line_capacity.csv", &line_capacity)?;
    write_rows(output_path, "dispatch.csv", &dispatch)?;
    write_rows(output_path, "trade.csv", &trade)?;
    write_rows(output_path, "hydro.csv", &hydro)?;

    let summary = SummaryRow {
        objective: outcome.solution.objective(),
        solve_status: outcome.solution.status().to_string(),
        hydro_status: outcome.convergence.map(|c| c.status.to_string()),
        hydro_iterations: outcome.convergence.map(|c| c.iterations),
        hydro_residual: outcome.convergence.map(|c| c.residual),
    };
    write_rows(output_path, "summary.csv", &[summary])?;

    Ok(())
}
