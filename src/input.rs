//! Common routines for reading input data.
//!
//! Model input is a directory of CSV tables plus a `model.toml` with the scalar configuration.
//! Each submodule reads the tables for one part of the data model into the
//! [`Parameters`](crate::parameters::Parameters) store.
use anyhow::{ensure, Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod config;
pub mod demand;
pub mod hydro;
pub mod technology;
pub mod transmission;

use crate::parameters::Parameters;

/// Read a series of type `T`s from a CSV file.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = read_csv_optional(file_path)?;
    ensure!(
        !vec.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(vec)
}

/// Read a series of type `T`s from a CSV file which may be absent.
///
/// A missing file yields an empty `Vec`; sparse tables treat this as "no entries", never as
/// zeroes.
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    if !file_path.is_file() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(file_path)
        .with_context(|| format!("Error reading {}", file_path.display()))?;

    let mut vec = Vec::new();
    for result in reader.deserialize() {
        let record: T =
            result.with_context(|| format!("Error reading {}", file_path.display()))?;
        vec.push(record);
    }

    Ok(vec)
}

/// Parse a TOML file at the specified path
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let contents = fs::read_to_string(file_path)
        .with_context(|| format!("Could not read file {}", file_path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Error parsing {}", file_path.display()))
}

/// Read all model input from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn load_parameters(model_dir: &Path) -> Result<Parameters> {
    let mut params = Parameters {
        config: config::read_config(model_dir)?,
        ..Parameters::default()
    };

    technology::read_technology_data(model_dir, &mut params)?;
    demand::read_demand_data(model_dir, &mut params)?;
    transmission::read_transmission_data(model_dir, &mut params)?;
    hydro::read_hydro_data(model_dir, &mut params)?;

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        id: String,
        value: f64,
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("data.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id,value\na,1.0\nb,2.5").unwrap();
        }

        let records: Vec<Record> = read_csv(&file_path).unwrap();
        assert_eq!(
            records,
            vec![
                Record {
                    id: "a".to_string(),
                    value: 1.0
                },
                Record {
                    id: "b".to_string(),
                    value: 2.5
                }
            ]
        );
    }

    #[test]
    fn test_read_csv_empty() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("data.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id,value").unwrap();
        }

        assert!(read_csv::<Record>(&file_path).is_err());
    }

    #[test]
    fn test_read_csv_optional_missing() {
        let dir = tempdir().unwrap();
        let records: Vec<Record> = read_csv_optional(&dir.path().join("missing.csv")).unwrap();
        assert!(records.is_empty());
    }
}
