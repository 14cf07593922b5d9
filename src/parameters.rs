//! The typed parameter store for the planner.
//!
//! All reference data is loaded once, before any variable is created, and is read-only
//! thereafter. Sparse tables are keyed by ID/index tuples; **absence of a key means "not
//! eligible"**, never zero. In particular, a zone pair without a corridor entry cannot build
//! transmission capacity and a technology/zone pair without a bound entry is unbounded.
use crate::id::{StationID, TechID, ZoneID};
use crate::input::load_parameters;
use crate::interpolate::LevelCurve;
use anyhow::{bail, ensure, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::path::Path;

/// The category a technology belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum)]
pub enum TechCategory {
    /// Output fully controllable up to capacity (e.g. coal, gas)
    #[string = "dispatchable"]
    Dispatchable,
    /// Variable renewables whose output is bounded by a capacity factor
    #[string = "nondispatchable"]
    NonDispatchable,
    /// Symmetric charge/discharge energy storage
    #[string = "storage"]
    Storage,
    /// Hydropower, modelled at station level or via a predefined series
    #[string = "hydro"]
    Hydro,
}

/// Time discretisation of the planning problem.
///
/// Hours and months are a sampled subset of a real year (the representative period); the
/// `weight` factor scales the sampled period back up to a full year.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TimeConfig {
    /// Planning years, in increasing order
    pub years: Vec<u32>,
    /// Number of representative months
    pub months: u32,
    /// Number of representative hours per month
    pub hours: u32,
    /// Length of a time step in hours
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Hours in a full year, for annualising the representative period
    #[serde(default = "default_hours_in_year")]
    pub hours_in_year: f64,
}

fn default_dt() -> f64 {
    1.0
}

fn default_hours_in_year() -> f64 {
    8760.0
}

impl TimeConfig {
    /// The weight of the representative period relative to a full year
    pub fn weight(&self) -> f64 {
        f64::from(self.months * self.hours) * self.dt / self.hours_in_year
    }
}

/// Economic scalars
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FinanceConfig {
    /// Social discount rate used for present-value factors
    pub discount_rate: f64,
    /// Interest rate (WACC) used for the capital recovery factor
    pub interest_rate: f64,
}

/// Hydropower-specific scalars
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HydroConfig {
    /// Whether hydropower is network-simulated (otherwise a predefined series is used)
    #[serde(default)]
    pub enabled: bool,
    /// Relative head change below which the head iteration has converged
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f64,
    /// Hard cap on head iterations; 1 means fixed-head
    #[serde(default = "default_iteration_number")]
    pub iteration_number: u32,
    /// Income per cubic metre of water withdrawn for non-power uses
    #[serde(default)]
    pub withdrawal_price: f64,
}

fn default_error_threshold() -> f64 {
    1e-3
}

fn default_iteration_number() -> u32 {
    5
}

impl Default for HydroConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            error_threshold: default_error_threshold(),
            iteration_number: default_iteration_number(),
            withdrawal_price: 0.0,
        }
    }
}

/// Solver selection and per-solve limits
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SolverConfig {
    /// Name of the solver backend
    #[serde(default = "default_solver_name")]
    pub name: String,
    /// Wall-clock limit for each individual solve, in seconds
    #[serde(default)]
    pub time_limit: Option<f64>,
}

fn default_solver_name() -> String {
    "highs".to_string()
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            name: default_solver_name(),
            time_limit: None,
        }
    }
}

/// Scalar configuration for a model, read from `model.toml`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    /// Time discretisation
    pub time: TimeConfig,
    /// Economic scalars
    pub finance: FinanceConfig,
    /// Hydropower scalars
    #[serde(default)]
    pub hydro: HydroConfig,
    /// Solver settings
    #[serde(default)]
    pub solver: SolverConfig,
}

/// Attributes of a transmission corridor between two zones.
///
/// Corridors are stored directed; a physical line appears under both orientations.
#[derive(Debug, Clone, PartialEq)]
pub struct Corridor {
    /// Capacity already in service at the start of the horizon
    pub existing_capacity: f64,
    /// Investment cost per unit capacity and distance
    pub investment_cost: f64,
    /// Fixed O&M cost per unit capacity per year
    pub fixed_om_cost: f64,
    /// Variable O&M cost per unit of transmitted energy
    pub variable_om_cost: f64,
    /// Corridor lifetime in years
    pub lifetime: u32,
    /// Corridor length
    pub distance: f64,
}

/// Static physical characteristics of a hydropower station
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Zone whose balance the station's output feeds
    pub zone: ZoneID,
    /// First-guess water head used to seed the head iteration
    pub nominal_head: f64,
    /// Output coefficient in the head-to-power relation
    pub efficiency: f64,
    /// Minimum required release (ecological/shipping flow)
    pub outflow_min: f64,
    /// Maximum total outflow
    pub outflow_max: f64,
    /// Maximum flow through the turbines
    pub genflow_max: f64,
    /// Maximum flow over the spillways
    pub spillflow_max: f64,
    /// Guaranteed minimum power output
    pub power_min: f64,
    /// Nameplate capacity
    pub power_max: f64,
}

/// A directed travel-time edge between two stations
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeEdge {
    /// Station the water leaves
    pub upstream: StationID,
    /// Station the water arrives at
    pub downstream: StationID,
    /// Water propagation time in hours
    pub delay: f64,
}

/// Time-varying reservoir storage bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageBounds {
    /// Minimum storage
    pub lower: f64,
    /// Maximum storage
    pub upper: f64,
}

/// Prescribed reservoir storage at the first and last hour of a month
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryStorage {
    /// Storage pinned at the first hour
    pub initial: f64,
    /// Storage pinned at the last hour
    pub terminal: f64,
}

/// All reference data for one model run
#[derive(Debug, Default, PartialEq)]
pub struct Parameters {
    /// Scalar configuration
    pub config: Config,
    /// Technologies and their categories
    pub technologies: IndexMap<TechID, TechCategory>,
    /// Demand per (zone, year, month, hour); must cover the full grid
    pub demand: HashMap<(ZoneID, u32, u32, u32), f64>,
    /// Investment cost per (technology, year)
    pub investment_cost: HashMap<(TechID, u32), f64>,
    /// Fixed O&M cost per (technology, year)
    pub fixed_om_cost: HashMap<(TechID, u32), f64>,
    /// Variable O&M cost per (technology, year)
    pub variable_om_cost: HashMap<(TechID, u32), f64>,
    /// Fuel price per (technology, year)
    pub fuel_price: HashMap<(TechID, u32), f64>,
    /// Technical lifetime per (technology, year)
    pub lifetime: HashMap<(TechID, u32), u32>,
    /// Carbon emission factor per (technology, year)
    pub emission_factor: HashMap<(TechID, u32), f64>,
    /// Charge efficiency per (storage technology, year)
    pub charge_efficiency: HashMap<(TechID, u32), f64>,
    /// Discharge efficiency per (storage technology, year)
    pub discharge_efficiency: HashMap<(TechID, u32), f64>,
    /// Maximum upward ramp per step, as a fraction of existing capacity
    pub ramp_up: HashMap<TechID, f64>,
    /// Maximum downward ramp per step, as a fraction of existing capacity
    pub ramp_down: HashMap<TechID, f64>,
    /// Energy-to-power ratio of storage technologies
    pub energy_to_power_ratio: HashMap<TechID, f64>,
    /// Initial storage level per (storage technology, zone), as a fraction of energy capacity
    pub initial_storage_level: HashMap<(TechID, ZoneID), f64>,
    /// Capacity factor per (nondispatchable technology, zone, year, month, hour)
    pub capacity_factor: HashMap<(TechID, ZoneID, u32, u32, u32), f64>,
    /// Historical capacity per (zone, technology, age in years at the first planning year)
    pub historical_capacity: HashMap<(ZoneID, TechID, u32), f64>,
    /// Upper bound on existing capacity per (technology, zone); absent means unbounded
    pub capacity_upper_bound: HashMap<(TechID, ZoneID), f64>,
    /// Upper bound on new builds per (technology, zone); absent means unbounded
    pub new_capacity_upper_bound: HashMap<(TechID, ZoneID), f64>,
    /// Lower bound on new builds per (technology, zone); absent means zero
    pub new_capacity_lower_bound: HashMap<(TechID, ZoneID), f64>,
    /// Annual carbon emission limit per (zone, year); absent means unconstrained
    pub carbon_limit: HashMap<(ZoneID, u32), f64>,
    /// The corridor capacity relation; existence of a key makes the pair buildable
    pub corridors: IndexMap<(ZoneID, ZoneID), Corridor>,
    /// Transmission efficiency per directed zone pair
    pub line_efficiency: HashMap<(ZoneID, ZoneID), f64>,
    /// Hydropower stations
    pub stations: IndexMap<StationID, Station>,
    /// Directed travel-time edges of the station network
    pub travel_time_edges: Vec<TravelTimeEdge>,
    /// Natural inflow per (station, year, month, hour)
    pub natural_inflow: HashMap<(StationID, u32, u32, u32), f64>,
    /// Reservoir storage bounds per (station, month, hour)
    pub reservoir_storage_bounds: HashMap<(StationID, u32, u32), StorageBounds>,
    /// Prescribed boundary storage per (station, month)
    pub reservoir_boundary_storage: HashMap<(StationID, u32), BoundaryStorage>,
    /// Forebay level as a function of reservoir volume, per station
    pub forebay_curves: HashMap<StationID, LevelCurve>,
    /// Tailrace level as a function of discharge, per station
    pub tailrace_curves: HashMap<StationID, LevelCurve>,
    /// Exogenous hydropower per (zone, year, month, hour); only valid when the network is off
    pub predefined_hydropower: HashMap<(ZoneID, u32, u32, u32), f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time: TimeConfig {
                years: Vec::new(),
                months: 0,
                hours: 0,
                dt: default_dt(),
                hours_in_year: default_hours_in_year(),
            },
            finance: FinanceConfig {
                discount_rate: 0.05,
                interest_rate: 0.05,
            },
            hydro: HydroConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl Parameters {
    /// Read a model from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Parameters> {
        let params = load_parameters(model_dir.as_ref())?;
        params.validate()?;
        Ok(params)
    }

    /// Check scalar configuration and table coverage.
    ///
    /// Schema errors are raised here, before any set or variable is constructed.
    pub fn validate(&self) -> Result<()> {
        let time = &self.config.time;
        ensure!(!time.years.is_empty(), "years must not be empty");
        ensure!(
            time.years.windows(2).all(|w| w[0] < w[1]),
            "years must be composed of unique values in order"
        );
        ensure!(time.months >= 1, "months must be at least 1");
        ensure!(time.hours >= 1, "hours must be at least 1");
        ensure!(time.dt > 0.0, "dt must be positive");
        ensure!(time.hours_in_year > 0.0, "hours_in_year must be positive");

        let finance = &self.config.finance;
        ensure!(finance.discount_rate > 0.0, "discount_rate must be positive");
        ensure!(finance.interest_rate > 0.0, "interest_rate must be positive");

        let hydro = &self.config.hydro;
        ensure!(
            hydro.error_threshold > 0.0,
            "error_threshold must be positive"
        );
        ensure!(
            hydro.iteration_number >= 1,
            "iteration_number must be at least 1"
        );

        if self.config.solver.name != "highs" {
            bail!("Unsupported solver: {}", self.config.solver.name);
        }

        // Required coverage of per-(technology, year) tables
        for (te, category) in &self.technologies {
            for &y in &time.years {
                for (table, name) in [
                    (&self.investment_cost, "investment cost"),
                    (&self.fixed_om_cost, "fixed O&M cost"),
                    (&self.variable_om_cost, "variable O&M cost"),
                ] {
                    ensure!(
                        table.contains_key(&(te.clone(), y)),
                        "Missing {name} entry for technology {te} in year {y}"
                    );
                }
                ensure!(
                    self.lifetime.contains_key(&(te.clone(), y)),
                    "Missing lifetime entry for technology {te} in year {y}"
                );

                if *category == TechCategory::Storage {
                    for (table, name) in [
                        (&self.charge_efficiency, "charge efficiency"),
                        (&self.discharge_efficiency, "discharge efficiency"),
                    ] {
                        ensure!(
                            table.contains_key(&(te.clone(), y)),
                            "Missing {name} entry for storage technology {te} in year {y}"
                        );
                    }
                }
            }

            if *category == TechCategory::Storage {
                ensure!(
                    self.energy_to_power_ratio.contains_key(te),
                    "Missing energy-to-power ratio for storage technology {te}"
                );
            }
        }

        Ok(())
    }

    /// Iterate over the technologies in the given category
    pub fn techs_of_category(&self, category: TechCategory) -> impl Iterator<Item = &TechID> {
        self.technologies
            .iter()
            .filter(move |(_, c)| **c == category)
            .map(|(te, _)| te)
    }
}

/// Look up a required entry in a sparse table, failing with the offending key.
///
/// Use only for tables whose coverage is NOT established by [`Parameters::validate`].
pub fn require<K, V>(table: &HashMap<K, V>, key: &K, name: &str) -> Result<V>
where
    K: Eq + Hash + Debug,
    V: Copy,
{
    table
        .get(key)
        .copied()
        .with_context(|| format!("Missing entry {key:?} in {name} table"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::simple_parameters;

    #[test]
    fn test_validate_simple() {
        simple_parameters().validate().unwrap();
    }

    #[test]
    fn test_validate_years_ordering() {
        let mut params = simple_parameters();
        params.config.time.years = vec![2030, 2025];
        assert!(params.validate().is_err());

        params.config.time.years = vec![];
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rates() {
        let mut params = simple_parameters();
        params.config.finance.discount_rate = 0.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_unsupported_solver() {
        let mut params = simple_parameters();
        params.config.solver.name = "gurobi".to_string();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_missing_cost_entry() {
        let mut params = simple_parameters();
        let te = TechID::new("coal");
        params.investment_cost.remove(&(te, 2025));
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_require_reports_key() {
        let table: HashMap<(TechID, u32), f64> = HashMap::new();
        let err = require(&table, &(TechID::new("coal"), 2025), "fuel price").unwrap_err();
        assert!(format!("{err}").contains("fuel price"));
    }
}
