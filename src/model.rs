//! The symbolic linear program.
//!
//! Variables and constraints are held in typed registries: each is addressed by a structured
//! key (an enum tag plus its index tuple) rather than by position, so constraint builders and
//! tests can refer to rows and columns without tracking solver indices. The registries are
//! ordered (see [`IndexMap`]), which fixes the column order used when the program is lowered
//! to the solver and read back.
//!
//! The program is built once per run. Between head-iteration solves only the hydropower
//! linearisation coefficients change, via [`Program::update_hydro_coefficients`]; everything
//! else is reused untouched.
use crate::finance::DiscountFactors;
use crate::id::{StationID, TechID, ZoneID};
use crate::parameters::Parameters;
use crate::sets::IndexSets;
use crate::simulation::head_iteration::WaterHead;
use anyhow::Result;
use indexmap::IndexMap;
use itertools::iproduct;

pub mod capacity;
pub mod dispatch;
pub mod emission;
pub mod hydro;
pub mod objective;
pub mod storage;
pub mod transmission;

/// A decision variable's identity: what it measures and at which index tuple
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VariableKey {
    /// Capacity newly built in a planning year
    CapNew {
        /// Year
        year: u32,
        /// Zone
        zone: ZoneID,
        /// Technology
        tech: TechID,
    },
    /// Capacity in service in a planning year
    CapExisting {
        /// Year
        year: u32,
        /// Zone
        zone: ZoneID,
        /// Technology
        tech: TechID,
    },
    /// Corridor capacity newly built in a planning year
    LineCapNew {
        /// Year
        year: u32,
        /// Sending zone
        from: ZoneID,
        /// Receiving zone
        to: ZoneID,
    },
    /// Corridor capacity in service in a planning year
    LineCapExisting {
        /// Year
        year: u32,
        /// Sending zone
        from: ZoneID,
        /// Receiving zone
        to: ZoneID,
    },
    /// Energy generated in a time step
    Generation {
        /// Hour
        hour: u32,
        /// Month
        month: u32,
        /// Year
        year: u32,
        /// Zone
        zone: ZoneID,
        /// Technology
        tech: TechID,
    },
    /// Energy charged into a storage technology in a time step
    Charge {
        /// Hour
        hour: u32,
        /// Month
        month: u32,
        /// Year
        year: u32,
        /// Zone
        zone: ZoneID,
        /// Technology
        tech: TechID,
    },
    /// Stored energy at a step boundary (hour 0 is the month's initial level)
    StorageLevel {
        /// Hour, including the boundary index 0
        hour: u32,
        /// Month
        month: u32,
        /// Year
        year: u32,
        /// Zone
        zone: ZoneID,
        /// Technology
        tech: TechID,
    },
    /// Energy sent along a corridor
    Export {
        /// Hour
        hour: u32,
        /// Month
        month: u32,
        /// Year
        year: u32,
        /// Sending zone
        from: ZoneID,
        /// Receiving zone
        to: ZoneID,
    },
    /// Energy received along a corridor, after losses
    Import {
        /// Hour
        hour: u32,
        /// Month
        month: u32,
        /// Year
        year: u32,
        /// Sending zone
        from: ZoneID,
        /// Receiving zone
        to: ZoneID,
    },
    /// Water flow through a station's turbines
    GenFlow {
        /// Station
        station: StationID,
        /// Hour
        hour: u32,
        /// Month
        month: u32,
        /// Year
        year: u32,
    },
    /// Water flow over a station's spillways
    SpillFlow {
        /// Station
        station: StationID,
        /// Hour
        hour: u32,
        /// Month
        month: u32,
        /// Year
        year: u32,
    },
    /// Water withdrawn from a reservoir for non-power uses
    Withdrawal {
        /// Station
        station: StationID,
        /// Hour
        hour: u32,
        /// Month
        month: u32,
        /// Year
        year: u32,
    },
    /// Reservoir storage at a step boundary (hour 0 is the month's initial volume)
    ReservoirStorage {
        /// Hour, including the boundary index 0
        hour: u32,
        /// Station
        station: StationID,
        /// Month
        month: u32,
        /// Year
        year: u32,
    },
    /// Power output of a station
    StationPower {
        /// Station
        station: StationID,
        /// Hour
        hour: u32,
        /// Month
        month: u32,
        /// Year
        year: u32,
    },
}

/// A constraint's identity, mirroring [`VariableKey`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ConstraintKey {
    /// Existing capacity equals surviving history plus surviving prior builds
    CapacityBalance { year: u32, zone: ZoneID, tech: TechID },
    /// Existing capacity within its predefined bound
    CapacityUpperBound { year: u32, zone: ZoneID, tech: TechID },
    NewCapacityUpperBound { year: u32, zone: ZoneID, tech: TechID },
    NewCapacityLowerBound { year: u32, zone: ZoneID, tech: TechID },
    /// Existing corridor capacity equals surviving history plus surviving prior builds
    LineCapacityBalance { year: u32, from: ZoneID, to: ZoneID },
    /// New corridor capacity is the same asset in both orientations
    LineSymmetry { year: u32, from: ZoneID, to: ZoneID },
    /// Imported energy equals exported energy after losses
    TransBalance { hour: u32, month: u32, year: u32, from: ZoneID, to: ZoneID },
    TransUpperBound { hour: u32, month: u32, year: u32, from: ZoneID, to: ZoneID },
    /// Zonal demand is met by generation, trade and storage
    PowerBalance { hour: u32, month: u32, year: u32, zone: ZoneID },
    GenerationUpperBound { hour: u32, month: u32, year: u32, zone: ZoneID, tech: TechID },
    RampUp { hour: u32, month: u32, year: u32, zone: ZoneID, tech: TechID },
    RampDown { hour: u32, month: u32, year: u32, zone: ZoneID, tech: TechID },
    /// Renewable output within the resource availability
    RenewableGeneration { hour: u32, month: u32, year: u32, zone: ZoneID, tech: TechID },
    StorageBalance { hour: u32, month: u32, year: u32, zone: ZoneID, tech: TechID },
    StorageInitial { month: u32, year: u32, zone: ZoneID, tech: TechID },
    StorageFinal { month: u32, year: u32, zone: ZoneID, tech: TechID },
    StorageUpperBound { hour: u32, month: u32, year: u32, zone: ZoneID, tech: TechID },
    /// Discharge cannot exceed the energy stored at the previous step
    StorageDischarge { hour: u32, month: u32, year: u32, zone: ZoneID, tech: TechID },
    EmissionLimit { year: u32, zone: ZoneID },
    /// Reservoir water balance with delayed upstream arrivals
    WaterBalance { station: StationID, hour: u32, month: u32, year: u32 },
    OutflowLowerBound { station: StationID, hour: u32, month: u32, year: u32 },
    OutflowUpperBound { station: StationID, hour: u32, month: u32, year: u32 },
    GenFlowUpperBound { station: StationID, hour: u32, month: u32, year: u32 },
    SpillFlowUpperBound { station: StationID, hour: u32, month: u32, year: u32 },
    ReservoirStorageLowerBound { station: StationID, hour: u32, month: u32, year: u32 },
    ReservoirStorageUpperBound { station: StationID, hour: u32, month: u32, year: u32 },
    ReservoirInitial { station: StationID, month: u32, year: u32 },
    ReservoirFinal { station: StationID, month: u32, year: u32 },
    /// Station power from generation flow at the current head linearisation point
    PowerGeneration { station: StationID, hour: u32, month: u32, year: u32 },
    PowerLowerBound { station: StationID, hour: u32, month: u32, year: u32 },
    PowerUpperBound { station: StationID, hour: u32, month: u32, year: u32 },
    /// Zonal hydropower equals the stations' aggregated output
    ZoneHydroBalance { hour: u32, month: u32, year: u32, zone: ZoneID },
    /// Zonal hydropower bounded by the predefined series (exogenous mode)
    PredefinedHydro { hour: u32, month: u32, year: u32, zone: ZoneID },
}

/// Index of a variable in the registry, fixing its solver column
pub type VarId = usize;

/// Bounds and objective coefficient of one variable
#[derive(Clone, Debug, PartialEq)]
pub struct VariableDef {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Objective coefficient
    pub objective: f64,
}

/// One linear constraint: `lower <= terms . x <= upper`
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    /// Coefficients by variable index; each variable appears at most once
    pub terms: Vec<(VarId, f64)>,
    /// Lower bound of the row
    pub lower: f64,
    /// Upper bound of the row
    pub upper: f64,
}

/// The assembled linear program
#[derive(Debug, Default, PartialEq)]
pub struct Program {
    variables: IndexMap<VariableKey, VariableDef>,
    constraints: IndexMap<ConstraintKey, Constraint>,
}

impl Program {
    /// Add a non-negative variable, panicking on a duplicate key
    fn add_variable(&mut self, key: VariableKey) {
        let existing = self
            .variables
            .insert(
                key,
                VariableDef {
                    lower: 0.0,
                    upper: f64::INFINITY,
                    objective: 0.0,
                },
            )
            .is_some();
        assert!(!existing, "Duplicate entry for var");
    }

    /// Get the index of the variable for the given key.
    ///
    /// Builders only request variables they created themselves, so a miss is a programming
    /// error.
    pub fn var(&self, key: &VariableKey) -> VarId {
        self.variables
            .get_index_of(key)
            .expect("No variable found for given params")
    }

    /// Add a constraint with the given bounds, folding duplicate variable terms
    pub fn add_constraint(
        &mut self,
        key: ConstraintKey,
        terms: Vec<(VarId, f64)>,
        lower: f64,
        upper: f64,
    ) {
        let mut folded: Vec<(VarId, f64)> = Vec::with_capacity(terms.len());
        for (var, coeff) in terms {
            match folded.iter_mut().find(|(v, _)| *v == var) {
                Some((_, c)) => *c += coeff,
                None => folded.push((var, coeff)),
            }
        }

        let existing = self
            .constraints
            .insert(
                key,
                Constraint {
                    terms: folded,
                    lower,
                    upper,
                },
            )
            .is_some();
        assert!(!existing, "Duplicate entry for constraint");
    }

    /// Add an equality constraint
    pub fn add_eq(&mut self, key: ConstraintKey, terms: Vec<(VarId, f64)>, rhs: f64) {
        self.add_constraint(key, terms, rhs, rhs);
    }

    /// Add a `terms . x <= upper` constraint
    pub fn add_le(&mut self, key: ConstraintKey, terms: Vec<(VarId, f64)>, upper: f64) {
        self.add_constraint(key, terms, f64::NEG_INFINITY, upper);
    }

    /// Add a `terms . x >= lower` constraint
    pub fn add_ge(&mut self, key: ConstraintKey, terms: Vec<(VarId, f64)>, lower: f64) {
        self.add_constraint(key, terms, lower, f64::INFINITY);
    }

    /// Set the objective coefficient of every variable from a key-driven rule
    pub fn set_objective<F>(&mut self, mut coefficient: F) -> Result<()>
    where
        F: FnMut(&VariableKey) -> Result<f64>,
    {
        for (key, def) in &mut self.variables {
            def.objective = coefficient(key)?;
        }
        Ok(())
    }

    /// Re-linearise the head-to-power relation around the given water heads.
    ///
    /// Only the generation-flow coefficient of each station's power constraint is touched;
    /// the rest of the program is reused as built.
    pub fn update_hydro_coefficients(&mut self, params: &Parameters, heads: &WaterHead) {
        for (key, constraint) in &mut self.constraints {
            let ConstraintKey::PowerGeneration {
                station,
                hour,
                month,
                year,
            } = key
            else {
                continue;
            };

            let efficiency = params.stations[station].efficiency;
            let head = heads.get(station, *year, *month, *hour);
            let genflow = self
                .variables
                .get_index_of(&VariableKey::GenFlow {
                    station: station.clone(),
                    hour: *hour,
                    month: *month,
                    year: *year,
                })
                .expect("No variable found for given params");

            let term = constraint
                .terms
                .iter_mut()
                .find(|(var, _)| *var == genflow)
                .expect("Power constraint has no generation flow term");
            term.1 = -efficiency * 1e-3 * head;
        }
    }

    /// Iterate over the variables in column order
    pub fn iter_variables(&self) -> impl Iterator<Item = (&VariableKey, &VariableDef)> {
        self.variables.iter()
    }

    /// Iterate over the constraints in row order
    pub fn iter_constraints(&self) -> impl Iterator<Item = (&ConstraintKey, &Constraint)> {
        self.constraints.iter()
    }

    /// Look up a constraint by key
    pub fn constraint(&self, key: &ConstraintKey) -> Option<&Constraint> {
        self.constraints.get(key)
    }

    /// Number of variables
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of constraints
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}

/// Assemble the full program: variables, every constraint family, and the objective.
///
/// Each constraint family iterates over its pre-filtered index sets, so an empty category
/// (no storage technologies, no corridors, no stations) simply contributes nothing.
pub fn build_program(
    params: &Parameters,
    sets: &IndexSets,
    factors: &DiscountFactors,
) -> Result<Program> {
    let mut program = Program::default();
    add_variables(&mut program, sets);

    capacity::add_constraints(&mut program, params, sets)?;
    dispatch::add_constraints(&mut program, params, sets)?;
    transmission::add_constraints(&mut program, params, sets)?;
    storage::add_constraints(&mut program, params, sets)?;
    emission::add_constraints(&mut program, params, sets)?;
    hydro::add_constraints(&mut program, params, sets)?;

    objective::apply(&mut program, params, factors)?;

    Ok(program)
}

/// Create every decision variable the constraint families refer to
fn add_variables(program: &mut Program, sets: &IndexSets) {
    for (&y, z, te) in iproduct!(&sets.years, &sets.zones, &sets.techs) {
        program.add_variable(VariableKey::CapNew {
            year: y,
            zone: z.clone(),
            tech: te.clone(),
        });
        program.add_variable(VariableKey::CapExisting {
            year: y,
            zone: z.clone(),
            tech: te.clone(),
        });
    }

    for (&y, (z, z1)) in iproduct!(&sets.years, &sets.corridors) {
        program.add_variable(VariableKey::LineCapNew {
            year: y,
            from: z.clone(),
            to: z1.clone(),
        });
        program.add_variable(VariableKey::LineCapExisting {
            year: y,
            from: z.clone(),
            to: z1.clone(),
        });
    }

    for (&h, &m, &y, z, te) in iproduct!(&sets.hours, &sets.months, &sets.years, &sets.zones, &sets.techs)
    {
        program.add_variable(VariableKey::Generation {
            hour: h,
            month: m,
            year: y,
            zone: z.clone(),
            tech: te.clone(),
        });
    }

    for (&m, &y, z, te) in iproduct!(&sets.months, &sets.years, &sets.zones, &sets.storage_techs) {
        for &h in &sets.hours {
            program.add_variable(VariableKey::Charge {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            });
        }
        for &h in &sets.hours0 {
            program.add_variable(VariableKey::StorageLevel {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            });
        }
    }

    for (&h, &m, &y, (z, z1)) in iproduct!(&sets.hours, &sets.months, &sets.years, &sets.corridors)
    {
        program.add_variable(VariableKey::Export {
            hour: h,
            month: m,
            year: y,
            from: z.clone(),
            to: z1.clone(),
        });
        program.add_variable(VariableKey::Import {
            hour: h,
            month: m,
            year: y,
            from: z.clone(),
            to: z1.clone(),
        });
    }

    for (s, &m, &y) in iproduct!(&sets.stations, &sets.months, &sets.years) {
        for &h in &sets.hours {
            program.add_variable(VariableKey::GenFlow {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            });
            program.add_variable(VariableKey::SpillFlow {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            });
            program.add_variable(VariableKey::Withdrawal {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            });
            program.add_variable(VariableKey::StationPower {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            });
        }
        for &h in &sets.hours0 {
            program.add_variable(VariableKey::ReservoirStorage {
                hour: h,
                station: s.clone(),
                month: m,
                year: y,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{build_simple_program, simple_parameters};

    #[test]
    fn test_variable_registry() {
        let params = simple_parameters();
        let sets = IndexSets::build(&params).unwrap();
        let mut program = Program::default();
        add_variables(&mut program, &sets);

        // 2 zones x 1 tech x 1 year x (cap_new + cap_existing + 2 hours of generation)
        assert_eq!(program.num_variables(), 2 * (2 + 2));

        let key = VariableKey::Generation {
            hour: 1,
            month: 1,
            year: 2025,
            zone: ZoneID::new("A"),
            tech: TechID::new("coal"),
        };
        let id = program.var(&key);
        assert_eq!(program.iter_variables().nth(id).unwrap().0, &key);
    }

    #[test]
    #[should_panic(expected = "Duplicate entry for var")]
    fn test_duplicate_variable_panics() {
        let mut program = Program::default();
        let key = VariableKey::CapNew {
            year: 2025,
            zone: ZoneID::new("A"),
            tech: TechID::new("coal"),
        };
        program.add_variable(key.clone());
        program.add_variable(key);
    }

    #[test]
    fn test_add_constraint_folds_duplicate_terms() {
        let mut program = Program::default();
        program.add_variable(VariableKey::CapNew {
            year: 2025,
            zone: ZoneID::new("A"),
            tech: TechID::new("coal"),
        });
        program.add_eq(
            ConstraintKey::CapacityBalance {
                year: 2025,
                zone: ZoneID::new("A"),
                tech: TechID::new("coal"),
            },
            vec![(0, 1.0), (0, 2.0)],
            0.0,
        );

        let constraint = program
            .constraint(&ConstraintKey::CapacityBalance {
                year: 2025,
                zone: ZoneID::new("A"),
                tech: TechID::new("coal"),
            })
            .unwrap();
        assert_eq!(constraint.terms, vec![(0, 3.0)]);
    }

    #[test]
    fn test_build_simple_program() {
        let program = build_simple_program();
        assert!(program.num_constraints() > 0);
        // No storage, transmission or hydro families in the simple fixture
        assert!(program
            .iter_constraints()
            .all(|(key, _)| !matches!(key, ConstraintKey::StorageBalance { .. })));
    }
}
