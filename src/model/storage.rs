//! Energy storage constraints.
//!
//! Storage is symmetric: the same installed capacity limits charging and discharging. All
//! families iterate over the storage technology set, so a model without storage contributes
//! nothing here.
use super::{ConstraintKey, Program, VariableKey};
use crate::parameters::{require, Parameters};
use crate::sets::IndexSets;
use anyhow::Result;
use itertools::iproduct;

/// Add the storage balance, boundary and bound constraints for every storage technology
pub fn add_constraints(
    program: &mut Program,
    params: &Parameters,
    sets: &IndexSets,
) -> Result<()> {
    let dt = params.config.time.dt;

    for (&m, &y, z, te) in iproduct!(&sets.months, &sets.years, &sets.zones, &sets.storage_techs) {
        let discharge_efficiency = require(
            &params.discharge_efficiency,
            &(te.clone(), y),
            "discharge efficiency",
        )?;
        let charge_efficiency = require(
            &params.charge_efficiency,
            &(te.clone(), y),
            "charge efficiency",
        )?;
        let ratio = require(
            &params.energy_to_power_ratio,
            te,
            "energy-to-power ratio",
        )?;
        let cap_existing = program.var(&VariableKey::CapExisting {
            year: y,
            zone: z.clone(),
            tech: te.clone(),
        });

        let storage_at = |program: &Program, h| {
            program.var(&VariableKey::StorageLevel {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            })
        };

        for &h in &sets.hours {
            let storage = storage_at(program, h);
            let previous = storage_at(program, h - 1);
            let generation = program.var(&VariableKey::Generation {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            });
            let charge = program.var(&VariableKey::Charge {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            });

            program.add_eq(
                ConstraintKey::StorageBalance {
                    hour: h,
                    month: m,
                    year: y,
                    zone: z.clone(),
                    tech: te.clone(),
                },
                vec![
                    (storage, 1.0),
                    (previous, -1.0),
                    (generation, 1.0 / discharge_efficiency),
                    (charge, -charge_efficiency),
                ],
                0.0,
            );

            program.add_le(
                ConstraintKey::StorageUpperBound {
                    hour: h,
                    month: m,
                    year: y,
                    zone: z.clone(),
                    tech: te.clone(),
                },
                vec![(storage, 1.0), (cap_existing, -ratio * dt)],
                0.0,
            );

            // What is discharged this step must already be in store
            program.add_le(
                ConstraintKey::StorageDischarge {
                    hour: h,
                    month: m,
                    year: y,
                    zone: z.clone(),
                    tech: te.clone(),
                },
                vec![(generation, 1.0 / discharge_efficiency), (previous, -1.0)],
                0.0,
            );
        }

        let initial_level = require(
            &params.initial_storage_level,
            &(te.clone(), z.clone()),
            "initial storage level",
        )?;
        let first = storage_at(program, 0);
        let last = storage_at(program, sets.last_hour());

        program.add_eq(
            ConstraintKey::StorageInitial {
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            },
            vec![(first, 1.0), (cap_existing, -initial_level * ratio * dt)],
            0.0,
        );
        program.add_eq(
            ConstraintKey::StorageFinal {
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            },
            vec![(last, 1.0), (first, -1.0)],
            0.0,
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::storage_parameters;
    use crate::id::{TechID, ZoneID};
    use crate::model::add_variables;

    #[test]
    fn test_storage_families_built() {
        let params = storage_parameters();
        let sets = IndexSets::build(&params).unwrap();
        let mut program = Program::default();
        add_variables(&mut program, &sets);
        add_constraints(&mut program, &params, &sets).unwrap();

        let key = ConstraintKey::StorageBalance {
            hour: 1,
            month: 1,
            year: 2025,
            zone: ZoneID::new("A"),
            tech: TechID::new("battery"),
        };
        let constraint = program.constraint(&key).unwrap();
        assert_eq!(constraint.terms.len(), 4);

        assert!(program
            .constraint(&ConstraintKey::StorageFinal {
                month: 1,
                year: 2025,
                zone: ZoneID::new("A"),
                tech: TechID::new("battery"),
            })
            .is_some());
    }

    #[test]
    fn test_no_storage_techs_is_a_noop() {
        let params = crate::fixture::simple_parameters();
        let sets = IndexSets::build(&params).unwrap();
        let mut program = Program::default();
        add_variables(&mut program, &sets);
        add_constraints(&mut program, &params, &sets).unwrap();
        assert_eq!(program.num_constraints(), 0);
    }
}
