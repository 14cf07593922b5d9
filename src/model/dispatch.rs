//! Demand balance, dispatch limits and ramping constraints.
use super::{ConstraintKey, Program, VariableKey};
use crate::parameters::{require, Parameters};
use crate::sets::IndexSets;
use anyhow::Result;
use itertools::iproduct;

/// Add the zonal power balance and the generation constraints for every technology.
pub fn add_constraints(
    program: &mut Program,
    params: &Parameters,
    sets: &IndexSets,
) -> Result<()> {
    let dt = params.config.time.dt;

    for (&h, &m, &y, z) in iproduct!(&sets.hours, &sets.months, &sets.years, &sets.zones) {
        // Demand is met by local generation plus imports, minus exports and storage charging
        let mut terms = Vec::new();
        for te in &sets.techs {
            let generation = program.var(&VariableKey::Generation {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            });
            terms.push((generation, 1.0));
        }
        for te in &sets.storage_techs {
            let charge = program.var(&VariableKey::Charge {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            });
            terms.push((charge, -1.0));
        }
        for (from, to) in &sets.corridors {
            if to == z {
                let import = program.var(&VariableKey::Import {
                    hour: h,
                    month: m,
                    year: y,
                    from: from.clone(),
                    to: to.clone(),
                });
                terms.push((import, 1.0));
            }
            if from == z {
                let export = program.var(&VariableKey::Export {
                    hour: h,
                    month: m,
                    year: y,
                    from: from.clone(),
                    to: to.clone(),
                });
                terms.push((export, -1.0));
            }
        }

        let demand = require(&params.demand, &(z.clone(), y, m, h), "demand")?;
        program.add_eq(
            ConstraintKey::PowerBalance {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
            },
            terms,
            demand,
        );
    }

    for (&h, &m, &y, z, te) in iproduct!(&sets.hours, &sets.months, &sets.years, &sets.zones, &sets.techs)
    {
        let generation = program.var(&VariableKey::Generation {
            hour: h,
            month: m,
            year: y,
            zone: z.clone(),
            tech: te.clone(),
        });
        let cap_existing = program.var(&VariableKey::CapExisting {
            year: y,
            zone: z.clone(),
            tech: te.clone(),
        });

        program.add_le(
            ConstraintKey::GenerationUpperBound {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            },
            vec![(generation, 1.0), (cap_existing, -dt)],
            0.0,
        );

        // Ramping only binds between consecutive hours and only if the rate is limiting
        if h > sets.first_hour() {
            let previous = program.var(&VariableKey::Generation {
                hour: h - 1,
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            });

            if let Some(rate) = params.ramp_up.get(te).map(|r| r * dt).filter(|r| *r < 1.0) {
                program.add_le(
                    ConstraintKey::RampUp {
                        hour: h,
                        month: m,
                        year: y,
                        zone: z.clone(),
                        tech: te.clone(),
                    },
                    vec![(generation, 1.0), (previous, -1.0), (cap_existing, -rate)],
                    0.0,
                );
            }
            if let Some(rate) = params.ramp_down.get(te).map(|r| r * dt).filter(|r| *r < 1.0) {
                program.add_le(
                    ConstraintKey::RampDown {
                        hour: h,
                        month: m,
                        year: y,
                        zone: z.clone(),
                        tech: te.clone(),
                    },
                    vec![(previous, 1.0), (generation, -1.0), (cap_existing, -rate)],
                    0.0,
                );
            }
        }
    }

    // Variable renewables cannot exceed the available resource
    for (&h, &m, &y, z, te) in iproduct!(
        &sets.hours,
        &sets.months,
        &sets.years,
        &sets.zones,
        &sets.nondispatchable_techs
    ) {
        let factor = require(
            &params.capacity_factor,
            &(te.clone(), z.clone(), y, m, h),
            "capacity factor",
        )?;
        let generation = program.var(&VariableKey::Generation {
            hour: h,
            month: m,
            year: y,
            zone: z.clone(),
            tech: te.clone(),
        });
        let cap_existing = program.var(&VariableKey::CapExisting {
            year: y,
            zone: z.clone(),
            tech: te.clone(),
        });

        program.add_le(
            ConstraintKey::RenewableGeneration {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            },
            vec![(generation, 1.0), (cap_existing, -factor * dt)],
            0.0,
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::build_simple_program;
    use crate::id::{TechID, ZoneID};

    #[test]
    fn test_power_balance_rhs_is_demand() {
        let program = build_simple_program();
        let constraint = program
            .constraint(&ConstraintKey::PowerBalance {
                hour: 2,
                month: 1,
                year: 2025,
                zone: ZoneID::new("A"),
            })
            .unwrap();
        assert_eq!(constraint.lower, 15.0);
        assert_eq!(constraint.upper, 15.0);
        // One generation term, no trade or storage terms
        assert_eq!(constraint.terms.len(), 1);
    }

    #[test]
    fn test_ramping_skipped_without_rates() {
        let program = build_simple_program();
        assert!(program
            .constraint(&ConstraintKey::RampUp {
                hour: 2,
                month: 1,
                year: 2025,
                zone: ZoneID::new("A"),
                tech: TechID::new("coal"),
            })
            .is_none());
    }

    #[test]
    fn test_ramping_binds_interior_hours_when_limiting() {
        let mut params = crate::fixture::simple_parameters();
        params.ramp_up.insert(TechID::new("coal"), 0.3);
        params.ramp_down.insert(TechID::new("coal"), 2.0); // not limiting with dt = 1

        let sets = IndexSets::build(&params).unwrap();
        let mut program = Program::default();
        crate::model::add_variables(&mut program, &sets);
        add_constraints(&mut program, &params, &sets).unwrap();

        // No ramp constraint at the first hour
        assert!(program
            .constraint(&ConstraintKey::RampUp {
                hour: 1,
                month: 1,
                year: 2025,
                zone: ZoneID::new("A"),
                tech: TechID::new("coal"),
            })
            .is_none());
        assert!(program
            .constraint(&ConstraintKey::RampUp {
                hour: 2,
                month: 1,
                year: 2025,
                zone: ZoneID::new("A"),
                tech: TechID::new("coal"),
            })
            .is_some());
        // A ramp rate that cannot bind within one step is skipped
        assert!(program
            .constraint(&ConstraintKey::RampDown {
                hour: 2,
                month: 1,
                year: 2025,
                zone: ZoneID::new("A"),
                tech: TechID::new("coal"),
            })
            .is_none());
    }
}
