//! Capacity accounting and investment bound constraints.
use super::{ConstraintKey, Program, VariableKey};
use crate::parameters::Parameters;
use crate::sets::IndexSets;
use crate::vintage::{surviving_build_years, surviving_historical};
use anyhow::Result;
use itertools::iproduct;

/// Add the vintage balance and the capacity bound constraints for every technology.
///
/// The balance ties the existing-capacity variable to the surviving prior builds, with the
/// surviving historical cohorts (a constant) on the right-hand side. The survivor subsets are
/// recomputed per year; they shrink as the horizon advances.
pub fn add_constraints(
    program: &mut Program,
    params: &Parameters,
    sets: &IndexSets,
) -> Result<()> {
    let y_min = sets.years[0];

    for (&y, z, te) in iproduct!(&sets.years, &sets.zones, &sets.techs) {
        let cap_existing = program.var(&VariableKey::CapExisting {
            year: y,
            zone: z.clone(),
            tech: te.clone(),
        });

        let mut terms = vec![(cap_existing, 1.0)];
        for yy in surviving_build_years(params, &sets.years, y, te)? {
            let cap_new = program.var(&VariableKey::CapNew {
                year: yy,
                zone: z.clone(),
                tech: te.clone(),
            });
            terms.push((cap_new, -1.0));
        }

        program.add_eq(
            ConstraintKey::CapacityBalance {
                year: y,
                zone: z.clone(),
                tech: te.clone(),
            },
            terms,
            surviving_historical(params, y_min, y, z, te)?,
        );

        // Bounds are sparse: an absent entry means unbounded (or zero for the lower bound)
        if let Some(&bound) = params.capacity_upper_bound.get(&(te.clone(), z.clone())) {
            program.add_le(
                ConstraintKey::CapacityUpperBound {
                    year: y,
                    zone: z.clone(),
                    tech: te.clone(),
                },
                vec![(cap_existing, 1.0)],
                bound,
            );
        }

        let cap_new = program.var(&VariableKey::CapNew {
            year: y,
            zone: z.clone(),
            tech: te.clone(),
        });
        if let Some(&bound) = params.new_capacity_upper_bound.get(&(te.clone(), z.clone())) {
            program.add_le(
                ConstraintKey::NewCapacityUpperBound {
                    year: y,
                    zone: z.clone(),
                    tech: te.clone(),
                },
                vec![(cap_new, 1.0)],
                bound,
            );
        }
        if let Some(&bound) = params.new_capacity_lower_bound.get(&(te.clone(), z.clone())) {
            program.add_ge(
                ConstraintKey::NewCapacityLowerBound {
                    year: y,
                    zone: z.clone(),
                    tech: te.clone(),
                },
                vec![(cap_new, 1.0)],
                bound,
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{TechID, ZoneID};
    use crate::model::add_variables;

    #[test]
    fn test_capacity_balance_survivors() {
        let mut params = crate::fixture::simple_parameters();
        params.config.time.years = vec![2025, 2030, 2045];
        let coal = TechID::new("coal");
        for y in [2030, 2045] {
            params.lifetime.insert((coal.clone(), y), 10);
            for table in [
                &mut params.investment_cost,
                &mut params.fixed_om_cost,
                &mut params.variable_om_cost,
                &mut params.fuel_price,
                &mut params.emission_factor,
            ] {
                table.insert((coal.clone(), y), 1.0);
            }
            for (z, &h) in iproduct!(["A", "B"], &[1, 2]) {
                params.demand.insert((ZoneID::new(z), y, 1, h), 10.0);
            }
        }
        params
            .historical_capacity
            .insert((ZoneID::new("A"), coal.clone(), 0), 40.0);

        let sets = IndexSets::build(&params).unwrap();
        let mut program = Program::default();
        add_variables(&mut program, &sets);
        add_constraints(&mut program, &params, &sets).unwrap();

        // In 2045, the 2025 build (age 20 > lifetime 10) is excluded; so is all history
        let constraint = program
            .constraint(&ConstraintKey::CapacityBalance {
                year: 2045,
                zone: ZoneID::new("A"),
                tech: coal.clone(),
            })
            .unwrap();
        assert_eq!(constraint.lower, 0.0);
        let surviving_builds = constraint.terms.iter().filter(|(_, c)| *c == -1.0).count();
        assert_eq!(surviving_builds, 1); // only the 2045 build itself

        // In 2025 the historical cohort is alive and sits on the right-hand side
        let constraint = program
            .constraint(&ConstraintKey::CapacityBalance {
                year: 2025,
                zone: ZoneID::new("A"),
                tech: coal,
            })
            .unwrap();
        assert_eq!(constraint.lower, 40.0);
    }

    #[test]
    fn test_bounds_only_where_defined() {
        let mut params = crate::fixture::simple_parameters();
        params
            .new_capacity_upper_bound
            .insert((TechID::new("coal"), ZoneID::new("A")), 50.0);

        let sets = IndexSets::build(&params).unwrap();
        let mut program = Program::default();
        add_variables(&mut program, &sets);
        add_constraints(&mut program, &params, &sets).unwrap();

        assert!(program
            .constraint(&ConstraintKey::NewCapacityUpperBound {
                year: 2025,
                zone: ZoneID::new("A"),
                tech: TechID::new("coal"),
            })
            .is_some());
        assert!(program
            .constraint(&ConstraintKey::NewCapacityUpperBound {
                year: 2025,
                zone: ZoneID::new("B"),
                tech: TechID::new("coal"),
            })
            .is_none());
    }
}
