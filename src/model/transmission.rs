//! Transmission corridor constraints.
use super::{ConstraintKey, Program, VariableKey};
use crate::parameters::{require, Parameters};
use crate::sets::IndexSets;
use crate::vintage::{surviving_existing_line_capacity, surviving_line_build_years};
use anyhow::Result;
use itertools::iproduct;

/// Add the corridor capacity accounting, symmetry and transfer constraints.
///
/// All families iterate over the corridor relation; zone pairs without an entry get no
/// variables and no constraints, so they can never carry power or capacity.
pub fn add_constraints(
    program: &mut Program,
    params: &Parameters,
    sets: &IndexSets,
) -> Result<()> {
    let dt = params.config.time.dt;
    let y_min = sets.years[0];

    for (&y, (z, z1)) in iproduct!(&sets.years, &sets.corridors) {
        let corridor = &params.corridors[&(z.clone(), z1.clone())];
        let line_cap_existing = program.var(&VariableKey::LineCapExisting {
            year: y,
            from: z.clone(),
            to: z1.clone(),
        });

        let mut terms = vec![(line_cap_existing, 1.0)];
        for yy in surviving_line_build_years(&sets.years, corridor.lifetime, y) {
            let line_cap_new = program.var(&VariableKey::LineCapNew {
                year: yy,
                from: z.clone(),
                to: z1.clone(),
            });
            terms.push((line_cap_new, -1.0));
        }
        program.add_eq(
            ConstraintKey::LineCapacityBalance {
                year: y,
                from: z.clone(),
                to: z1.clone(),
            },
            terms,
            surviving_existing_line_capacity(corridor, y_min, y),
        );

        // A line built from z to z1 is the same asset as one from z1 to z; one row per
        // unordered pair
        if z < z1 {
            let forward = program.var(&VariableKey::LineCapNew {
                year: y,
                from: z.clone(),
                to: z1.clone(),
            });
            let reverse = program.var(&VariableKey::LineCapNew {
                year: y,
                from: z1.clone(),
                to: z.clone(),
            });
            program.add_eq(
                ConstraintKey::LineSymmetry {
                    year: y,
                    from: z.clone(),
                    to: z1.clone(),
                },
                vec![(forward, 1.0), (reverse, -1.0)],
                0.0,
            );
        }
    }

    for (&h, &m, &y, (z, z1)) in iproduct!(&sets.hours, &sets.months, &sets.years, &sets.corridors)
    {
        let efficiency = require(
            &params.line_efficiency,
            &(z.clone(), z1.clone()),
            "transmission efficiency",
        )?;
        let export = program.var(&VariableKey::Export {
            hour: h,
            month: m,
            year: y,
            from: z.clone(),
            to: z1.clone(),
        });
        let import = program.var(&VariableKey::Import {
            hour: h,
            month: m,
            year: y,
            from: z.clone(),
            to: z1.clone(),
        });
        let line_cap_existing = program.var(&VariableKey::LineCapExisting {
            year: y,
            from: z.clone(),
            to: z1.clone(),
        });

        program.add_eq(
            ConstraintKey::TransBalance {
                hour: h,
                month: m,
                year: y,
                from: z.clone(),
                to: z1.clone(),
            },
            vec![(export, efficiency), (import, -1.0)],
            0.0,
        );

        // Transfers in each direction are limited by that direction's corridor capacity
        program.add_le(
            ConstraintKey::TransUpperBound {
                hour: h,
                month: m,
                year: y,
                from: z.clone(),
                to: z1.clone(),
            },
            vec![(export, 1.0), (line_cap_existing, -dt)],
            0.0,
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::transmission_parameters;
    use crate::id::ZoneID;
    use crate::model::add_variables;

    fn build() -> Program {
        let params = transmission_parameters();
        let sets = IndexSets::build(&params).unwrap();
        let mut program = Program::default();
        add_variables(&mut program, &sets);
        add_constraints(&mut program, &params, &sets).unwrap();
        program
    }

    #[test]
    fn test_symmetry_row_per_unordered_pair() {
        let program = build();
        let (a, b) = (ZoneID::new("A"), ZoneID::new("B"));

        let symmetry = program
            .constraint(&ConstraintKey::LineSymmetry {
                year: 2025,
                from: a.clone(),
                to: b.clone(),
            })
            .unwrap();
        let forward = program.var(&VariableKey::LineCapNew {
            year: 2025,
            from: a.clone(),
            to: b.clone(),
        });
        let reverse = program.var(&VariableKey::LineCapNew {
            year: 2025,
            from: b.clone(),
            to: a.clone(),
        });
        assert_eq!(symmetry.terms, vec![(forward, 1.0), (reverse, -1.0)]);

        // The reverse orientation shares the row instead of getting its own
        assert!(program
            .constraint(&ConstraintKey::LineSymmetry {
                year: 2025,
                from: b,
                to: a,
            })
            .is_none());
    }

    #[test]
    fn test_balance_applies_efficiency() {
        let program = build();
        let constraint = program
            .constraint(&ConstraintKey::TransBalance {
                hour: 1,
                month: 1,
                year: 2025,
                from: ZoneID::new("A"),
                to: ZoneID::new("B"),
            })
            .unwrap();
        let export = program.var(&VariableKey::Export {
            hour: 1,
            month: 1,
            year: 2025,
            from: ZoneID::new("A"),
            to: ZoneID::new("B"),
        });
        assert!(constraint
            .terms
            .contains(&(export, 0.95)));
    }

    #[test]
    fn test_existing_line_on_rhs() {
        let program = build();
        let constraint = program
            .constraint(&ConstraintKey::LineCapacityBalance {
                year: 2025,
                from: ZoneID::new("A"),
                to: ZoneID::new("B"),
            })
            .unwrap();
        assert_eq!(constraint.lower, 100.0);
    }
}
