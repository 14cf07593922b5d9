//! Carbon emission constraints.
use super::{ConstraintKey, Program, VariableKey};
use crate::parameters::{require, Parameters};
use crate::sets::IndexSets;
use anyhow::Result;
use itertools::iproduct;

/// Add an annual emission cap per (year, zone) wherever a limit is defined.
///
/// Annual emissions are the emission-factor-weighted generation over the representative
/// period, scaled up to a full year by the period weight. Zones or years without a limit
/// entry are unconstrained.
pub fn add_constraints(
    program: &mut Program,
    params: &Parameters,
    sets: &IndexSets,
) -> Result<()> {
    let weight = params.config.time.weight();

    for (&y, z) in iproduct!(&sets.years, &sets.zones) {
        let Some(&limit) = params.carbon_limit.get(&(z.clone(), y)) else {
            continue;
        };

        let mut terms = Vec::new();
        for te in &sets.techs {
            let factor = require(&params.emission_factor, &(te.clone(), y), "emission factor")?;
            if factor == 0.0 {
                continue;
            }
            for (&h, &m) in iproduct!(&sets.hours, &sets.months) {
                let generation = program.var(&VariableKey::Generation {
                    hour: h,
                    month: m,
                    year: y,
                    zone: z.clone(),
                    tech: te.clone(),
                });
                terms.push((generation, factor / weight));
            }
        }

        program.add_le(
            ConstraintKey::EmissionLimit {
                year: y,
                zone: z.clone(),
            },
            terms,
            limit,
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ZoneID;
    use crate::model::add_variables;

    #[test]
    fn test_limit_only_where_defined() {
        let mut params = crate::fixture::simple_parameters();
        params.carbon_limit.insert((ZoneID::new("A"), 2025), 1e6);

        let sets = IndexSets::build(&params).unwrap();
        let mut program = Program::default();
        add_variables(&mut program, &sets);
        add_constraints(&mut program, &params, &sets).unwrap();

        let constraint = program
            .constraint(&ConstraintKey::EmissionLimit {
                year: 2025,
                zone: ZoneID::new("A"),
            })
            .unwrap();
        assert_eq!(constraint.upper, 1e6);
        // Two hours of coal generation contribute
        assert_eq!(constraint.terms.len(), 2);

        assert!(program
            .constraint(&ConstraintKey::EmissionLimit {
                year: 2025,
                zone: ZoneID::new("B"),
            })
            .is_none());
    }
}
