//! Hydropower network constraints.
//!
//! In network mode every station gets a water balance with time-lagged arrivals from its
//! upstream neighbours, outflow decomposition and bounds, reservoir storage bounds and
//! boundary conditions, and the head-linearised power relation whose coefficient the head
//! iteration re-points between solves. Zone-level hydropower is the aggregated station
//! output. When the network is off, zonal hydropower is instead bounded by the predefined
//! series.
use super::{ConstraintKey, Program, VariableKey};
use crate::id::StationID;
use crate::parameters::{require, Parameters};
use crate::sets::IndexSets;
use anyhow::Result;
use itertools::iproduct;

/// Add all hydropower constraint families
pub fn add_constraints(
    program: &mut Program,
    params: &Parameters,
    sets: &IndexSets,
) -> Result<()> {
    if sets.stations.is_empty() {
        return add_predefined_bounds(program, params, sets);
    }

    add_station_constraints(program, params, sets)?;
    add_zone_aggregation(program, params, sets);
    Ok(())
}

/// The per-station flow, storage and power constraints
fn add_station_constraints(
    program: &mut Program,
    params: &Parameters,
    sets: &IndexSets,
) -> Result<()> {
    let dt = params.config.time.dt;
    // Volume moved by one unit of flow over one step
    let flow_volume = 3600.0 * dt;

    for (s, &h, &m, &y) in iproduct!(&sets.stations, &sets.hours, &sets.months, &sets.years) {
        let station = &params.stations[s];
        let flow_at = |program: &Program, key: fn(StationID, u32, u32, u32) -> VariableKey,
                       s: &StationID,
                       h: u32| program.var(&key(s.clone(), h, m, y));

        let genflow = flow_at(program, make_genflow, s, h);
        let spillflow = flow_at(program, make_spillflow, s, h);
        let withdrawal = program.var(&VariableKey::Withdrawal {
            station: s.clone(),
            hour: h,
            month: m,
            year: y,
        });
        let storage = program.var(&VariableKey::ReservoirStorage {
            hour: h,
            station: s.clone(),
            month: m,
            year: y,
        });
        let storage_previous = program.var(&VariableKey::ReservoirStorage {
            hour: h - 1,
            station: s.clone(),
            month: m,
            year: y,
        });

        // Water balance: the change in storage over the step is the volume of total inflow
        // less total outflow and withdrawal. Total inflow combines the natural inflow with
        // each upstream neighbour's outflow, delayed by the edge's travel time; delayed
        // indices wrap to the end of the representative period.
        let mut terms = vec![
            (storage, 1.0),
            (storage_previous, -1.0),
            (genflow, flow_volume),
            (spillflow, flow_volume),
            (withdrawal, flow_volume),
        ];
        if let Some(upstream) = sets.upstream.get(s) {
            for (u, delay_steps) in upstream {
                let t = sets.delayed_hour(h, *delay_steps);
                terms.push((flow_at(program, make_genflow, u, t), -flow_volume));
                terms.push((flow_at(program, make_spillflow, u, t), -flow_volume));
            }
        }
        let natural = require(
            &params.natural_inflow,
            &(s.clone(), y, m, h),
            "natural inflow",
        )?;
        program.add_eq(
            ConstraintKey::WaterBalance {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            },
            terms,
            flow_volume * natural,
        );

        // Outflow decomposition bounds: each component against its own maximum, the total
        // against the required release range
        program.add_ge(
            ConstraintKey::OutflowLowerBound {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            },
            vec![(genflow, 1.0), (spillflow, 1.0)],
            station.outflow_min,
        );
        program.add_le(
            ConstraintKey::OutflowUpperBound {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            },
            vec![(genflow, 1.0), (spillflow, 1.0)],
            station.outflow_max,
        );
        program.add_le(
            ConstraintKey::GenFlowUpperBound {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            },
            vec![(genflow, 1.0)],
            station.genflow_max,
        );
        program.add_le(
            ConstraintKey::SpillFlowUpperBound {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            },
            vec![(spillflow, 1.0)],
            station.spillflow_max,
        );

        let bounds = require(
            &params.reservoir_storage_bounds,
            &(s.clone(), m, h),
            "reservoir storage bounds",
        )?;
        program.add_ge(
            ConstraintKey::ReservoirStorageLowerBound {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            },
            vec![(storage, 1.0)],
            bounds.lower,
        );
        program.add_le(
            ConstraintKey::ReservoirStorageUpperBound {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            },
            vec![(storage, 1.0)],
            bounds.upper,
        );

        // Power from generation flow, linearised around the seed head; the head iteration
        // re-points the genflow coefficient before each solve
        let power = program.var(&VariableKey::StationPower {
            station: s.clone(),
            hour: h,
            month: m,
            year: y,
        });
        program.add_eq(
            ConstraintKey::PowerGeneration {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            },
            vec![
                (power, 1.0),
                (genflow, -station.efficiency * 1e-3 * station.nominal_head),
            ],
            0.0,
        );
        program.add_ge(
            ConstraintKey::PowerLowerBound {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            },
            vec![(power, 1.0)],
            station.power_min,
        );
        program.add_le(
            ConstraintKey::PowerUpperBound {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            },
            vec![(power, 1.0)],
            station.power_max,
        );
    }

    // Storage is pinned to the prescribed levels at the month boundaries
    for (s, &m, &y) in iproduct!(&sets.stations, &sets.months, &sets.years) {
        let boundary = require(
            &params.reservoir_boundary_storage,
            &(s.clone(), m),
            "reservoir boundary storage",
        )?;
        let first = program.var(&VariableKey::ReservoirStorage {
            hour: 0,
            station: s.clone(),
            month: m,
            year: y,
        });
        let last = program.var(&VariableKey::ReservoirStorage {
            hour: sets.last_hour(),
            station: s.clone(),
            month: m,
            year: y,
        });

        program.add_eq(
            ConstraintKey::ReservoirInitial {
                station: s.clone(),
                month: m,
                year: y,
            },
            vec![(first, 1.0)],
            boundary.initial,
        );
        program.add_eq(
            ConstraintKey::ReservoirFinal {
                station: s.clone(),
                month: m,
                year: y,
            },
            vec![(last, 1.0)],
            boundary.terminal,
        );
    }

    Ok(())
}

/// Zonal hydropower generation equals the summed station output, scaled by the step length
fn add_zone_aggregation(program: &mut Program, params: &Parameters, sets: &IndexSets) {
    let Some(hydro_tech) = sets.hydro_techs.first() else {
        return;
    };
    let dt = params.config.time.dt;

    for (&h, &m, &y, z) in iproduct!(&sets.hours, &sets.months, &sets.years, &sets.zones) {
        let generation = program.var(&VariableKey::Generation {
            hour: h,
            month: m,
            year: y,
            zone: z.clone(),
            tech: hydro_tech.clone(),
        });

        let mut terms = vec![(generation, 1.0)];
        for s in &sets.stations {
            if params.stations[s].zone != *z {
                continue;
            }
            let power = program.var(&VariableKey::StationPower {
                station: s.clone(),
                hour: h,
                month: m,
                year: y,
            });
            terms.push((power, -dt));
        }

        program.add_eq(
            ConstraintKey::ZoneHydroBalance {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
            },
            terms,
            0.0,
        );
    }
}

/// Exogenous mode: zonal hydropower is bounded by the predefined series
fn add_predefined_bounds(
    program: &mut Program,
    params: &Parameters,
    sets: &IndexSets,
) -> Result<()> {
    let Some(hydro_tech) = sets.hydro_techs.first() else {
        return Ok(());
    };
    let dt = params.config.time.dt;

    for (&h, &m, &y, z) in iproduct!(&sets.hours, &sets.months, &sets.years, &sets.zones) {
        let bound = require(
            &params.predefined_hydropower,
            &(z.clone(), y, m, h),
            "predefined hydropower",
        )?;
        let generation = program.var(&VariableKey::Generation {
            hour: h,
            month: m,
            year: y,
            zone: z.clone(),
            tech: hydro_tech.clone(),
        });

        program.add_le(
            ConstraintKey::PredefinedHydro {
                hour: h,
                month: m,
                year: y,
                zone: z.clone(),
            },
            vec![(generation, 1.0)],
            bound * dt,
        );
    }

    Ok(())
}

fn make_genflow(station: StationID, hour: u32, month: u32, year: u32) -> VariableKey {
    VariableKey::GenFlow {
        station,
        hour,
        month,
        year,
    }
}

fn make_spillflow(station: StationID, hour: u32, month: u32, year: u32) -> VariableKey {
    VariableKey::SpillFlow {
        station,
        hour,
        month,
        year,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::hydro_parameters;
    use crate::id::ZoneID;
    use crate::model::add_variables;

    fn build() -> (Program, crate::parameters::Parameters, IndexSets) {
        let params = hydro_parameters();
        let sets = IndexSets::build(&params).unwrap();
        let mut program = Program::default();
        add_variables(&mut program, &sets);
        add_constraints(&mut program, &params, &sets).unwrap();
        (program, params, sets)
    }

    #[test]
    fn test_cascade_delay() {
        let (program, _, _) = build();
        let down = StationID::new("down");
        let up = StationID::new("up");

        // The fixture's edge has a two-hour delay, so the balance at hour 3 must reference
        // the upstream outflow at hour 1
        let constraint = program
            .constraint(&ConstraintKey::WaterBalance {
                station: down.clone(),
                hour: 3,
                month: 1,
                year: 2025,
            })
            .unwrap();
        let upstream_genflow = program.var(&make_genflow(up.clone(), 1, 1, 2025));
        assert!(constraint.terms.contains(&(upstream_genflow, -3600.0)));

        // At hour 1 the delayed index falls before the period start and wraps to its end:
        // 4 + 1 - 2 = 3
        let constraint = program
            .constraint(&ConstraintKey::WaterBalance {
                station: down,
                hour: 1,
                month: 1,
                year: 2025,
            })
            .unwrap();
        let wrapped_genflow = program.var(&make_genflow(up, 3, 1, 2025));
        assert!(constraint.terms.contains(&(wrapped_genflow, -3600.0)));
    }

    #[test]
    fn test_water_balance_round_trip() {
        let (program, _, _) = build();

        // With no natural inflow the balance reduces to storage(h) == storage(h-1) plus the
        // flow terms; zero flows keep storage constant over the step
        let constraint = program
            .constraint(&ConstraintKey::WaterBalance {
                station: StationID::new("down"),
                hour: 2,
                month: 1,
                year: 2025,
            })
            .unwrap();
        assert_eq!(constraint.lower, 0.0);

        let storage = program.var(&VariableKey::ReservoirStorage {
            hour: 2,
            station: StationID::new("down"),
            month: 1,
            year: 2025,
        });
        let previous = program.var(&VariableKey::ReservoirStorage {
            hour: 1,
            station: StationID::new("down"),
            month: 1,
            year: 2025,
        });
        assert!(constraint.terms.contains(&(storage, 1.0)));
        assert!(constraint.terms.contains(&(previous, -1.0)));
    }

    #[test]
    fn test_power_linearised_at_seed_head() {
        let (program, params, _) = build();
        let up = StationID::new("up");
        let station = &params.stations[&up];

        let constraint = program
            .constraint(&ConstraintKey::PowerGeneration {
                station: up.clone(),
                hour: 1,
                month: 1,
                year: 2025,
            })
            .unwrap();
        let genflow = program.var(&make_genflow(up, 1, 1, 2025));
        let expected = -station.efficiency * 1e-3 * station.nominal_head;
        assert!(constraint.terms.contains(&(genflow, expected)));
    }

    #[test]
    fn test_zone_aggregation_scales_by_dt() {
        let (program, _, _) = build();
        let constraint = program
            .constraint(&ConstraintKey::ZoneHydroBalance {
                hour: 1,
                month: 1,
                year: 2025,
                zone: ZoneID::new("A"),
            })
            .unwrap();
        // Generation plus both stations' power
        assert_eq!(constraint.terms.len(), 3);
        assert!(constraint.terms.iter().filter(|(_, c)| *c == -1.0).count() == 2);
    }

    #[test]
    fn test_predefined_mode() {
        let mut params = hydro_parameters();
        params.config.hydro.enabled = false;
        params.stations.clear();
        params.travel_time_edges.clear();
        for (&h, z) in iproduct!(&[1u32, 2, 3, 4], ["A"]) {
            params
                .predefined_hydropower
                .insert((ZoneID::new(z), 2025, 1, h), 5.0);
        }

        let sets = IndexSets::build(&params).unwrap();
        let mut program = Program::default();
        add_variables(&mut program, &sets);
        add_constraints(&mut program, &params, &sets).unwrap();

        let constraint = program
            .constraint(&ConstraintKey::PredefinedHydro {
                hour: 1,
                month: 1,
                year: 2025,
                zone: ZoneID::new("A"),
            })
            .unwrap();
        assert_eq!(constraint.upper, 5.0);
        assert!(program
            .constraint(&ConstraintKey::WaterBalance {
                station: StationID::new("up"),
                hour: 1,
                month: 1,
                year: 2025,
            })
            .is_none());
    }
}
