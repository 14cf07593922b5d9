//! Shared fixtures for unit tests.
use crate::finance::DiscountFactors;
use crate::id::{StationID, TechID, ZoneID};
use crate::interpolate::LevelCurve;
use crate::model::{build_program, Program};
use crate::parameters::{
    BoundaryStorage, Config, Corridor, FinanceConfig, HydroConfig, Parameters, Station,
    StorageBounds, TechCategory, TimeConfig, TravelTimeEdge,
};
use crate::sets::IndexSets;
use indexmap::indexmap;

fn base_config(hours: u32) -> Config {
    Config {
        time: TimeConfig {
            years: vec![2025],
            months: 1,
            hours,
            dt: 1.0,
            hours_in_year: 8760.0,
        },
        finance: FinanceConfig {
            discount_rate: 0.05,
            interest_rate: 0.05,
        },
        hydro: HydroConfig::default(),
        solver: Default::default(),
    }
}

/// Register one technology with flat per-year cost attributes
fn add_tech(
    params: &mut Parameters,
    id: &str,
    category: TechCategory,
    investment: f64,
    fixed_om: f64,
    variable_om: f64,
    fuel: f64,
    emission: f64,
    lifetime: u32,
) {
    let te = TechID::new(id);
    params.technologies.insert(te.clone(), category);
    for &y in &params.config.time.years.clone() {
        params.investment_cost.insert((te.clone(), y), investment);
        params.fixed_om_cost.insert((te.clone(), y), fixed_om);
        params.variable_om_cost.insert((te.clone(), y), variable_om);
        params.fuel_price.insert((te.clone(), y), fuel);
        params.emission_factor.insert((te.clone(), y), emission);
        params.lifetime.insert((te.clone(), y), lifetime);
    }
}

/// Two zones, one coal technology, one year, two representative hours.
///
/// Demand is 10 and 15 in zone A and zero in zone B; there is no trade, storage or hydro.
pub fn simple_parameters() -> Parameters {
    let mut params = Parameters {
        config: base_config(2),
        ..Parameters::default()
    };
    add_tech(
        &mut params,
        "coal",
        TechCategory::Dispatchable,
        700.0,
        20.0,
        3.0,
        10.0,
        0.9,
        30,
    );

    for (h, demand) in [(1u32, 10.0), (2, 15.0)] {
        params.demand.insert((ZoneID::new("A"), 2025, 1, h), demand);
        params.demand.insert((ZoneID::new("B"), 2025, 1, h), 0.0);
    }

    params
}

/// The simple fixture plus a corridor between the two zones
pub fn transmission_parameters() -> Parameters {
    let mut params = simple_parameters();
    let (a, b) = (ZoneID::new("A"), ZoneID::new("B"));
    let corridor = Corridor {
        existing_capacity: 100.0,
        investment_cost: 500.0,
        fixed_om_cost: 10.0,
        variable_om_cost: 0.1,
        lifetime: 40,
        distance: 250.0,
    };
    params.corridors = indexmap! {
        (a.clone(), b.clone()) => corridor.clone(),
        (b.clone(), a.clone()) => corridor,
    };
    params.line_efficiency.insert((a.clone(), b.clone()), 0.95);
    params.line_efficiency.insert((b, a), 0.95);

    params
}

/// The simple fixture plus a battery storage technology
pub fn storage_parameters() -> Parameters {
    let mut params = simple_parameters();
    add_tech(
        &mut params,
        "battery",
        TechCategory::Storage,
        300.0,
        5.0,
        0.5,
        0.0,
        0.0,
        15,
    );

    let battery = TechID::new("battery");
    params.charge_efficiency.insert((battery.clone(), 2025), 0.95);
    params
        .discharge_efficiency
        .insert((battery.clone(), 2025), 0.95);
    params.energy_to_power_ratio.insert(battery.clone(), 4.0);
    for z in ["A", "B"] {
        params
            .initial_storage_level
            .insert((battery.clone(), ZoneID::new(z)), 0.5);
    }

    params
}

/// One zone with a two-station cascade (up -> down, two-hour delay) over four hours.
///
/// The level curves are flat and consistent with the stations' nominal head, so the head
/// iteration converges immediately unless a test reshapes them.
pub fn hydro_parameters() -> Parameters {
    let mut params = Parameters {
        config: base_config(4),
        ..Parameters::default()
    };
    params.config.hydro = HydroConfig {
        enabled: true,
        error_threshold: 1e-3,
        iteration_number: 5,
        withdrawal_price: 0.0,
    };

    add_tech(
        &mut params,
        "coal",
        TechCategory::Dispatchable,
        700.0,
        20.0,
        3.0,
        10.0,
        0.9,
        30,
    );
    add_tech(
        &mut params,
        "hydro",
        TechCategory::Hydro,
        1.0,
        0.5,
        0.0,
        0.0,
        0.0,
        60,
    );

    for &h in &[1u32, 2, 3, 4] {
        params.demand.insert((ZoneID::new("A"), 2025, 1, h), 10.0);
    }

    for name in ["up", "down"] {
        let s = StationID::new(name);
        params.stations.insert(
            s.clone(),
            Station {
                zone: ZoneID::new("A"),
                nominal_head: 50.0,
                efficiency: 8.5,
                outflow_min: 0.0,
                outflow_max: 1e4,
                genflow_max: 1e4,
                spillflow_max: 1e4,
                power_min: 0.0,
                power_max: 1e4,
            },
        );

        for &h in &[1u32, 2, 3, 4] {
            let inflow = if name == "up" { 10.0 } else { 0.0 };
            params.natural_inflow.insert((s.clone(), 2025, 1, h), inflow);
            params.reservoir_storage_bounds.insert(
                (s.clone(), 1, h),
                StorageBounds {
                    lower: 0.0,
                    upper: 1e8,
                },
            );
        }
        params.reservoir_boundary_storage.insert(
            (s.clone(), 1),
            BoundaryStorage {
                initial: 1e6,
                terminal: 1e6,
            },
        );

        // Flat curves: forebay 60, tailrace 10, matching the nominal head of 50
        params
            .forebay_curves
            .insert(s.clone(), LevelCurve::new(vec![(0.0, 60.0)]).unwrap());
        params
            .tailrace_curves
            .insert(s, LevelCurve::new(vec![(0.0, 10.0)]).unwrap());
    }

    params.travel_time_edges.push(TravelTimeEdge {
        upstream: StationID::new("up"),
        downstream: StationID::new("down"),
        delay: 2.0,
    });

    params
}

/// Assemble the program for [`simple_parameters`]
pub fn build_simple_program() -> Program {
    let params = simple_parameters();
    let sets = IndexSets::build(&params).unwrap();
    let factors = DiscountFactors::calculate(&params, &sets).unwrap();
    build_program(&params, &sets, &factors).unwrap()
}
