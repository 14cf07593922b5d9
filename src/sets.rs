//! Construction of the index sets the program is built over.
//!
//! Every compound index tuple used by the constraint builders is derived here, once, from the
//! sparse input relations: plain sets (years, zones, technologies, time indices, stations) and
//! filtered tuples (zone pairs with a corridor entry, technologies by category, upstream
//! neighbours with their delays). A tuple set never contains an entry absent from its filtering
//! relation, so a missing corridor entry can never grow into an expansion-capable edge.
//!
//! All schema and formulation errors are raised here, before any decision variable exists.
use crate::id::{StationID, TechID, ZoneID};
use crate::parameters::{Parameters, TechCategory};
use anyhow::{bail, ensure, Context, Result};
use itertools::iproduct;
use petgraph::algo::toposort;
use petgraph::graph::Graph;
use std::collections::HashMap;

/// Every index domain used by the constraint builders
#[derive(Debug, Default, PartialEq)]
pub struct IndexSets {
    /// Planning years, increasing
    pub years: Vec<u32>,
    /// Representative months, `1..=M`
    pub months: Vec<u32>,
    /// Representative hours, `1..=H`
    pub hours: Vec<u32>,
    /// Hours including the storage boundary index, `0..=H`
    pub hours0: Vec<u32>,
    /// Zones, sorted
    pub zones: Vec<ZoneID>,
    /// All technologies, in input order
    pub techs: Vec<TechID>,
    /// Dispatchable technologies
    pub dispatchable_techs: Vec<TechID>,
    /// Variable-renewable technologies
    pub nondispatchable_techs: Vec<TechID>,
    /// Storage technologies
    pub storage_techs: Vec<TechID>,
    /// Hydropower technologies
    pub hydro_techs: Vec<TechID>,
    /// Directed zone pairs with a corridor entry
    pub corridors: Vec<(ZoneID, ZoneID)>,
    /// Stations of the simulated network; empty when hydropower is exogenous
    pub stations: Vec<StationID>,
    /// Immediate upstream neighbours of each station, with the delay in time steps
    pub upstream: HashMap<StationID, Vec<(StationID, u32)>>,
    /// Number of time steps per day, for re-wrapping long delays
    pub steps_per_day: u32,
}

impl IndexSets {
    /// Build all index sets from the parameter store.
    ///
    /// # Arguments
    ///
    /// * `params` - The validated parameter store
    pub fn build(params: &Parameters) -> Result<IndexSets> {
        let time = &params.config.time;
        let years = time.years.clone();
        let months: Vec<u32> = (1..=time.months).collect();
        let hours: Vec<u32> = (1..=time.hours).collect();
        let hours0: Vec<u32> = (0..=time.hours).collect();

        let mut zones: Vec<ZoneID> = params
            .demand
            .keys()
            .map(|(z, _, _, _)| z.clone())
            .collect();
        zones.sort();
        zones.dedup();
        ensure!(!zones.is_empty(), "Demand table defines no zones");

        // Demand must cover the full grid; a missing entry is a schema error, not zero
        for (z, &y, &m, &h) in iproduct!(&zones, &years, &months, &hours) {
            ensure!(
                params.demand.contains_key(&(z.clone(), y, m, h)),
                "Missing demand entry for zone {z}, year {y}, month {m}, hour {h}"
            );
        }

        let techs: Vec<TechID> = params.technologies.keys().cloned().collect();
        let techs_of = |category| {
            params
                .techs_of_category(category)
                .cloned()
                .collect::<Vec<_>>()
        };
        let hydro_techs = techs_of(TechCategory::Hydro);

        let corridors = build_corridors(params, &zones)?;

        let hydro_network = params.config.hydro.enabled;
        if hydro_network {
            ensure!(
                params.predefined_hydropower.is_empty(),
                "Hydro network simulation and a predefined hydropower table are mutually \
                 exclusive; remove one of them"
            );
            ensure!(
                !hydro_techs.is_empty(),
                "Hydro network simulation is enabled but no technology has the hydro category"
            );
        }
        if !hydro_network && !hydro_techs.is_empty() {
            ensure!(
                !params.predefined_hydropower.is_empty(),
                "Hydro technologies are defined but neither a simulated network nor a \
                 predefined hydropower table is available"
            );
        }

        let (stations, upstream) = if hydro_network {
            build_station_network(params, &zones, &years, &months, &hours)?
        } else {
            (Vec::new(), HashMap::new())
        };

        let steps_per_day = ((24.0 / time.dt) as u32).max(1);

        Ok(IndexSets {
            years,
            months,
            hours,
            hours0,
            zones,
            techs,
            dispatchable_techs: techs_of(TechCategory::Dispatchable),
            nondispatchable_techs: techs_of(TechCategory::NonDispatchable),
            storage_techs: techs_of(TechCategory::Storage),
            hydro_techs,
            corridors,
            stations,
            upstream,
            steps_per_day,
        })
    }

    /// The first representative hour
    pub fn first_hour(&self) -> u32 {
        self.hours[0]
    }

    /// The last representative hour
    pub fn last_hour(&self) -> u32 {
        *self.hours.last().unwrap()
    }

    /// The hour index from which water released `delay_steps` ago arrives at hour `h`.
    ///
    /// The representative period is treated as cyclic: indices falling before the first hour
    /// wrap to the end of the period, shifting forward by whole days while still out of range.
    pub fn delayed_hour(&self, h: u32, delay_steps: u32) -> u32 {
        let first = i64::from(self.first_hour());
        let last = i64::from(self.last_hour());
        let (h, delay) = (i64::from(h), i64::from(delay_steps));

        let mut t = if h - delay >= first {
            h - delay
        } else {
            last + h - delay
        };
        while t < first {
            t += i64::from(self.steps_per_day);
        }
        t as u32
    }
}

/// Build the corridor pair list, cross-checking the efficiency relation
fn build_corridors(params: &Parameters, zones: &[ZoneID]) -> Result<Vec<(ZoneID, ZoneID)>> {
    for (z, z1) in params.corridors.keys() {
        for zone in [z, z1] {
            ensure!(
                zones.binary_search(zone).is_ok(),
                "Transmission line references unknown zone {zone}"
            );
        }
        ensure!(
            params.corridors.contains_key(&(z1.clone(), z.clone())),
            "Transmission line ({z}, {z1}) has no reverse entry ({z1}, {z})"
        );
        ensure!(
            params.line_efficiency.contains_key(&(z.clone(), z1.clone())),
            "Missing transmission efficiency for corridor ({z}, {z1})"
        );
    }

    // The capacity relation is authoritative; efficiency entries must not extend it
    for (z, z1) in params.line_efficiency.keys() {
        if !params.corridors.contains_key(&(z.clone(), z1.clone())) {
            bail!(
                "Transmission efficiency given for ({z}, {z1}), which is not in the \
                 corridor capacity relation"
            );
        }
    }

    Ok(params.corridors.keys().cloned().collect())
}

/// Build the station list and upstream adjacency, validating the network tables
fn build_station_network(
    params: &Parameters,
    zones: &[ZoneID],
    years: &[u32],
    months: &[u32],
    hours: &[u32],
) -> Result<(Vec<StationID>, HashMap<StationID, Vec<(StationID, u32)>>)> {
    let dt = params.config.time.dt;
    let stations: Vec<StationID> = params.stations.keys().cloned().collect();

    for (s, station) in &params.stations {
        ensure!(
            zones.binary_search(&station.zone).is_ok(),
            "Station {s} is assigned to unknown zone {}",
            station.zone
        );
        for (curves, name) in [
            (&params.forebay_curves, "forebay level-volume curve"),
            (&params.tailrace_curves, "tailrace level-discharge curve"),
        ] {
            ensure!(curves.contains_key(s), "Missing {name} for station {s}");
        }

        for &m in months {
            ensure!(
                params
                    .reservoir_boundary_storage
                    .contains_key(&(s.clone(), m)),
                "Missing boundary storage levels for station {s}, month {m}"
            );
            for &h in hours {
                ensure!(
                    params
                        .reservoir_storage_bounds
                        .contains_key(&(s.clone(), m, h)),
                    "Missing reservoir storage bounds for station {s}, month {m}, hour {h}"
                );
            }
        }
        for (&y, &m, &h) in iproduct!(years, months, hours) {
            ensure!(
                params
                    .natural_inflow
                    .contains_key(&(s.clone(), y, m, h)),
                "Missing natural inflow for station {s}, year {y}, month {m}, hour {h}"
            );
        }
    }

    // The travel-time edges must form a directed acyclic graph over known stations
    let mut graph = Graph::new();
    let node_indices: HashMap<&StationID, _> = stations
        .iter()
        .map(|s| (s, graph.add_node(s.clone())))
        .collect();

    let mut upstream: HashMap<StationID, Vec<(StationID, u32)>> = HashMap::new();
    for edge in &params.travel_time_edges {
        for s in [&edge.upstream, &edge.downstream] {
            ensure!(
                params.stations.contains_key(s),
                "Travel-time edge ({}, {}) references unknown station {s}",
                edge.upstream,
                edge.downstream
            );
        }
        ensure!(
            edge.delay >= 0.0,
            "Negative travel time on edge ({}, {})",
            edge.upstream,
            edge.downstream
        );
        graph.add_edge(
            node_indices[&edge.upstream],
            node_indices[&edge.downstream],
            (),
        );

        let delay_steps = (edge.delay / dt) as u32;
        upstream
            .entry(edge.downstream.clone())
            .or_default()
            .push((edge.upstream.clone(), delay_steps));
    }

    toposort(&graph, None)
        .map_err(|cycle| {
            anyhow::anyhow!(
                "Station network contains a cycle through {}",
                graph[cycle.node_id()]
            )
        })
        .context("Invalid travel-time edges")?;

    Ok((stations, upstream))
}
