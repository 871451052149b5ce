//! Historical Pattern Extractor
//!
//! Derives everything the builders need from the historical status table:
//! each carrier's main heading and its share, hourly traffic counts, the set of
//! observed carrier/heading pairs, wide-body ratios per heading and the hourly
//! target distribution. Computed once per run and shared by reference.

use crate::model::{BodyClass, HistoricalRecord, Stage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Dominant heading of one carrier in one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainRoute {
    pub route: String,
    /// Main-heading count divided by the carrier's stage total
    pub share: f64,
}

/// Cell of the fine-grained hourly distribution
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetKey {
    pub carrier: String,
    pub route: String,
    pub body: BodyClass,
    pub hour: u32,
}

/// Target share of stage traffic per (carrier, heading, body class, hour)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetTable {
    cells: BTreeMap<TargetKey, f64>,
}

impl TargetTable {
    pub fn new() -> Self {
        TargetTable::default()
    }

    pub fn insert(&mut self, key: TargetKey, share: f64) {
        self.cells.insert(key, share);
    }

    /// Share of each historical cell in the stage's total traffic
    pub fn derive<'a>(records: impl IntoIterator<Item = &'a HistoricalRecord>) -> Self {
        let mut counts: BTreeMap<TargetKey, u32> = BTreeMap::new();
        let mut total = 0u32;
        for record in records {
            total += 1;
            let Some(hour) = record.hour() else {
                continue;
            };
            let key = TargetKey {
                carrier: record.carrier.clone(),
                route: record.route.clone(),
                body: record.aircraft.body_class(),
                hour,
            };
            *counts.entry(key).or_insert(0) += 1;
        }

        let mut table = TargetTable::new();
        if total == 0 {
            return table;
        }
        for (key, count) in counts {
            table.insert(key, count as f64 / total as f64);
        }
        table
    }

    pub fn get(&self, key: &TargetKey) -> f64 {
        self.cells.get(key).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TargetKey, f64)> {
        self.cells.iter().map(|(k, &v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct StageProfile {
    main_routes: BTreeMap<String, MainRoute>,
    hourly: BTreeMap<String, [u32; 24]>,
    /// carrier → headings observed
    pairs: BTreeMap<String, BTreeSet<String>>,
    /// heading → (wide-body count, total)
    route_body: BTreeMap<String, (u32, u32)>,
    targets: TargetTable,
}

/// Read-only lookup tables derived from history
#[derive(Debug, Clone, Default)]
pub struct HistoricalProfile {
    stages: BTreeMap<Stage, StageProfile>,
}

impl HistoricalProfile {
    /// Build the profile. Target tables given in `provided` replace the ones
    /// derived from the records; the catch-all carrier never gets a main heading.
    pub fn extract(
        records: &[HistoricalRecord],
        catch_all: &str,
        provided: &BTreeMap<Stage, TargetTable>,
    ) -> Self {
        let mut by_stage: BTreeMap<Stage, Vec<&HistoricalRecord>> = BTreeMap::new();
        for record in records {
            by_stage.entry(record.stage()).or_default().push(record);
        }

        let mut stages = BTreeMap::new();
        for stage in Stage::PIPELINE {
            let stage_records = by_stage.remove(&stage).unwrap_or_default();
            let profile =
                Self::extract_stage(stage, &stage_records, catch_all, provided.get(&stage));
            stages.insert(stage, profile);
        }

        info!(records = records.len(), "Historical profile extracted");
        HistoricalProfile { stages }
    }

    fn extract_stage(
        stage: Stage,
        records: &[&HistoricalRecord],
        catch_all: &str,
        provided: Option<&TargetTable>,
    ) -> StageProfile {
        let mut profile = StageProfile::default();
        let mut route_counts: BTreeMap<&str, BTreeMap<&str, u32>> = BTreeMap::new();

        for record in records {
            *route_counts
                .entry(record.carrier.as_str())
                .or_default()
                .entry(record.route.as_str())
                .or_insert(0) += 1;

            profile
                .pairs
                .entry(record.carrier.clone())
                .or_default()
                .insert(record.route.clone());

            let body = profile.route_body.entry(record.route.clone()).or_insert((0, 0));
            body.1 += 1;
            if record.aircraft.is_wide_body() {
                body.0 += 1;
            }

            if let Some(hour) = record.hour() {
                profile
                    .hourly
                    .entry(record.carrier.clone())
                    .or_insert([0; 24])[hour as usize] += 1;
            }
        }

        for (carrier, routes) in &route_counts {
            if *carrier == catch_all {
                continue;
            }
            if let Some(main) = main_route(routes) {
                debug!(%stage, carrier, route = %main.route, share = main.share, "Main heading");
                profile.main_routes.insert(carrier.to_string(), main);
            }
        }

        profile.targets = match provided {
            Some(table) => table.clone(),
            None => TargetTable::derive(records.iter().copied()),
        };
        profile
    }

    pub fn main_route(&self, stage: Stage, carrier: &str) -> Option<&MainRoute> {
        self.stages.get(&stage)?.main_routes.get(carrier)
    }

    /// Historical flights of a carrier in an hour bucket
    pub fn hourly_count(&self, stage: Stage, carrier: &str, hour: u32) -> u32 {
        self.hourly_counts(stage, carrier)
            .and_then(|counts| counts.get(hour as usize).copied())
            .unwrap_or(0)
    }

    pub fn hourly_counts(&self, stage: Stage, carrier: &str) -> Option<&[u32; 24]> {
        self.stages.get(&stage)?.hourly.get(carrier)
    }

    /// Whether the carrier flew the heading in this stage
    pub fn is_observed_pair(&self, stage: Stage, carrier: &str, route: &str) -> bool {
        self.stages
            .get(&stage)
            .and_then(|s| s.pairs.get(carrier))
            .is_some_and(|routes| routes.contains(route))
    }

    /// Historical wide-body share of a heading, `None` without history
    pub fn wide_ratio(&self, stage: Stage, route: &str) -> Option<f64> {
        let &(wide, total) = self.stages.get(&stage)?.route_body.get(route)?;
        if total == 0 {
            return None;
        }
        Some(wide as f64 / total as f64)
    }

    pub fn targets(&self, stage: Stage) -> Option<&TargetTable> {
        self.stages.get(&stage).map(|s| &s.targets)
    }
}

/// Heading with the highest count; ties go to the first heading in name order
fn main_route(routes: &BTreeMap<&str, u32>) -> Option<MainRoute> {
    let total: u32 = routes.values().sum();
    if total == 0 {
        return None;
    }
    let mut best: Option<(&str, u32)> = None;
    for (&route, &count) in routes {
        match best {
            Some((_, c)) if count <= c => {}
            _ => best = Some((route, count)),
        }
    }
    best.map(|(route, count)| MainRoute {
        route: route.to_string(),
        share: count as f64 / total as f64,
    })
}
