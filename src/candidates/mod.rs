//! Candidate Generator
//!
//! Prunes the (flight, carrier, heading) space to legal triples before any
//! decision variable exists. The pruning rules are a pure predicate so they
//! can be tested on their own.

use crate::history::HistoricalProfile;
use crate::model::{Carrier, Flight, PlanningRules, Route, Stage, StageRules};
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Why a (flight, carrier, heading) triple was pruned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Long-haul heading, carrier neither main-base nor allow-listed
    LongHaulCarrier,
    /// Long-haul heading needs a wide-body aircraft
    LongHaulNarrowBody,
    /// Heading excluded for wide-body aircraft
    NoWideBody,
    /// Pair never observed and no exception applies
    UnobservedPair,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::LongHaulCarrier => write!(f, "LONG_HAUL_CARRIER"),
            Rejection::LongHaulNarrowBody => write!(f, "LONG_HAUL_NARROW_BODY"),
            Rejection::NoWideBody => write!(f, "NO_WIDE_BODY"),
            Rejection::UnobservedPair => write!(f, "UNOBSERVED_PAIR"),
        }
    }
}

/// Everything the pruning rules read, for one stage
#[derive(Debug, Clone, Copy)]
pub struct PruningContext<'a> {
    pub stage: Stage,
    pub profile: &'a HistoricalProfile,
    pub stage_rules: &'a StageRules,
    pub long_haul_allow: &'a BTreeSet<String>,
    pub catch_all: &'a str,
}

impl<'a> PruningContext<'a> {
    pub fn new(
        stage: Stage,
        profile: &'a HistoricalProfile,
        rules: &'a PlanningRules,
        catch_all: &'a str,
    ) -> Self {
        PruningContext {
            stage,
            profile,
            stage_rules: rules.for_stage(stage),
            long_haul_allow: &rules.long_haul_allow,
            catch_all,
        }
    }

    /// Check a triple against the pruning rules, first failing rule wins
    pub fn check(
        &self,
        flight: &Flight,
        carrier: &Carrier,
        route: &Route,
    ) -> Result<(), Rejection> {
        let market = self.stage.market;
        let wide = flight.is_wide_body();

        if route.is_long_haul(market) {
            if !carrier.is_main_base() && !self.long_haul_allow.contains(&carrier.name) {
                return Err(Rejection::LongHaulCarrier);
            }
            if !wide {
                return Err(Rejection::LongHaulNarrowBody);
            }
        }

        if wide && self.stage_rules.no_wide_body_routes.contains(&route.name) {
            return Err(Rejection::NoWideBody);
        }

        if carrier.name != self.catch_all
            && !self.profile.is_observed_pair(self.stage, &carrier.name, &route.name)
            && !self.is_excepted(&carrier.name, &route.name)
        {
            return Err(Rejection::UnobservedPair);
        }

        Ok(())
    }

    pub fn is_candidate(&self, flight: &Flight, carrier: &Carrier, route: &Route) -> bool {
        self.check(flight, carrier, route).is_ok()
    }

    fn is_excepted(&self, carrier: &str, route: &str) -> bool {
        self.stage_rules.open_routes.contains(route)
            || self
                .stage_rules
                .pair_exceptions
                .get(carrier)
                .is_some_and(|routes| routes.contains(route))
    }
}

/// Surviving (carrier, heading) index pairs of one flight
pub type CandidatePairs = Vec<(usize, usize)>;

/// Enumerate legal pairs for each flight. A flight with a fixed carrier only
/// considers that carrier.
pub fn generate(
    ctx: &PruningContext<'_>,
    flights: &[&Flight],
    fixed_carrier: &[Option<usize>],
    carriers: &[Carrier],
    routes: &[&Route],
) -> Vec<CandidatePairs> {
    flights
        .par_iter()
        .zip(fixed_carrier.par_iter())
        .map(|(flight, fixed)| {
            let carrier_range: Vec<usize> = match fixed {
                Some(c) => vec![*c],
                None => (0..carriers.len()).collect(),
            };
            let mut pairs = Vec::new();
            for c in carrier_range {
                for (r, route) in routes.iter().enumerate() {
                    if ctx.is_candidate(flight, &carriers[c], route) {
                        pairs.push((c, r));
                    }
                }
            }
            pairs
        })
        .collect()
}
