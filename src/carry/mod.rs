//! Carry-Forward
//!
//! Fills the date slots around the solved day without optimizing them. A
//! previous-day arrival takes the carrier of its planned-day departure, a
//! next-day departure takes the carrier of its planned-day arrival, and the
//! heading is drawn uniformly from the headings open to the flight's market.

use crate::dataset::Scenario;
use crate::model::{Assignment, AssignmentOrigin, AssignmentRow, DateSlot, Direction, Flight};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

/// Seeded generator when a seed is configured, OS entropy otherwise
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Rows for the previous-day arrivals and next-day departures of the scenario
pub fn carry_forward<R: Rng + ?Sized>(
    scenario: &Scenario,
    solved: &Assignment,
    rng: &mut R,
) -> Vec<AssignmentRow> {
    let mut rows = Vec::new();
    let mut unlinked = 0;
    let mut ignored = 0;

    for flight in &scenario.flights {
        let linked_direction = match (flight.date_slot, flight.direction) {
            (DateSlot::Previous, Direction::Arrival) => Direction::Departure,
            (DateSlot::Next, Direction::Departure) => Direction::Arrival,
            (DateSlot::Planned, _) => continue,
            _ => {
                ignored += 1;
                continue;
            }
        };

        let carrier = solved
            .carrier_of(flight.pair_key(), linked_direction, DateSlot::Planned)
            .map(str::to_string);
        if carrier.is_none() {
            unlinked += 1;
            warn!(
                flight = %flight.id,
                slot = u8::from(flight.date_slot),
                "No planned-day leg to inherit a carrier from"
            );
        }

        let Some(route) = sample_route(scenario, flight, rng) else {
            warn!(
                flight = %flight.id,
                direction = %flight.direction,
                "No heading available for carry-forward leg"
            );
            continue;
        };

        rows.push(AssignmentRow {
            flight_id: flight.id.clone(),
            pair_key: flight.pair_key().to_string(),
            direction: flight.direction,
            market: flight.market,
            date_slot: flight.date_slot,
            carrier,
            route,
            origin: AssignmentOrigin::Inherited,
        });
    }

    if ignored > 0 {
        debug!(ignored, "Legs outside the carried slots left unassigned");
    }
    info!(rows = rows.len(), unlinked, "Carry-forward complete");
    rows
}

/// Uniform choice among headings of the flight's direction with quota in its
/// market, or among all headings of that direction if none has quota
fn sample_route<R: Rng + ?Sized>(
    scenario: &Scenario,
    flight: &Flight,
    rng: &mut R,
) -> Option<String> {
    let routes = scenario.routes_for(flight.direction);
    let open: Vec<_> = routes
        .iter()
        .filter(|r| r.quota(flight.market) > 0)
        .collect();
    let chosen = if open.is_empty() {
        routes.choose(rng).copied()
    } else {
        open.choose(rng).map(|r| **r)
    };
    chosen.map(|r| r.name.clone())
}
