//! Scenario fixtures built as JSON documents and read through the loader

#![allow(dead_code)]

use flight_assign::dataset::read_scenario;
use flight_assign::model::{Assignment, AssignmentRow, DateSlot, Stage};
use flight_assign::Scenario;
use serde_json::{json, Value};

pub struct ScenarioBuilder {
    flights: Vec<Value>,
    history: Vec<Value>,
    carriers: Vec<Value>,
    routes: Vec<Value>,
    planning: Value,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        ScenarioBuilder {
            flights: Vec::new(),
            history: Vec::new(),
            carriers: Vec::new(),
            routes: Vec::new(),
            planning: json!({}),
        }
    }

    /// Planned-day flight; `hour` of `None` leaves the time unparseable
    pub fn flight(
        mut self,
        id: &str,
        pair: Option<&str>,
        market: &str,
        direction: &str,
        hour: Option<u32>,
        aircraft: &str,
    ) -> Self {
        let time = match hour {
            Some(h) => json!(format!("{h:02}:15")),
            None => json!("n/a"),
        };
        self.flights.push(json!({
            "id": id,
            "pair_id": pair,
            "time": time,
            "market": market,
            "direction": direction,
            "date_slot": 2,
            "aircraft": aircraft,
        }));
        self
    }

    pub fn flight_in_slot(
        mut self,
        id: &str,
        pair: &str,
        market: &str,
        direction: &str,
        slot: u8,
    ) -> Self {
        self.flights.push(json!({
            "id": id,
            "pair_id": pair,
            "time": "12:00",
            "market": market,
            "direction": direction,
            "date_slot": slot,
            "aircraft": "C",
        }));
        self
    }

    /// Historical record; `hour` of `None` has no minute of day
    pub fn history(
        mut self,
        carrier: &str,
        route: &str,
        market: &str,
        direction: &str,
        aircraft: &str,
        hour: Option<u32>,
    ) -> Self {
        self.history.push(json!({
            "carrier": carrier,
            "route": route,
            "market": market,
            "direction": direction,
            "aircraft": aircraft,
            "minute_of_day": hour.map(|h| h * 60 + 15),
        }));
        self
    }

    pub fn carrier(mut self, name: &str, domestic: Value, international: Value) -> Self {
        self.carriers.push(json!({
            "name": name,
            "base_type": "main_base",
            "domestic": domestic,
            "international": international,
        }));
        self
    }

    pub fn route(mut self, name: &str, direction: &str, domestic: u32, international: u32) -> Self {
        self.routes.push(json!({
            "name": name,
            "direction": direction,
            "domestic_quota": domestic,
            "international_quota": international,
        }));
        self
    }

    pub fn planning(mut self, planning: Value) -> Self {
        self.planning = planning;
        self
    }

    pub fn build(self) -> Scenario {
        let doc = json!({
            "flights": self.flights,
            "history": self.history,
            "carriers": self.carriers,
            "routes": self.routes,
            "planning": self.planning,
        });
        let bytes = serde_json::to_vec(&doc).expect("fixture serializes");
        read_scenario(bytes.as_slice()).expect("fixture is a valid scenario")
    }
}

pub fn quota(arrival: u32, departure: u32, wide_body: u32) -> Value {
    json!({ "arrival": arrival, "departure": departure, "wide_body": wide_body })
}

/// Rows of the solved window (date slot 2) belonging to `stage`
pub fn rows_of<'a>(assignment: &'a Assignment, stage: Stage) -> Vec<&'a AssignmentRow> {
    assignment
        .rows
        .iter()
        .filter(|r| r.date_slot == DateSlot::Planned)
        .filter(|r| r.market == stage.market && r.direction == stage.direction)
        .collect()
}

pub fn count(rows: &[&AssignmentRow], carrier: Option<&str>, route: Option<&str>) -> usize {
    rows.iter()
        .filter(|r| carrier.map_or(true, |c| r.carrier.as_deref() == Some(c)))
        .filter(|r| route.map_or(true, |route| r.route == route))
        .count()
}
