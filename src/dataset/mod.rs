//! Scenario Loading
//!
//! Reads the planning input document (flights, historical status table,
//! optional hourly target tables, carriers, headings and exception lists) and
//! turns its raw rows into the typed model.

use crate::error::DatasetError;
use crate::history::{TargetKey, TargetTable};
use crate::model::{
    AircraftCategory, BodyClass, Carrier, DateSlot, Direction, Flight, HistoricalRecord, Market,
    PlanningRules, Route, Stage,
};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Everything one planning run reads
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub flights: Vec<Flight>,
    pub history: Vec<HistoricalRecord>,
    /// Stages without an entry derive their targets from `history`
    pub targets: BTreeMap<Stage, TargetTable>,
    pub carriers: Vec<Carrier>,
    pub routes: Vec<Route>,
    pub rules: PlanningRules,
}

impl Scenario {
    /// Flights of one stage and date slot
    pub fn flights_in(&self, stage: Stage, slot: DateSlot) -> Vec<&Flight> {
        self.flights
            .iter()
            .filter(|f| f.stage() == stage && f.date_slot == slot)
            .collect()
    }

    /// Headings usable in one direction
    pub fn routes_for(&self, direction: Direction) -> Vec<&Route> {
        self.routes.iter().filter(|r| r.direction == direction).collect()
    }

    pub fn carrier_index(&self, name: &str) -> Option<usize> {
        self.carriers.iter().position(|c| c.name == name)
    }
}

/// Raw flight row
#[derive(Debug, Deserialize)]
struct RawFlight {
    id: String,
    #[serde(default)]
    pair_id: Option<String>,
    #[serde(default)]
    time: Option<serde_json::Value>,
    market: Market,
    direction: Direction,
    date_slot: DateSlot,
    aircraft: String,
}

/// Raw historical status row
#[derive(Debug, Deserialize)]
struct RawHistory {
    carrier: String,
    route: String,
    direction: Direction,
    market: Market,
    aircraft: String,
    #[serde(default, alias = "minute")]
    minute_of_day: Option<u32>,
}

/// One carrier/heading/body row of an hourly target table
#[derive(Debug, Deserialize)]
struct RawTargetRow {
    carrier: String,
    route: String,
    body: String,
    shares: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTargets {
    #[serde(default)]
    dom_arr: Option<Vec<RawTargetRow>>,
    #[serde(default)]
    int_arr: Option<Vec<RawTargetRow>>,
    #[serde(default)]
    dom_dep: Option<Vec<RawTargetRow>>,
    #[serde(default)]
    int_dep: Option<Vec<RawTargetRow>>,
}

impl RawTargets {
    fn into_stages(self) -> Vec<(Stage, Vec<RawTargetRow>)> {
        [
            (Stage::DOM_ARR, self.dom_arr),
            (Stage::INT_ARR, self.int_arr),
            (Stage::DOM_DEP, self.dom_dep),
            (Stage::INT_DEP, self.int_dep),
        ]
        .into_iter()
        .filter_map(|(stage, rows)| rows.map(|rows| (stage, rows)))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    flights: Vec<RawFlight>,
    #[serde(default)]
    history: Vec<RawHistory>,
    #[serde(default)]
    targets: RawTargets,
    carriers: Vec<Carrier>,
    routes: Vec<Route>,
    #[serde(default, alias = "rules")]
    planning: PlanningRules,
}

/// Load a scenario from a JSON file
pub fn load_scenario(path: &Path) -> Result<Scenario, DatasetError> {
    let file = std::fs::File::open(path)?;
    read_scenario(std::io::BufReader::new(file))
}

/// Parse a scenario from any JSON reader
pub fn read_scenario(reader: impl Read) -> Result<Scenario, DatasetError> {
    let start = std::time::Instant::now();
    let raw: RawDocument = serde_json::from_reader(reader)?;

    let mut seen: BTreeSet<(Direction, DateSlot, String)> = BTreeSet::new();
    let mut flights = Vec::with_capacity(raw.flights.len());
    let mut untimed = 0;
    for raw_flight in raw.flights {
        let Some(aircraft) = parse_aircraft(&raw_flight.aircraft) else {
            return Err(DatasetError::AircraftCategory {
                flight: raw_flight.id,
                category: raw_flight.aircraft,
            });
        };
        if !seen.insert((raw_flight.direction, raw_flight.date_slot, raw_flight.id.clone())) {
            return Err(DatasetError::DuplicateFlight {
                flight: raw_flight.id,
                direction: raw_flight.direction.to_string(),
            });
        }

        let hour = raw_flight.time.as_ref().and_then(parse_hour);
        if hour.is_none() {
            untimed += 1;
            warn!(
                flight = %raw_flight.id,
                time = ?raw_flight.time,
                "Unparseable flight time; excluded from hourly terms"
            );
        }

        flights.push(Flight {
            id: raw_flight.id,
            pair_id: raw_flight.pair_id,
            hour,
            market: raw_flight.market,
            direction: raw_flight.direction,
            date_slot: raw_flight.date_slot,
            aircraft,
        });
    }

    let mut history = Vec::with_capacity(raw.history.len());
    for raw_record in raw.history {
        let Some(aircraft) = parse_aircraft(&raw_record.aircraft) else {
            warn!(
                carrier = %raw_record.carrier,
                category = %raw_record.aircraft,
                "Skipping historical record with unknown aircraft category"
            );
            continue;
        };
        history.push(HistoricalRecord {
            carrier: raw_record.carrier,
            route: raw_record.route,
            direction: raw_record.direction,
            market: raw_record.market,
            aircraft,
            minute_of_day: raw_record.minute_of_day,
        });
    }

    let carrier_names: BTreeSet<&str> = raw.carriers.iter().map(|c| c.name.as_str()).collect();
    let mut targets = BTreeMap::new();
    for (stage, rows) in raw.targets.into_stages() {
        let mut table = TargetTable::new();
        for row in rows {
            if !carrier_names.contains(row.carrier.as_str()) {
                return Err(DatasetError::UnknownCarrier {
                    stage,
                    carrier: row.carrier,
                });
            }
            if row.shares.len() != 24 {
                return Err(DatasetError::TargetWidth {
                    carrier: row.carrier,
                    route: row.route,
                    found: row.shares.len(),
                });
            }
            let Some(body) = parse_body(&row.body) else {
                return Err(DatasetError::AircraftCategory {
                    flight: format!("target {}/{}", row.carrier, row.route),
                    category: row.body,
                });
            };
            for (hour, &share) in row.shares.iter().enumerate() {
                if share == 0.0 {
                    continue;
                }
                table.insert(
                    TargetKey {
                        carrier: row.carrier.clone(),
                        route: row.route.clone(),
                        body,
                        hour: hour as u32,
                    },
                    share,
                );
            }
        }
        targets.insert(stage, table);
    }

    info!(
        flights = flights.len(),
        untimed,
        history = history.len(),
        target_tables = targets.len(),
        carriers = raw.carriers.len(),
        routes = raw.routes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Scenario loaded"
    );

    Ok(Scenario {
        flights,
        history,
        targets,
        carriers: raw.carriers,
        routes: raw.routes,
        rules: raw.planning,
    })
}

/// Write any serializable result as pretty JSON
pub fn write_json<T: Serialize>(value: &T, writer: impl Write) -> Result<(), DatasetError> {
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Hour bucket of a scheduled time: `"HH:MM"`, `"HH:MM:SS"` or decimal
/// hours such as `23.55`
pub fn parse_hour(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map(|t| t.hour())
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(decimal_hour))
        }
        serde_json::Value::Number(n) => n.as_f64().and_then(decimal_hour),
        _ => None,
    }
}

fn decimal_hour(value: f64) -> Option<u32> {
    if value.is_finite() && (0.0..24.0).contains(&value) {
        Some(value.floor() as u32)
    } else {
        None
    }
}

fn parse_aircraft(s: &str) -> Option<AircraftCategory> {
    match s.trim().to_uppercase().as_str() {
        "A" => Some(AircraftCategory::A),
        "B" => Some(AircraftCategory::B),
        "C" => Some(AircraftCategory::C),
        "D" => Some(AircraftCategory::D),
        "E" => Some(AircraftCategory::E),
        "F" => Some(AircraftCategory::F),
        _ => None,
    }
}

fn parse_body(s: &str) -> Option<BodyClass> {
    match s.trim().to_lowercase().as_str() {
        "narrow" => Some(BodyClass::Narrow),
        "wide" => Some(BodyClass::Wide),
        other => parse_aircraft(other).map(|a| a.body_class()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> serde_json::Value {
        let mut shares = vec![0.0; 24];
        shares[8] = 1.0;
        json!({
            "flights": [
                {
                    "id": "CA1", "pair_id": "T1", "time": "08:35",
                    "market": "DOM", "direction": "ARR", "date_slot": 2, "aircraft": "c"
                },
                {
                    "id": "CA2", "pair_id": "T1", "time": 9.5,
                    "market": "DOM", "direction": "DEP", "date_slot": 2, "aircraft": "E"
                },
                {
                    "id": "CA3", "time": "late",
                    "market": "INT", "direction": "ARR", "date_slot": 1, "aircraft": "F"
                }
            ],
            "history": [
                {
                    "carrier": "CA", "route": "AKOPI", "direction": "ARR", "market": "DOM",
                    "aircraft": "C", "minute": 515
                },
                {
                    "carrier": "CA", "route": "AKOPI", "direction": "ARR", "market": "DOM",
                    "aircraft": "Z", "minute": 515
                }
            ],
            "targets": {
                "dom_arr": [
                    { "carrier": "CA", "route": "AKOPI", "body": "narrow", "shares": shares }
                ]
            },
            "carriers": [
                {
                    "name": "CA", "base_type": "main_base",
                    "domestic": { "arrival": 1, "departure": 1 }
                }
            ],
            "routes": [
                { "name": "AKOPI", "direction": "ARR", "domestic_quota": 1 }
            ],
            "planning": { "wave_exempt": ["Other"] }
        })
    }

    #[test]
    fn test_parse_hour_formats() {
        assert_eq!(parse_hour(&json!("08:35")), Some(8));
        assert_eq!(parse_hour(&json!("23:59:59")), Some(23));
        assert_eq!(parse_hour(&json!(23.55)), Some(23));
        assert_eq!(parse_hour(&json!("7.25")), Some(7));
        assert_eq!(parse_hour(&json!(24.0)), None);
        assert_eq!(parse_hour(&json!("25:10")), None);
        assert_eq!(parse_hour(&json!("soon")), None);
        assert_eq!(parse_hour(&json!(null)), None);
    }

    #[test]
    fn test_read_scenario() {
        let bytes = serde_json::to_vec(&document()).unwrap();
        let scenario = read_scenario(bytes.as_slice()).unwrap();

        assert_eq!(scenario.flights.len(), 3);
        assert_eq!(scenario.flights[0].aircraft, AircraftCategory::C);
        assert_eq!(scenario.flights[1].hour, Some(9));
        assert_eq!(scenario.flights[2].hour, None);
        assert_eq!(scenario.history.len(), 1);
        assert!(scenario.rules.wave_exempt.contains("Other"));
        assert_eq!(scenario.flights_in(Stage::DOM_ARR, DateSlot::Planned).len(), 1);
        assert_eq!(scenario.routes_for(Direction::Arrival).len(), 1);

        let table = &scenario.targets[&Stage::DOM_ARR];
        assert_eq!(table.len(), 1);
        let key = TargetKey {
            carrier: "CA".to_string(),
            route: "AKOPI".to_string(),
            body: BodyClass::Narrow,
            hour: 8,
        };
        assert_eq!(table.get(&key), 1.0);
        assert!(!scenario.targets.contains_key(&Stage::INT_ARR));
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let mut doc = document();
        doc["flights"][0]["aircraft"] = json!("Q");
        let err = read_scenario(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap_err();
        assert!(matches!(err, DatasetError::AircraftCategory { .. }));

        let mut doc = document();
        doc["flights"][1]["direction"] = json!("ARR");
        doc["flights"][1]["id"] = json!("CA1");
        let err = read_scenario(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateFlight { .. }));

        let mut doc = document();
        doc["targets"]["dom_arr"][0]["shares"] = json!([0.5, 0.5]);
        let err = read_scenario(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap_err();
        assert!(matches!(err, DatasetError::TargetWidth { found: 2, .. }));

        let mut doc = document();
        doc["targets"]["dom_arr"][0]["carrier"] = json!("ZZ");
        let err = read_scenario(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap_err();
        assert!(matches!(err, DatasetError::UnknownCarrier { .. }));
    }
}
