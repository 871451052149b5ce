//! Planning Data Model
//!
//! Flights, carrier groups, headings and the assignment table produced by a
//! planning run. Everything except `Assignment` is immutable input.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Flight market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "DOM", alias = "domestic")]
    Domestic,
    #[serde(rename = "INT", alias = "international")]
    International,
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Market::Domestic => write!(f, "DOM"),
            Market::International => write!(f, "INT"),
        }
    }
}

/// Flight direction relative to the planned airport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "ARR", alias = "Arrival", alias = "arrival")]
    Arrival,
    #[serde(rename = "DEP", alias = "Departure", alias = "departure")]
    Departure,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Arrival => write!(f, "ARR"),
            Direction::Departure => write!(f, "DEP"),
        }
    }
}

/// Position in the rolling three-day window. Slot 2 is the solved day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DateSlot {
    Previous,
    Planned,
    Next,
}

impl TryFrom<u8> for DateSlot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DateSlot::Previous),
            2 => Ok(DateSlot::Planned),
            3 => Ok(DateSlot::Next),
            other => Err(format!("date slot must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<DateSlot> for u8 {
    fn from(slot: DateSlot) -> Self {
        match slot {
            DateSlot::Previous => 1,
            DateSlot::Planned => 2,
            DateSlot::Next => 3,
        }
    }
}

/// ICAO-style aircraft size category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AircraftCategory {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl AircraftCategory {
    /// E and F are large-body aircraft
    pub fn is_wide_body(&self) -> bool {
        matches!(self, AircraftCategory::E | AircraftCategory::F)
    }

    pub fn body_class(&self) -> BodyClass {
        if self.is_wide_body() {
            BodyClass::Wide
        } else {
            BodyClass::Narrow
        }
    }
}

/// Two-way collapse of `AircraftCategory` used by the hourly target tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BodyClass {
    #[serde(rename = "C", alias = "narrow")]
    Narrow,
    #[serde(rename = "E", alias = "wide")]
    Wide,
}

impl std::fmt::Display for BodyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyClass::Narrow => write!(f, "C"),
            BodyClass::Wide => write!(f, "E"),
        }
    }
}

/// One of the four independently solved sub-problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stage {
    pub market: Market,
    pub direction: Direction,
}

impl Stage {
    pub const DOM_ARR: Stage = Stage::new(Market::Domestic, Direction::Arrival);
    pub const INT_ARR: Stage = Stage::new(Market::International, Direction::Arrival);
    pub const DOM_DEP: Stage = Stage::new(Market::Domestic, Direction::Departure);
    pub const INT_DEP: Stage = Stage::new(Market::International, Direction::Departure);

    /// Solve order. Arrival stages feed departure-demand counts forward.
    pub const PIPELINE: [Stage; 4] = [
        Stage::DOM_ARR,
        Stage::INT_ARR,
        Stage::DOM_DEP,
        Stage::INT_DEP,
    ];

    pub const fn new(market: Market, direction: Direction) -> Self {
        Stage { market, direction }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.market, self.direction)
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('_', "-").as_str() {
            "DOM-ARR" => Ok(Stage::DOM_ARR),
            "INT-ARR" => Ok(Stage::INT_ARR),
            "DOM-DEP" => Ok(Stage::DOM_DEP),
            "INT-DEP" => Ok(Stage::INT_DEP),
            other => Err(format!("unknown stage '{other}'")),
        }
    }
}

/// A flight leg that needs a carrier and a heading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    /// Turnaround link shared by an arrival and its departure
    pub pair_id: Option<String>,
    /// Hour bucket, `None` when the scheduled time could not be parsed
    pub hour: Option<u32>,
    pub market: Market,
    pub direction: Direction,
    pub date_slot: DateSlot,
    pub aircraft: AircraftCategory,
}

impl Flight {
    /// Key joining the arrival and departure legs of one turnaround
    pub fn pair_key(&self) -> &str {
        self.pair_id.as_deref().unwrap_or(&self.id)
    }

    pub fn is_wide_body(&self) -> bool {
        self.aircraft.is_wide_body()
    }

    pub fn stage(&self) -> Stage {
        Stage::new(self.market, self.direction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseType {
    #[serde(alias = "main")]
    MainBase,
    #[serde(alias = "non_main")]
    NonMainBase,
}

/// Quotas of one carrier group within one market
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketQuota {
    #[serde(default)]
    pub arrival: u32,
    #[serde(default)]
    pub departure: u32,
    #[serde(default)]
    pub wide_body: u32,
}

impl MarketQuota {
    pub fn for_direction(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Arrival => self.arrival,
            Direction::Departure => self.departure,
        }
    }
}

/// Carrier group, the unit of quota allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carrier {
    pub name: String,
    pub base_type: BaseType,
    #[serde(default)]
    pub domestic: MarketQuota,
    #[serde(default)]
    pub international: MarketQuota,
}

impl Carrier {
    pub fn quota(&self, market: Market) -> &MarketQuota {
        match market {
            Market::Domestic => &self.domestic,
            Market::International => &self.international,
        }
    }

    pub fn is_main_base(&self) -> bool {
        self.base_type == BaseType::MainBase
    }
}

/// International haul classification of a heading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaulClass {
    #[default]
    Short,
    Medium,
    /// Reserved for main-base carriers and the long-haul allow-list, wide-body only
    Long,
}

/// A heading (departure or arrival fix) with per-market quotas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub direction: Direction,
    #[serde(default)]
    pub domestic_quota: u32,
    #[serde(default)]
    pub international_quota: u32,
    #[serde(default)]
    pub haul: HaulClass,
}

impl Route {
    pub fn quota(&self, market: Market) -> u32 {
        match market {
            Market::Domestic => self.domestic_quota,
            Market::International => self.international_quota,
        }
    }

    /// Long-haul classification only applies to international traffic
    pub fn is_long_haul(&self, market: Market) -> bool {
        market == Market::International && self.haul == HaulClass::Long
    }
}

/// One historically observed flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub carrier: String,
    pub route: String,
    pub direction: Direction,
    pub market: Market,
    pub aircraft: AircraftCategory,
    /// Minute on the rolling clock; may exceed one day
    pub minute_of_day: Option<u32>,
}

impl HistoricalRecord {
    pub fn hour(&self) -> Option<u32> {
        self.minute_of_day.map(|m| (m / 60) % 24)
    }

    pub fn stage(&self) -> Stage {
        Stage::new(self.market, self.direction)
    }
}

/// Exception lists that only apply to one stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageRules {
    /// Headings that may not receive wide-body aircraft
    #[serde(default)]
    pub no_wide_body_routes: BTreeSet<String>,
    /// Headings whose wide-body share may not fall below history
    #[serde(default)]
    pub wide_ratio_routes: BTreeSet<String>,
    /// Carrier → headings allowed despite never being observed
    #[serde(default)]
    pub pair_exceptions: BTreeMap<String, BTreeSet<String>>,
    /// Headings open to every carrier
    #[serde(default)]
    pub open_routes: BTreeSet<String>,
}

/// Static exception configuration of a planning run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanningRules {
    #[serde(default)]
    pub main_route_exempt: BTreeSet<String>,
    #[serde(default)]
    pub wave_exempt: BTreeSet<String>,
    /// Non-main-base carriers allowed on long-haul headings
    #[serde(default)]
    pub long_haul_allow: BTreeSet<String>,
    #[serde(default)]
    pub dom_arr: StageRules,
    #[serde(default)]
    pub int_arr: StageRules,
    #[serde(default)]
    pub dom_dep: StageRules,
    #[serde(default)]
    pub int_dep: StageRules,
}

impl PlanningRules {
    pub fn for_stage(&self, stage: Stage) -> &StageRules {
        match (stage.market, stage.direction) {
            (Market::Domestic, Direction::Arrival) => &self.dom_arr,
            (Market::International, Direction::Arrival) => &self.int_arr,
            (Market::Domestic, Direction::Departure) => &self.dom_dep,
            (Market::International, Direction::Departure) => &self.int_dep,
        }
    }
}

/// How an assignment row came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentOrigin {
    Solved,
    /// Filled from the linked leg outside the solved window
    Inherited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub flight_id: String,
    pub pair_key: String,
    pub direction: Direction,
    pub market: Market,
    pub date_slot: DateSlot,
    /// `None` only for carry-forward legs without a linked leg
    pub carrier: Option<String>,
    pub route: String,
    pub origin: AssignmentOrigin,
}

/// Output assignment table of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assignment {
    pub rows: Vec<AssignmentRow>,
}

impl Assignment {
    pub fn new() -> Self {
        Assignment { rows: Vec::new() }
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = AssignmentRow>) {
        self.rows.extend(rows);
    }

    /// Rows of one direction and date slot
    pub fn rows_for(
        &self,
        direction: Direction,
        slot: DateSlot,
    ) -> impl Iterator<Item = &AssignmentRow> {
        self.rows
            .iter()
            .filter(move |r| r.direction == direction && r.date_slot == slot)
    }

    /// Carrier of the leg with the given turnaround key, direction and slot
    pub fn carrier_of(&self, pair_key: &str, direction: Direction, slot: DateSlot) -> Option<&str> {
        self.rows_for(direction, slot)
            .find(|r| r.pair_key == pair_key)
            .and_then(|r| r.carrier.as_deref())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
