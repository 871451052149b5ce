//! Assignment Planner
//!
//! Solves the four sub-problems in order (domestic arrivals, international
//! arrivals, domestic departures, international departures), commits each
//! optimum to the assignment table and then carries the neighbouring date
//! slots forward. The only state passed between stages is the assignment so
//! far and the per-carrier departure demand, both by value.

use crate::candidates::{self, PruningContext};
use crate::carry;
use crate::config::Settings;
use crate::constraints::{ConstraintBuilder, DepartureDemand};
use crate::coupler::{AssignmentSpace, CarrierChoice};
use crate::dataset::Scenario;
use crate::error::PlanError;
use crate::history::HistoricalProfile;
use crate::metrics::PlannerMetrics;
use crate::model::{
    Assignment, AssignmentOrigin, AssignmentRow, DateSlot, Direction, Market, Stage,
};
use crate::objective::{ObjectiveBuilder, ObjectiveSummary};
use crate::solver::{MilpModel, SolveOutcome, SolverBackend, Solution};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Statistics of one solved sub-problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub flights: usize,
    /// Flights whose carrier came from the paired arrival
    pub inherited: usize,
    pub variables: usize,
    pub constraints: usize,
    pub objective: f64,
    pub solve_time_ms: u64,
    pub backend: String,
}

/// Result of a planning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub assignment: Assignment,
    pub stages: Vec<StageSummary>,
    pub departure_demand: DepartureDemand,
}

/// A built, not yet solved, sub-problem
pub struct StageModel<'a> {
    pub model: MilpModel,
    pub space: AssignmentSpace<'a>,
    pub objective: ObjectiveSummary,
}

/// Committed rows of one stage and the demand handed to the next
#[derive(Debug, Clone)]
pub struct StageResult {
    pub rows: Vec<AssignmentRow>,
    pub summary: StageSummary,
    pub demand: DepartureDemand,
}

pub struct Planner<'a, B: SolverBackend> {
    scenario: &'a Scenario,
    profile: HistoricalProfile,
    settings: Settings,
    backend: B,
    metrics: PlannerMetrics,
}

impl<'a, B: SolverBackend> Planner<'a, B> {
    /// Derive the historical profile once for the whole run
    pub fn new(scenario: &'a Scenario, settings: Settings, backend: B) -> Result<Self, PlanError> {
        let profile = HistoricalProfile::extract(
            &scenario.history,
            &settings.catch_all_carrier,
            &scenario.targets,
        );
        Ok(Planner {
            scenario,
            profile,
            settings,
            backend,
            metrics: PlannerMetrics::new()?,
        })
    }

    pub fn profile(&self) -> &HistoricalProfile {
        &self.profile
    }

    pub fn metrics(&self) -> &PlannerMetrics {
        &self.metrics
    }

    /// Full pipeline followed by carry-forward
    pub fn run(&self) -> Result<PlanOutcome, PlanError> {
        self.run_stages(&Stage::PIPELINE, true)
    }

    /// One sub-problem in isolation, every departure carrier-free
    pub fn run_stage(&self, stage: Stage) -> Result<PlanOutcome, PlanError> {
        self.run_stages(&[stage], false)
    }

    fn run_stages(&self, stages: &[Stage], carry_forward: bool) -> Result<PlanOutcome, PlanError> {
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            backend = self.backend.name(),
            stages = stages.len(),
            "Starting planning run"
        );

        let mut assignment = Assignment::new();
        let mut demand = DepartureDemand::new();
        let mut summaries = Vec::with_capacity(stages.len());

        for &stage in stages {
            let result = self.solve_stage(stage, &assignment, &demand)?;
            assignment.extend(result.rows);
            demand = result.demand;
            summaries.push(result.summary);
        }

        if carry_forward {
            let mut rng = carry::rng_from_seed(self.settings.carry_forward_seed);
            let rows = carry::carry_forward(self.scenario, &assignment, &mut rng);
            assignment.extend(rows);
        }

        for (carrier, market, count) in demand.iter() {
            debug!(carrier, %market, count, "Departure demand");
        }
        info!(%run_id, rows = assignment.len(), "Planning run complete");

        Ok(PlanOutcome {
            run_id,
            generated_at: Utc::now(),
            assignment,
            stages: summaries,
            departure_demand: demand,
        })
    }

    /// Build the model of one stage. `solved` holds the rows of earlier stages;
    /// `demand` the departure demand they committed.
    pub fn build_stage_model(
        &self,
        stage: Stage,
        solved: &Assignment,
        demand: &DepartureDemand,
    ) -> StageModel<'a> {
        let scenario = self.scenario;
        let flights = scenario.flights_in(stage, DateSlot::Planned);
        let routes = scenario.routes_for(stage.direction);

        let fixed: Vec<Option<usize>> = match stage.direction {
            Direction::Arrival => vec![None; flights.len()],
            Direction::Departure => flights
                .iter()
                .map(|f| {
                    let name =
                        solved.carrier_of(f.pair_key(), Direction::Arrival, DateSlot::Planned)?;
                    let index = scenario.carrier_index(name);
                    if index.is_none() {
                        warn!(
                            %stage,
                            flight = %f.id,
                            carrier = name,
                            "Inherited carrier unknown; deciding departure carrier here"
                        );
                    }
                    index
                })
                .collect(),
        };

        let paired_departure: Vec<Option<Market>> = match stage.direction {
            Direction::Arrival => {
                let departures: BTreeMap<&str, Market> = scenario
                    .flights
                    .iter()
                    .filter(|f| {
                        f.direction == Direction::Departure && f.date_slot == DateSlot::Planned
                    })
                    .map(|f| (f.pair_key(), f.market))
                    .collect();
                flights
                    .iter()
                    .map(|f| departures.get(f.pair_key()).copied())
                    .collect()
            }
            Direction::Departure => vec![None; flights.len()],
        };

        let ctx = PruningContext::new(
            stage,
            &self.profile,
            &scenario.rules,
            &self.settings.catch_all_carrier,
        );
        let candidates = candidates::generate(&ctx, &flights, &fixed, &scenario.carriers, &routes);
        for (flight, pairs) in flights.iter().zip(&candidates) {
            if pairs.is_empty() {
                warn!(%stage, flight = %flight.id, "No candidate carrier/heading survives pruning");
            }
        }

        let mut model = MilpModel::new();
        model.set_mip_gap(self.settings.stage(stage).mip_gap);
        let space = AssignmentSpace::build(
            &mut model,
            stage,
            flights,
            &fixed,
            &candidates,
            &scenario.carriers,
            routes,
            paired_departure,
        );

        ConstraintBuilder::new(&space, &self.profile, &scenario.rules, &self.settings)
            .build_all(&mut model, demand);
        let objective =
            ObjectiveBuilder::new(&space, &self.profile, &self.settings).build(&mut model);

        StageModel {
            model,
            space,
            objective,
        }
    }

    /// Build, solve and extract one stage
    pub fn solve_stage(
        &self,
        stage: Stage,
        solved: &Assignment,
        demand: &DepartureDemand,
    ) -> Result<StageResult, PlanError> {
        let start = std::time::Instant::now();
        let built = self.build_stage_model(stage, solved, demand);
        let model = &built.model;
        let inherited = built
            .space
            .choices
            .iter()
            .filter(|c| matches!(c, CarrierChoice::Inherited(_)))
            .count();

        info!(
            %stage,
            flights = built.space.flights.len(),
            inherited,
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            gap = model.mip_gap(),
            "Solving stage"
        );
        self.metrics
            .record_model(stage, model.num_variables(), model.num_constraints());

        let outcome = self
            .backend
            .solve(model)
            .map_err(|source| PlanError::Solver { stage, source })?;
        let elapsed = start.elapsed();

        let solution = match outcome {
            SolveOutcome::Optimal(solution) => solution,
            SolveOutcome::Infeasible => {
                self.metrics.record_solve(stage, "infeasible", elapsed.as_secs_f64());
                warn!(%stage, "Stage infeasible; computing conflicting constraints");
                let conflicts = self
                    .backend
                    .compute_conflict_set(model)
                    .map_err(|source| PlanError::Solver { stage, source })?;
                return Err(PlanError::Infeasible { stage, conflicts });
            }
        };
        self.metrics.record_solve(stage, "optimal", elapsed.as_secs_f64());

        let rows = extract_rows(&built.space, &solution);
        let mut next_demand = demand.clone();
        if stage.direction == Direction::Arrival {
            for (f, market) in built.space.paired_departure.iter().enumerate() {
                let Some(market) = market else {
                    continue;
                };
                let flight_id = &built.space.flights[f].id;
                if let Some(row) = rows.iter().find(|r| &r.flight_id == flight_id) {
                    if let Some(carrier) = &row.carrier {
                        next_demand.add(carrier, *market, 1);
                    }
                }
            }
        }

        let summary = StageSummary {
            stage,
            flights: built.space.flights.len(),
            inherited,
            variables: model.num_variables(),
            constraints: model.num_constraints(),
            objective: solution.objective(),
            solve_time_ms: elapsed.as_millis() as u64,
            backend: self.backend.name().to_string(),
        };
        info!(
            %stage,
            objective = summary.objective,
            elapsed_ms = summary.solve_time_ms,
            "Stage solved"
        );

        Ok(StageResult {
            rows,
            summary,
            demand: next_demand,
        })
    }
}

/// One row per flight from the cells set at the optimum
pub fn extract_rows(space: &AssignmentSpace<'_>, solution: &Solution) -> Vec<AssignmentRow> {
    let mut rows = Vec::with_capacity(space.flights.len());
    for (f, flight) in space.flights.iter().enumerate() {
        let mut chosen = space.cells_of(f).filter(|cell| solution.is_set(cell.var));
        let Some(cell) = chosen.next() else {
            warn!(
                stage = %space.stage,
                flight = %flight.id,
                "No cell set for flight at the optimum"
            );
            continue;
        };
        if chosen.next().is_some() {
            warn!(
                stage = %space.stage,
                flight = %flight.id,
                "More than one cell set; keeping the first"
            );
        }
        rows.push(AssignmentRow {
            flight_id: flight.id.clone(),
            pair_key: flight.pair_key().to_string(),
            direction: flight.direction,
            market: flight.market,
            date_slot: flight.date_slot,
            carrier: Some(space.carriers[cell.carrier].name.clone()),
            route: space.routes[cell.route].name.clone(),
            origin: AssignmentOrigin::Solved,
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AircraftCategory, BaseType, Carrier, Flight, HaulClass, HistoricalRecord, MarketQuota,
        Route,
    };
    use crate::solver::MicroLpBackend;

    fn flight(id: &str, pair: &str, direction: Direction, market: Market, hour: u32) -> Flight {
        Flight {
            id: id.to_string(),
            pair_id: Some(pair.to_string()),
            hour: Some(hour),
            market,
            direction,
            date_slot: DateSlot::Planned,
            aircraft: AircraftCategory::C,
        }
    }

    fn history(
        carrier: &str,
        route: &str,
        direction: Direction,
        market: Market,
        hour: u32,
    ) -> HistoricalRecord {
        HistoricalRecord {
            carrier: carrier.to_string(),
            route: route.to_string(),
            direction,
            market,
            aircraft: AircraftCategory::C,
            minute_of_day: Some(hour * 60),
        }
    }

    fn route(name: &str, direction: Direction, dom: u32, int: u32) -> Route {
        Route {
            name: name.to_string(),
            direction,
            domestic_quota: dom,
            international_quota: int,
            haul: HaulClass::Short,
        }
    }

    /// One carrier, one turnaround that arrives domestic and leaves international
    fn scenario() -> Scenario {
        Scenario {
            flights: vec![
                flight("A1", "T1", Direction::Arrival, Market::Domestic, 8),
                flight("D1", "T1", Direction::Departure, Market::International, 10),
            ],
            history: vec![
                history("CA", "AKOPI", Direction::Arrival, Market::Domestic, 8),
                history("CA", "ATVAX", Direction::Departure, Market::International, 10),
            ],
            carriers: vec![Carrier {
                name: "CA".to_string(),
                base_type: BaseType::MainBase,
                domestic: MarketQuota {
                    arrival: 1,
                    departure: 0,
                    wide_body: 0,
                },
                international: MarketQuota {
                    arrival: 0,
                    departure: 1,
                    wide_body: 0,
                },
            }],
            routes: vec![
                route("AKOPI", Direction::Arrival, 1, 0),
                route("ATVAX", Direction::Departure, 0, 1),
            ],
            ..Scenario::default()
        }
    }

    #[test]
    fn test_pipeline_carries_demand_and_inherits_carrier() {
        let scenario = scenario();
        let planner = Planner::new(&scenario, Settings::default(), MicroLpBackend).unwrap();
        let outcome = planner.run().unwrap();

        assert_eq!(outcome.stages.len(), 4);
        assert_eq!(outcome.departure_demand.get("CA", Market::International), 1);
        let departure = outcome
            .assignment
            .rows
            .iter()
            .find(|r| r.flight_id == "D1")
            .unwrap();
        assert_eq!(departure.carrier.as_deref(), Some("CA"));
        assert_eq!(departure.route, "ATVAX");
        let int_dep = outcome.stages.iter().find(|s| s.stage == Stage::INT_DEP).unwrap();
        assert_eq!(int_dep.inherited, 1);
        assert!(outcome.stages.iter().all(|s| s.objective.abs() < 1e-6));
    }

    #[test]
    fn test_single_stage_departures_are_carrier_free() {
        let scenario = scenario();
        let planner = Planner::new(&scenario, Settings::default(), MicroLpBackend).unwrap();
        let built = planner.build_stage_model(
            Stage::INT_DEP,
            &Assignment::new(),
            &DepartureDemand::new(),
        );
        assert!(matches!(built.space.choices[0], CarrierChoice::Coupled(_)));
        assert!(built.model.constraint("one_carrier_D1").is_some());

        let outcome = planner.run_stage(Stage::INT_DEP).unwrap();
        assert_eq!(outcome.assignment.len(), 1);
        assert_eq!(outcome.assignment.rows[0].carrier.as_deref(), Some("CA"));
    }

    #[test]
    fn test_infeasible_stage_names_quota() {
        let mut scenario = scenario();
        scenario.carriers[0].domestic.arrival = 3;
        let planner = Planner::new(&scenario, Settings::default(), MicroLpBackend).unwrap();
        let err = planner.run().unwrap_err();

        assert_eq!(err.stage(), Some(Stage::DOM_ARR));
        assert!(err
            .conflicts()
            .iter()
            .any(|name| name == "carrier_quota_CA_DOM-ARR"));
        let text = planner.metrics().encode().unwrap();
        assert!(text.contains(r#"outcome="infeasible""#));
    }
}
