//! Constraint Builder
//!
//! Emits the hard constraint families of one sub-problem over an
//! `AssignmentSpace`. Every row carries a unique name and a family tag so that
//! infeasibility diagnostics can report it back to the operator.

use crate::config::Settings;
use crate::coupler::AssignmentSpace;
use crate::history::HistoricalProfile;
use crate::model::{Direction, Market, PlanningRules};
use crate::solver::{LinearExpr, MilpModel, Relation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Kinds of constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintFamily {
    ExactlyOne,
    CarrierQuota,
    RouteQuota,
    MainRouteShare,
    MainRouteDominance,
    CrossLeg,
    WaveFloor,
    WideBodyBand,
    WideBodyRatio,
    Coupling,
    /// Soft rows bounding objective deviation variables
    Deviation,
}

impl std::fmt::Display for ConstraintFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintFamily::ExactlyOne => write!(f, "EXACTLY_ONE"),
            ConstraintFamily::CarrierQuota => write!(f, "CARRIER_QUOTA"),
            ConstraintFamily::RouteQuota => write!(f, "ROUTE_QUOTA"),
            ConstraintFamily::MainRouteShare => write!(f, "MAIN_ROUTE_SHARE"),
            ConstraintFamily::MainRouteDominance => write!(f, "MAIN_ROUTE_DOMINANCE"),
            ConstraintFamily::CrossLeg => write!(f, "CROSS_LEG"),
            ConstraintFamily::WaveFloor => write!(f, "WAVE_FLOOR"),
            ConstraintFamily::WideBodyBand => write!(f, "WIDE_BODY_BAND"),
            ConstraintFamily::WideBodyRatio => write!(f, "WIDE_BODY_RATIO"),
            ConstraintFamily::Coupling => write!(f, "COUPLING"),
            ConstraintFamily::Deviation => write!(f, "DEVIATION"),
        }
    }
}

/// Planned-day departure legs already claimed per carrier and market.
///
/// Produced by the arrival stages and passed by value to the next one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartureDemand {
    counts: BTreeMap<String, BTreeMap<Market, u32>>,
}

impl DepartureDemand {
    pub fn new() -> Self {
        DepartureDemand::default()
    }

    pub fn get(&self, carrier: &str, market: Market) -> u32 {
        self.counts
            .get(carrier)
            .and_then(|m| m.get(&market))
            .copied()
            .unwrap_or(0)
    }

    pub fn add(&mut self, carrier: &str, market: Market, count: u32) {
        *self
            .counts
            .entry(carrier.to_string())
            .or_default()
            .entry(market)
            .or_insert(0) += count;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Market, u32)> {
        self.counts
            .iter()
            .flat_map(|(c, m)| m.iter().map(move |(&market, &n)| (c.as_str(), market, n)))
    }
}

/// Builds every hard constraint family of one sub-problem
pub struct ConstraintBuilder<'a> {
    space: &'a AssignmentSpace<'a>,
    profile: &'a HistoricalProfile,
    rules: &'a PlanningRules,
    settings: &'a Settings,
}

impl<'a> ConstraintBuilder<'a> {
    pub fn new(
        space: &'a AssignmentSpace<'a>,
        profile: &'a HistoricalProfile,
        rules: &'a PlanningRules,
        settings: &'a Settings,
    ) -> Self {
        ConstraintBuilder {
            space,
            profile,
            rules,
            settings,
        }
    }

    /// Add all families. `committed` is the departure demand of earlier stages.
    pub fn build_all(&self, model: &mut MilpModel, committed: &DepartureDemand) {
        let stage = self.space.stage;
        let mut counts: BTreeMap<ConstraintFamily, usize> = BTreeMap::new();
        let mut record = |family: ConstraintFamily, model: &MilpModel, before: usize| {
            *counts.entry(family).or_insert(0) += model.num_constraints() - before;
        };

        let before = model.num_constraints();
        self.exactly_one(model);
        record(ConstraintFamily::ExactlyOne, &*model, before);

        let before = model.num_constraints();
        self.carrier_quotas(model);
        record(ConstraintFamily::CarrierQuota, &*model, before);

        let before = model.num_constraints();
        self.route_quotas(model);
        record(ConstraintFamily::RouteQuota, &*model, before);

        let before = model.num_constraints();
        self.main_route_dominance(model);
        record(ConstraintFamily::MainRouteDominance, &*model, before);

        if stage.direction == Direction::Arrival {
            let before = model.num_constraints();
            self.cross_leg(model, committed);
            record(ConstraintFamily::CrossLeg, &*model, before);
        }

        let before = model.num_constraints();
        self.wave_floor(model);
        record(ConstraintFamily::WaveFloor, &*model, before);

        let before = model.num_constraints();
        self.wide_body_band(model);
        record(ConstraintFamily::WideBodyBand, &*model, before);

        let before = model.num_constraints();
        self.wide_body_ratio(model);
        record(ConstraintFamily::WideBodyRatio, &*model, before);

        for (family, count) in counts {
            debug!(%stage, %family, count, "Constraints added");
        }
    }

    /// Σ cells of flight f = 1
    pub fn exactly_one(&self, model: &mut MilpModel) {
        let space = self.space;
        for (f, flight) in space.flights.iter().enumerate() {
            model.add_linear_constraint(
                LinearExpr::sum(space.cells_of(f).map(|cell| cell.var)),
                Relation::Equal,
                1.0,
                format!("one_assignment_{}_{}", flight.id, space.stage),
                ConstraintFamily::ExactlyOne,
            );
        }
    }

    /// Arrival quotas are exact. Departure quotas count inherited legs as
    /// committed and leave the rest to a ± bias band.
    pub fn carrier_quotas(&self, model: &mut MilpModel) {
        let space = self.space;
        let stage = space.stage;
        for (c, carrier) in space.carriers.iter().enumerate() {
            let quota = carrier.quota(stage.market).for_direction(stage.direction);
            let load = space.carrier_total(c, |_| true);
            let name = format!("carrier_quota_{}_{}", carrier.name, stage);

            match stage.direction {
                Direction::Arrival => {
                    model.add_linear_constraint(
                        load,
                        Relation::Equal,
                        quota as f64,
                        name,
                        ConstraintFamily::CarrierQuota,
                    );
                }
                Direction::Departure => {
                    let bias = self.settings.stage(stage).carrier_quota_bias;
                    let inherited = space.inherited_count(c);
                    if inherited as u32 > quota + bias {
                        warn!(
                            %stage,
                            carrier = %carrier.name,
                            inherited,
                            quota,
                            "Inherited departures exceed the carrier quota band"
                        );
                    }
                    band(model, load, quota, bias, &name, ConstraintFamily::CarrierQuota);
                }
            }
        }
    }

    /// Σ cells on heading r within quota ± bias
    pub fn route_quotas(&self, model: &mut MilpModel) {
        let space = self.space;
        let stage = space.stage;
        let bias = self.settings.stage(stage).route_quota_bias;
        for (r, route) in space.routes.iter().enumerate() {
            let total = space.cell_total(|cell, _| cell.route == r);
            band(
                model,
                total,
                route.quota(stage.market),
                bias,
                &format!("route_quota_{}_{}", route.name, stage),
                ConstraintFamily::RouteQuota,
            );
        }
    }

    /// Main heading holds at least its historical share of the carrier's
    /// flights and no other heading carries more
    pub fn main_route_dominance(&self, model: &mut MilpModel) {
        let space = self.space;
        let stage = space.stage;
        for (c, carrier) in space.carriers.iter().enumerate() {
            if self.rules.main_route_exempt.contains(&carrier.name) {
                continue;
            }
            let Some(main) = self.profile.main_route(stage, &carrier.name) else {
                debug!(%stage, carrier = %carrier.name, "No heading history; skipping dominance");
                continue;
            };
            let Some(m) = space.route_index(&main.route) else {
                warn!(
                    %stage,
                    carrier = %carrier.name,
                    route = %main.route,
                    "Main heading not in stage heading set; skipping dominance"
                );
                continue;
            };
            if !space.carrier_reachable(c) {
                continue;
            }

            let on_main = space.cell_total(|cell, _| cell.carrier == c && cell.route == m);
            let share = on_main.minus(&space.carrier_total(c, |_| true).scaled(main.share));
            model.add_linear_constraint(
                share,
                Relation::GreaterEq,
                0.0,
                format!("main_route_share_{}_{}", carrier.name, stage),
                ConstraintFamily::MainRouteShare,
            );

            for (r, route) in space.routes.iter().enumerate() {
                if r == m {
                    continue;
                }
                let on_other = space.cell_total(|cell, _| cell.carrier == c && cell.route == r);
                if !on_other.has_variables() {
                    continue;
                }
                model.add_linear_constraint(
                    on_main.minus(&on_other),
                    Relation::GreaterEq,
                    0.0,
                    format!("main_route_dominance_{}_{}_{}", carrier.name, route.name, stage),
                    ConstraintFamily::MainRouteDominance,
                );
            }
        }
    }

    /// Arrivals whose planned-day departure is in market M, plus demand
    /// committed by earlier stages, fit the carrier's M departure quota
    pub fn cross_leg(&self, model: &mut MilpModel, committed: &DepartureDemand) {
        let space = self.space;
        let stage = space.stage;
        for (c, carrier) in space.carriers.iter().enumerate() {
            for market in [Market::Domestic, Market::International] {
                let mut demand = space.paired_demand(c, market);
                if !demand.has_variables() {
                    continue;
                }
                demand.add_constant(committed.get(&carrier.name, market) as f64);
                model.add_linear_constraint(
                    demand,
                    Relation::LessEq,
                    carrier.quota(market).departure as f64,
                    format!("cross_leg_{}_{}_{}", market, carrier.name, stage),
                    ConstraintFamily::CrossLeg,
                );
            }
        }
    }

    /// Per carrier and hour, assigned ≥ historical − bias. Flights without an
    /// hour bucket never count toward a floor.
    pub fn wave_floor(&self, model: &mut MilpModel) {
        let space = self.space;
        let stage = space.stage;
        let bias = self.settings.stage(stage).wave_bias;
        for (c, carrier) in space.carriers.iter().enumerate() {
            if self.rules.wave_exempt.contains(&carrier.name) {
                continue;
            }
            let Some(hourly) = self.profile.hourly_counts(stage, &carrier.name) else {
                debug!(%stage, carrier = %carrier.name, "No hourly history; skipping wave floor");
                continue;
            };
            for (hour, &count) in hourly.iter().enumerate() {
                let floor = count.saturating_sub(bias);
                if floor == 0 {
                    continue;
                }
                let assigned = space.carrier_total(c, |f| f.hour == Some(hour as u32));
                model.add_linear_constraint(
                    assigned,
                    Relation::GreaterEq,
                    floor as f64,
                    format!("wave_floor_{}_{:02}_{}", carrier.name, hour, stage),
                    ConstraintFamily::WaveFloor,
                );
            }
        }
    }

    /// Wide-body count of each carrier within quota ± bias
    pub fn wide_body_band(&self, model: &mut MilpModel) {
        let space = self.space;
        let stage = space.stage;
        for (c, carrier) in space.carriers.iter().enumerate() {
            let quota = carrier.quota(stage.market).wide_body;
            let bias = self.settings.wide_body_bias(stage, &carrier.name);
            let wide = space.carrier_total(c, |f| f.is_wide_body());
            band(
                model,
                wide,
                quota,
                bias,
                &format!("wide_body_{}_{}", carrier.name, stage),
                ConstraintFamily::WideBodyBand,
            );
        }
    }

    /// On designated headings, wide-body share stays above its history
    pub fn wide_body_ratio(&self, model: &mut MilpModel) {
        let space = self.space;
        let stage = space.stage;
        let margin = self.settings.stage(stage).wide_ratio_margin;
        for name in &self.rules.for_stage(stage).wide_ratio_routes {
            let Some(r) = space.route_index(name) else {
                warn!(%stage, route = %name, "Wide-ratio heading not in stage heading set");
                continue;
            };
            let Some(ratio) = self.profile.wide_ratio(stage, name) else {
                warn!(
                    %stage,
                    route = %name,
                    "No wide-body history for heading; skipping ratio floor"
                );
                continue;
            };
            let wide = space.cell_total(|cell, f| cell.route == r && f.is_wide_body());
            let total = space.cell_total(|cell, _| cell.route == r);
            model.add_linear_constraint(
                wide.minus(&total.scaled(ratio)),
                Relation::GreaterEq,
                margin,
                format!("wide_ratio_{}_{}", name, stage),
                ConstraintFamily::WideBodyRatio,
            );
        }
    }
}

/// `expr == target` without bias, otherwise `[target − bias, target + bias]`
/// with the lower row dropped when it cannot bind
fn band(
    model: &mut MilpModel,
    expr: LinearExpr,
    target: u32,
    bias: u32,
    name: &str,
    family: ConstraintFamily,
) {
    if bias == 0 {
        model.add_linear_constraint(expr, Relation::Equal, target as f64, name, family);
        return;
    }
    if target > bias {
        model.add_linear_constraint(
            expr.clone(),
            Relation::GreaterEq,
            (target - bias) as f64,
            format!("{name}_min"),
            family,
        );
    }
    model.add_linear_constraint(
        expr,
        Relation::LessEq,
        (target + bias) as f64,
        format!("{name}_max"),
        family,
    );
}
