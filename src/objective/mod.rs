//! Objective Builder
//!
//! Weighted deviation objective of one sub-problem. The hourly-wave term is
//! scaled far above the fine-grained distribution term so that the linear
//! scalarization behaves lexicographically.

use crate::config::Settings;
use crate::constraints::ConstraintFamily;
use crate::coupler::AssignmentSpace;
use crate::history::{HistoricalProfile, TargetKey};
use crate::solver::{LinearExpr, MilpModel, Relation, Sense, VarId};
use std::collections::BTreeMap;
use tracing::debug;

/// Sizes of the objective terms that were built
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObjectiveSummary {
    pub wave_deviations: usize,
    pub distribution_deviations: usize,
    /// Penalty already fixed before solving
    pub constant: f64,
}

pub struct ObjectiveBuilder<'a> {
    space: &'a AssignmentSpace<'a>,
    profile: &'a HistoricalProfile,
    settings: &'a Settings,
}

impl<'a> ObjectiveBuilder<'a> {
    pub fn new(
        space: &'a AssignmentSpace<'a>,
        profile: &'a HistoricalProfile,
        settings: &'a Settings,
    ) -> Self {
        ObjectiveBuilder {
            space,
            profile,
            settings,
        }
    }

    /// Set `wave_weight · wave + distribution_weight · distribution` as the
    /// model's minimization objective
    pub fn build(&self, model: &mut MilpModel) -> ObjectiveSummary {
        let wave = self.wave_term(model);
        let distribution = self.distribution_term(model);

        let mut objective = LinearExpr::new();
        objective.add_scaled(&wave.0, self.settings.wave_weight);
        objective.add_scaled(&distribution.0, self.settings.distribution_weight);

        let summary = ObjectiveSummary {
            wave_deviations: wave.1,
            distribution_deviations: distribution.1,
            constant: objective.constant_part(),
        };
        debug!(
            stage = %self.space.stage,
            wave = summary.wave_deviations,
            distribution = summary.distribution_deviations,
            constant = summary.constant,
            "Objective built"
        );
        model.set_objective(objective, Sense::Minimize);
        summary
    }

    /// Σ |assigned(c, h) − historical(c, h)| over carriers and hours
    fn wave_term(&self, model: &mut MilpModel) -> (LinearExpr, usize) {
        let space = self.space;
        let stage = space.stage;
        let mut term = LinearExpr::new();
        let mut count = 0;

        for (c, carrier) in space.carriers.iter().enumerate() {
            if self.settings.is_catch_all(&carrier.name) {
                continue;
            }
            for hour in 0..24u32 {
                let assigned = space.carrier_total(c, |f| f.hour == Some(hour));
                let historical = self.profile.hourly_count(stage, &carrier.name, hour) as f64;
                if !assigned.has_variables() {
                    term.add_constant((assigned.constant_part() - historical).abs());
                    continue;
                }
                let dev = absolute_deviation(
                    model,
                    &assigned,
                    historical,
                    &format!("wave_dev_{}_{:02}_{}", carrier.name, hour, stage),
                );
                term.add_term(dev, 1.0);
                count += 1;
            }
        }
        (term, count)
    }

    /// Σ |share(c, r, body, h) − target(c, r, body, h)| where share is the
    /// cell count over the sub-problem's flight count. Target cells that no
    /// flight can reach cost their full target.
    fn distribution_term(&self, model: &mut MilpModel) -> (LinearExpr, usize) {
        let space = self.space;
        let stage = space.stage;
        let mut term = LinearExpr::new();
        let mut count = 0;
        if space.flights.is_empty() {
            return (term, count);
        }
        let total = space.flights.len() as f64;

        let mut groups: BTreeMap<TargetKey, Vec<VarId>> = BTreeMap::new();
        for cell in &space.cells {
            let flight = space.flights[cell.flight];
            let Some(hour) = flight.hour else {
                continue;
            };
            let key = TargetKey {
                carrier: space.carriers[cell.carrier].name.clone(),
                route: space.routes[cell.route].name.clone(),
                body: flight.aircraft.body_class(),
                hour,
            };
            groups.entry(key).or_default().push(cell.var);
        }

        let targets = self.profile.targets(stage);
        for (key, vars) in &groups {
            let target = targets.map(|t| t.get(key)).unwrap_or(0.0);
            let share = LinearExpr::sum(vars.iter().copied()).scaled(1.0 / total);
            let dev = absolute_deviation(
                model,
                &share,
                target,
                &format!(
                    "dist_dev_{}_{}_{}_{:02}_{}",
                    key.carrier, key.route, key.body, key.hour, stage
                ),
            );
            term.add_term(dev, 1.0);
            count += 1;
        }

        if let Some(targets) = targets {
            for (key, target) in targets.iter() {
                if !groups.contains_key(key) {
                    term.add_constant(target.abs());
                }
            }
        }
        (term, count)
    }
}

/// Continuous `d ≥ |expr − reference|` via two Deviation rows
fn absolute_deviation(
    model: &mut MilpModel,
    expr: &LinearExpr,
    reference: f64,
    name: &str,
) -> VarId {
    let dev = model.add_continuous_variable(name, 0.0, None);

    let mut above = LinearExpr::sum([dev]);
    above.add_scaled(expr, -1.0);
    model.add_linear_constraint(
        above,
        Relation::GreaterEq,
        -reference,
        format!("{name}_pos"),
        ConstraintFamily::Deviation,
    );

    let mut below = LinearExpr::sum([dev]);
    below.add_scaled(expr, 1.0);
    model.add_linear_constraint(
        below,
        Relation::GreaterEq,
        reference,
        format!("{name}_neg"),
        ConstraintFamily::Deviation,
    );

    dev
}
