//! `good_lp` backend driving the pure-Rust `microlp` branch-and-bound solver.

use super::{MilpModel, Relation, Sense, SolveOutcome, Solution, SolverBackend, VarKind};
use crate::error::SolverError;

use good_lp::solvers::microlp::microlp;
use good_lp::{
    variable, Expression, ProblemVariables, ResolutionError, Solution as _, SolverModel, Variable,
};
use tracing::debug;

/// Solves to proven optimality, which satisfies any requested gap
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLpBackend;

impl MicroLpBackend {
    pub fn new() -> Self {
        MicroLpBackend
    }
}

fn to_expression(expr: &super::LinearExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::from(expr.constant_part());
    for &(var, coef) in expr.terms() {
        out.add_mul(coef, handles[var.index()]);
    }
    out
}

impl SolverBackend for MicroLpBackend {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, model: &MilpModel) -> Result<SolveOutcome, SolverError> {
        if !model.violated_constraints().is_empty() {
            return Ok(SolveOutcome::Infeasible);
        }
        if model.num_variables() == 0 {
            let objective = model.objective().constant_part();
            return Ok(SolveOutcome::Optimal(Solution::new(Vec::new(), objective)));
        }

        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = model
            .variables()
            .iter()
            .map(|def| {
                let definition = match def.kind {
                    VarKind::Binary => variable().binary(),
                    VarKind::Continuous { lower, upper } => {
                        let definition = variable().min(lower);
                        match upper {
                            Some(upper) => definition.max(upper),
                            None => definition,
                        }
                    }
                };
                vars.add(definition.name(def.name.clone()))
            })
            .collect();

        let objective = to_expression(model.objective(), &handles);
        let unsolved = match model.sense() {
            Sense::Minimize => vars.minimise(objective),
            Sense::Maximize => vars.maximise(objective),
        };
        let mut problem = unsolved.using(microlp);

        for constraint in model.constraints() {
            let lhs = to_expression(&constraint.expr, &handles);
            let row = match constraint.relation {
                Relation::LessEq => lhs.leq(constraint.rhs),
                Relation::GreaterEq => lhs.geq(constraint.rhs),
                Relation::Equal => lhs.eq(constraint.rhs),
            };
            problem.add_constraint(row);
        }

        debug!(
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            requested_gap = model.mip_gap(),
            "Solving with microlp"
        );

        match problem.solve() {
            Ok(solution) => {
                let values: Vec<f64> = handles.iter().map(|&h| solution.value(h)).collect();
                let objective = model.objective().evaluate(&values);
                Ok(SolveOutcome::Optimal(Solution::new(values, objective)))
            }
            Err(ResolutionError::Infeasible) => Ok(SolveOutcome::Infeasible),
            Err(ResolutionError::Unbounded) => Err(SolverError::Unbounded),
            Err(e) => Err(SolverError::Backend(e.to_string())),
        }
    }
}
