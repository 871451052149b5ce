//! Solver Boundary
//!
//! Backend-neutral MILP model that the constraint and objective builders write
//! into, and the narrow `SolverBackend` interface that optimizes it. Any
//! backend that can solve a `MilpModel` can be substituted without touching
//! model construction.

mod microlp;

pub use self::microlp::MicroLpBackend;

use crate::constraints::ConstraintFamily;
use crate::error::SolverError;

/// Handle to a decision variable of a `MilpModel`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Binary,
    Continuous { lower: f64, upper: Option<f64> },
}

#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: String,
    pub kind: VarKind,
}

/// Affine expression `Σ coef·var + constant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        LinearExpr::default()
    }

    pub fn constant(value: f64) -> Self {
        LinearExpr {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Sum of the given variables with unit coefficients
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        LinearExpr {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
            constant: 0.0,
        }
    }

    pub fn add_term(&mut self, var: VarId, coef: f64) {
        self.terms.push((var, coef));
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// `self += factor · other`
    pub fn add_scaled(&mut self, other: &LinearExpr, factor: f64) {
        self.terms
            .extend(other.terms.iter().map(|&(v, c)| (v, c * factor)));
        self.constant += other.constant * factor;
    }

    pub fn scaled(&self, factor: f64) -> LinearExpr {
        let mut out = LinearExpr::new();
        out.add_scaled(self, factor);
        out
    }

    /// `self − other`
    pub fn minus(&self, other: &LinearExpr) -> LinearExpr {
        let mut out = self.clone();
        out.add_scaled(other, -1.0);
        out
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_part(&self) -> f64 {
        self.constant
    }

    pub fn has_variables(&self) -> bool {
        self.terms.iter().any(|&(_, c)| c != 0.0)
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|&(v, c)| c * values[v.index()])
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    GreaterEq,
    Equal,
}

impl Relation {
    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        const EPS: f64 = 1e-6;
        match self {
            Relation::LessEq => lhs <= rhs + EPS,
            Relation::GreaterEq => lhs >= rhs - EPS,
            Relation::Equal => (lhs - rhs).abs() <= EPS,
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::LessEq => write!(f, "<="),
            Relation::GreaterEq => write!(f, ">="),
            Relation::Equal => write!(f, "=="),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// `expr relation rhs`, identified by a unique name
#[derive(Debug, Clone)]
pub struct NamedConstraint {
    pub name: String,
    pub family: ConstraintFamily,
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

/// In-memory MILP model
#[derive(Debug, Clone)]
pub struct MilpModel {
    variables: Vec<VariableDef>,
    constraints: Vec<NamedConstraint>,
    /// Constraints without variables whose constant side is already violated
    violated: Vec<String>,
    objective: LinearExpr,
    sense: Sense,
    mip_gap: f64,
}

impl Default for MilpModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MilpModel {
    pub fn new() -> Self {
        MilpModel {
            variables: Vec::new(),
            constraints: Vec::new(),
            violated: Vec::new(),
            objective: LinearExpr::new(),
            sense: Sense::Minimize,
            mip_gap: 0.0,
        }
    }

    pub fn add_binary_variable(&mut self, name: impl Into<String>) -> VarId {
        self.push_variable(name.into(), VarKind::Binary)
    }

    pub fn add_continuous_variable(
        &mut self,
        name: impl Into<String>,
        lower: f64,
        upper: Option<f64>,
    ) -> VarId {
        self.push_variable(name.into(), VarKind::Continuous { lower, upper })
    }

    fn push_variable(&mut self, name: String, kind: VarKind) -> VarId {
        self.variables.push(VariableDef { name, kind });
        VarId(self.variables.len() - 1)
    }

    /// Add `expr relation bound`. The constant part of `expr` moves to the
    /// right-hand side; constraints without variables are checked immediately.
    pub fn add_linear_constraint(
        &mut self,
        expr: LinearExpr,
        relation: Relation,
        bound: f64,
        name: impl Into<String>,
        family: ConstraintFamily,
    ) {
        let name = name.into();
        let rhs = bound - expr.constant;
        if !expr.has_variables() {
            if !relation.holds(0.0, rhs) {
                self.violated.push(name);
            }
            return;
        }
        let expr = LinearExpr {
            terms: expr.terms,
            constant: 0.0,
        };
        self.constraints.push(NamedConstraint {
            name,
            family,
            expr,
            relation,
            rhs,
        });
    }

    pub fn set_objective(&mut self, expr: LinearExpr, sense: Sense) {
        self.objective = expr;
        self.sense = sense;
    }

    pub fn set_mip_gap(&mut self, gap: f64) {
        self.mip_gap = gap;
    }

    pub fn variables(&self) -> &[VariableDef] {
        &self.variables
    }

    pub fn constraints(&self) -> &[NamedConstraint] {
        &self.constraints
    }

    pub fn violated_constraints(&self) -> &[String] {
        &self.violated
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn mip_gap(&self) -> f64 {
        self.mip_gap
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraint(&self, name: &str) -> Option<&NamedConstraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Feasibility model keeping only the constraints at the given positions
    pub fn feasibility_subset(&self, keep: &[usize]) -> MilpModel {
        MilpModel {
            variables: self.variables.clone(),
            constraints: keep.iter().map(|&i| self.constraints[i].clone()).collect(),
            violated: Vec::new(),
            objective: LinearExpr::new(),
            sense: Sense::Minimize,
            mip_gap: self.mip_gap,
        }
    }
}

/// Variable values at the optimum
#[derive(Debug, Clone)]
pub struct Solution {
    values: Vec<f64>,
    objective: f64,
}

impl Solution {
    pub fn new(values: Vec<f64>, objective: f64) -> Self {
        Solution { values, objective }
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }

    /// Binary decision taken at the optimum
    pub fn is_set(&self, var: VarId) -> bool {
        self.value(var) > 0.5
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }
}

#[derive(Debug, Clone)]
pub enum SolveOutcome {
    Optimal(Solution),
    Infeasible,
}

/// A MILP solver able to optimize a `MilpModel`
pub trait SolverBackend {
    fn name(&self) -> &'static str;

    /// One blocking solve to the model's gap, or an infeasibility signal
    fn solve(&self, model: &MilpModel) -> Result<SolveOutcome, SolverError>;

    /// Names of an irreducible infeasible subset of the model's constraints.
    /// Backends with native conflict refinement may override this.
    fn compute_conflict_set(&self, model: &MilpModel) -> Result<Vec<String>, SolverError> {
        crate::diagnostics::deletion_filter(self, model)
    }
}
