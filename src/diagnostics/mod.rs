//! Infeasibility Diagnostics
//!
//! Extracts an irreducible infeasible subset (IIS) of named constraints from a
//! model that has no solution, so an operator can relax a specific bias or
//! quota and rerun.

use crate::constraints::ConstraintFamily;
use crate::error::SolverError;
use crate::solver::{MilpModel, SolveOutcome, SolverBackend};
use tracing::{debug, info, warn};

/// Deletion filter over the named constraints of `model`.
///
/// Deviation rows are dropped up front since their auxiliary variables are
/// unbounded above. Every remaining constraint is tentatively removed; if the
/// rest stays infeasible it is dropped for good, otherwise it belongs to the
/// conflict. The result is minimal: removing any member makes it feasible.
pub fn deletion_filter<B: SolverBackend + ?Sized>(
    backend: &B,
    model: &MilpModel,
) -> Result<Vec<String>, SolverError> {
    if let Some(name) = model.violated_constraints().first() {
        return Ok(vec![name.clone()]);
    }

    let mut kept: Vec<usize> = model
        .constraints()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.family != ConstraintFamily::Deviation)
        .map(|(i, _)| i)
        .collect();

    if is_feasible(backend, model, &kept)? {
        warn!("Hard constraints are jointly feasible; no conflict set to report");
        return Ok(Vec::new());
    }

    info!(candidates = kept.len(), "Computing conflicting constraint set");

    let mut cursor = 0;
    while cursor < kept.len() {
        let mut trial = kept.clone();
        let removed = trial.remove(cursor);
        if is_feasible(backend, model, &trial)? {
            cursor += 1;
        } else {
            debug!(constraint = %model.constraints()[removed].name, "Not part of the conflict");
            kept = trial;
        }
    }

    Ok(kept
        .into_iter()
        .map(|i| model.constraints()[i].name.clone())
        .collect())
}

fn is_feasible<B: SolverBackend + ?Sized>(
    backend: &B,
    model: &MilpModel,
    keep: &[usize],
) -> Result<bool, SolverError> {
    let subset = model.feasibility_subset(keep);
    Ok(matches!(backend.solve(&subset)?, SolveOutcome::Optimal(_)))
}
