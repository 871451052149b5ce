//! Error Types

use crate::model::Stage;
use thiserror::Error;

/// Input tables that cannot be turned into a planning scenario
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read input document: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed input document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown aircraft category '{category}' on flight {flight}")]
    AircraftCategory { flight: String, category: String },
    #[error("Duplicate {direction} flight id {flight}")]
    DuplicateFlight { flight: String, direction: String },
    #[error("Target table for {stage} references unknown carrier '{carrier}'")]
    UnknownCarrier { stage: Stage, carrier: String },
    #[error("Target row {carrier}/{route} has {found} hourly values, expected 24")]
    TargetWidth {
        carrier: String,
        route: String,
        found: usize,
    },
}

/// Failure at the solver boundary
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Model is unbounded")]
    Unbounded,
    #[error("Solver backend failed: {0}")]
    Backend(String),
}

/// Failure of a planning run
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(
        "{stage} has no feasible assignment; conflicting constraints: {}",
        conflicts.join(", ")
    )]
    Infeasible { stage: Stage, conflicts: Vec<String> },
    #[error("{stage} solve failed: {source}")]
    Solver {
        stage: Stage,
        #[source]
        source: SolverError,
    },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl PlanError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PlanError::Infeasible { stage, .. } | PlanError::Solver { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Named constraints of the irreducible infeasible subset, if any
    pub fn conflicts(&self) -> &[String] {
        match self {
            PlanError::Infeasible { conflicts, .. } => conflicts,
            _ => &[],
        }
    }
}
