//! Flight Carrier and Heading Assignment
//!
//! Plans a future flight schedule by giving every flight of the planned day
//! a carrier group and a heading. Each (market, direction) sub-problem is a
//! MILP that keeps quotas exact, preserves historical patterns and minimizes
//! deviation from the historical hourly distribution.

pub mod candidates;
pub mod carry;
pub mod config;
pub mod constraints;
pub mod coupler;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod history;
pub mod metrics;
pub mod model;
pub mod objective;
pub mod planner;
pub mod solver;

pub use crate::config::Settings;
pub use crate::dataset::{load_scenario, Scenario};
pub use crate::error::{DatasetError, PlanError, SolverError};
pub use crate::planner::{PlanOutcome, Planner};
pub use crate::solver::{MicroLpBackend, SolverBackend};
