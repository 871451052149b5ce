//! Planner Metrics
//!
//! Prometheus counters for sub-problem solves. Each planner owns its own
//! registry so tests and repeated runs never collide on registration.

use crate::model::Stage;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

pub struct PlannerMetrics {
    registry: Registry,
    solves: IntCounterVec,
    solve_seconds: HistogramVec,
    model_size: IntGaugeVec,
}

impl PlannerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let solves = IntCounterVec::new(
            Opts::new("flight_assign_solves_total", "Sub-problem solves by outcome"),
            &["stage", "outcome"],
        )?;
        let solve_seconds = HistogramVec::new(
            HistogramOpts::new("flight_assign_solve_seconds", "Wall time of one sub-problem solve")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
            &["stage"],
        )?;
        let model_size = IntGaugeVec::new(
            Opts::new("flight_assign_model_size", "Variables and constraints of the last model"),
            &["stage", "kind"],
        )?;

        registry.register(Box::new(solves.clone()))?;
        registry.register(Box::new(solve_seconds.clone()))?;
        registry.register(Box::new(model_size.clone()))?;

        Ok(PlannerMetrics {
            registry,
            solves,
            solve_seconds,
            model_size,
        })
    }

    pub fn record_model(&self, stage: Stage, variables: usize, constraints: usize) {
        let stage = stage.to_string();
        self.model_size
            .with_label_values(&[stage.as_str(), "variables"])
            .set(variables as i64);
        self.model_size
            .with_label_values(&[stage.as_str(), "constraints"])
            .set(constraints as i64);
    }

    pub fn record_solve(&self, stage: Stage, outcome: &str, seconds: f64) {
        let stage = stage.to_string();
        self.solves.with_label_values(&[stage.as_str(), outcome]).inc();
        self.solve_seconds
            .with_label_values(&[stage.as_str()])
            .observe(seconds);
    }

    /// Text exposition format of everything recorded so far
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
