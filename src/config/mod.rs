//! Run Settings
//!
//! Tunables of a planning run: per-stage tolerances and optimality gaps,
//! objective weights and the carry-forward seed. Layered as defaults, then an
//! optional settings file, then `FLIGHT_ASSIGN__*` environment variables.

use crate::model::{Direction, Market, Stage};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming an optional settings file
pub const CONFIG_PATH_ENV: &str = "FLIGHT_ASSIGN_CONFIG";

/// Tolerances of one sub-problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    /// Relative optimality gap handed to the backend
    pub mip_gap: f64,
    /// Allowed shortfall per carrier and hour against history
    pub wave_bias: u32,
    /// Band half-width around each carrier's wide-body quota
    pub wide_body_bias: u32,
    /// Wider band for the catch-all carrier, if any
    pub catch_all_wide_body_bias: Option<u32>,
    /// Departure carrier quota band; arrival quotas are always exact
    pub carrier_quota_bias: u32,
    pub route_quota_bias: u32,
    /// Wide-body count must exceed the historical ratio by this much
    pub wide_ratio_margin: f64,
}

impl Default for StageSettings {
    fn default() -> Self {
        StageSettings {
            mip_gap: 0.01,
            wave_bias: 0,
            wide_body_bias: 0,
            catch_all_wide_body_bias: None,
            carrier_quota_bias: 0,
            route_quota_bias: 0,
            wide_ratio_margin: 0.0,
        }
    }
}

/// Settings of a planning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name of the generic catch-all carrier group
    pub catch_all_carrier: String,
    /// Weight of the hourly-wave deviation term
    pub wave_weight: f64,
    /// Weight of the fine-grained distribution term
    pub distribution_weight: f64,
    pub carry_forward_seed: Option<u64>,
    pub dom_arr: StageSettings,
    pub int_arr: StageSettings,
    pub dom_dep: StageSettings,
    pub int_dep: StageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            catch_all_carrier: "Other".to_string(),
            wave_weight: 10_000.0,
            distribution_weight: 100.0,
            carry_forward_seed: None,
            dom_arr: StageSettings {
                mip_gap: 0.01,
                ..StageSettings::default()
            },
            int_arr: StageSettings {
                mip_gap: 0.07,
                ..StageSettings::default()
            },
            dom_dep: StageSettings {
                mip_gap: 0.02,
                wave_bias: 3,
                wide_body_bias: 2,
                catch_all_wide_body_bias: Some(6),
                wide_ratio_margin: 0.0001,
                ..StageSettings::default()
            },
            int_dep: StageSettings {
                mip_gap: 0.01,
                wave_bias: 2,
                wide_body_bias: 2,
                wide_ratio_margin: 0.0001,
                ..StageSettings::default()
            },
        }
    }
}

impl Settings {
    /// Load settings from `.env`, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ::config::ConfigError> {
        dotenvy::dotenv().ok();

        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(Into::into));

        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix("FLIGHT_ASSIGN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn stage(&self, stage: Stage) -> &StageSettings {
        match (stage.market, stage.direction) {
            (Market::Domestic, Direction::Arrival) => &self.dom_arr,
            (Market::International, Direction::Arrival) => &self.int_arr,
            (Market::Domestic, Direction::Departure) => &self.dom_dep,
            (Market::International, Direction::Departure) => &self.int_dep,
        }
    }

    /// Wide-body band half-width for a carrier in a stage
    pub fn wide_body_bias(&self, stage: Stage, carrier: &str) -> u32 {
        let stage_settings = self.stage(stage);
        if carrier == self.catch_all_carrier {
            if let Some(bias) = stage_settings.catch_all_wide_body_bias {
                return bias;
            }
        }
        stage_settings.wide_body_bias
    }

    pub fn is_catch_all(&self, carrier: &str) -> bool {
        carrier == self.catch_all_carrier
    }
}
