//! Runtime configuration for the estimators.
//!
//! These are the structs the pipeline components hold. They are separate from
//! the TOML-deserialized schema in `residuum_config`; defaults are taken from
//! there so both sides agree (see `conversions`).

use residuum_config::TotalUnit;

/// User-tunable thermal parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalParams {
    pub k_warm: f64,
    pub k_cold: f64,
    pub t_warm: f64,
    pub t_cold: f64,
    /// Magnitude limit (°C/min) for the gradient fed into the flow conversion.
    pub clip: f64,
    pub max_residuum_l: f64,
    /// Flow estimates above this are capped (L/min).
    pub max_flow_l_per_min: f64,
}

/// Kalman noise parameters plus the debounce interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanCfg {
    pub q_temp: f64,
    pub q_slope: f64,
    pub r: f64,
    pub min_dt_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineCfg {
    pub window: usize,
    pub min_samples: usize,
    pub night_percentile: f64,
    pub day_percentile: f64,
    pub night_start_hour: u32,
    pub night_end_hour: u32,
    pub fallback_temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierCfg {
    pub window: usize,
    pub min_samples: usize,
    pub z_threshold: f64,
    pub mad_floor: f64,
    pub max_consecutive: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorCfg {
    pub warm_threshold: f64,
    pub cold_threshold: f64,
    pub warm_temp: f64,
    pub cold_temp: f64,
    pub exit_ratio: f64,
    pub night_factor: f64,
    pub deep_sleep_factor: f64,
    pub deep_sleep_after_s: f64,
    pub confirmation_samples: u32,
    pub cold_regime_below: f64,
    pub strong_factor: f64,
    pub variance_window: usize,
    pub variance_min_samples: usize,
    pub variance_ratio_cold: f64,
    pub variance_ratio_warm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateCfg {
    pub fresh_tick_s: f64,
    pub fresh: f64,
    pub recent_tick_s: f64,
    pub recent: f64,
    pub stale: f64,
    pub deep_sleep_factor: f64,
    pub drift_epsilon: f64,
    pub drift_history: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationCfg {
    pub tick_l: f64,
    pub tick_min_l: f64,
    pub tick_max_l: f64,
    pub min_residuum_l: f64,
    pub plausible_min_l: f64,
    pub plausible_max_l: f64,
    pub correction_min: f64,
    pub correction_max: f64,
    pub step: f64,
    pub regression_tolerance_l: f64,
    pub uncertainty_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VibrationParams {
    pub std_threshold: f64,
    pub std_max: f64,
    pub flow_max_l_per_min: f64,
    pub active_above_l_per_min: f64,
    pub max_dt_s: f64,
    pub max_residuum_l: f64,
    pub resync_max_l: f64,
    pub tick_l: f64,
    pub tick_min_l: f64,
    pub tick_max_l: f64,
    pub regression_tolerance_l: f64,
    pub unit: TotalUnit,
}

/// Everything one `ThermalEstimator` needs.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorCfg {
    pub name: String,
    pub unit: TotalUnit,
    pub thermal: ThermalParams,
    pub kalman: KalmanCfg,
    pub baseline: BaselineCfg,
    pub outlier: OutlierCfg,
    pub detector: DetectorCfg,
    pub gate: GateCfg,
    pub calibration: CalibrationCfg,
}

impl Default for ThermalParams {
    fn default() -> Self {
        (&residuum_config::Thermal::default()).into()
    }
}

impl Default for KalmanCfg {
    fn default() -> Self {
        (&residuum_config::FilterCfg::default()).into()
    }
}

impl Default for BaselineCfg {
    fn default() -> Self {
        (&residuum_config::BaselineCfg::default()).into()
    }
}

impl Default for OutlierCfg {
    fn default() -> Self {
        (&residuum_config::OutlierCfg::default()).into()
    }
}

impl Default for DetectorCfg {
    fn default() -> Self {
        (&residuum_config::DetectorCfg::default()).into()
    }
}

impl Default for GateCfg {
    fn default() -> Self {
        (&residuum_config::GateCfg::default()).into()
    }
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        (&residuum_config::CalibrationCfg::default()).into()
    }
}

impl Default for VibrationParams {
    fn default() -> Self {
        VibrationParams::from_parts(
            &residuum_config::VibrationCfg::default(),
            &residuum_config::CalibrationCfg::default(),
            TotalUnit::default(),
        )
    }
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        (&residuum_config::Config::default()).into()
    }
}
