//! Read-only views handed to observers and display layers.

use chrono::NaiveDateTime;

/// Current state of a `ThermalEstimator`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub at: Option<NaiveDateTime>,
    pub flow_l_per_min: f64,
    pub volume_l: f64,
    pub offset_l: f64,
    pub residuum_l: f64,
    pub uncertainty_l: f64,
    pub active_k: f64,
    pub filtered_temperature: Option<f64>,
    pub raw_temperature: Option<f64>,
    /// Baseline-corrected gradient (°C/min) of the last processed sample.
    pub gradient: f64,
    pub night_mode: bool,
    pub deep_sleep: bool,
    pub flow_active: bool,
    pub variance_ratio: Option<f64>,
    pub variance_flow: bool,
    pub k_warm: f64,
    pub k_cold: f64,
    pub last_totalizer_l: Option<f64>,
}

/// Current state of a `VibrationEstimator`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VibrationSnapshot {
    pub at: Option<NaiveDateTime>,
    pub flow_l_per_min: f64,
    pub volume_l: f64,
    pub offset_l: f64,
    pub residuum_l: f64,
    pub flow_active: bool,
    pub last_std: Option<f64>,
    /// Highest 10 L mark reached by the residuum.
    pub liter_mark: u32,
    pub last_totalizer_l: Option<f64>,
}
