#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the residuum estimator.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Every section has defaults, so an empty file is a valid configuration.
//! - Calibrated coefficients are persisted separately (see `state`).
use serde::Deserialize;

pub mod state;

pub use state::{PersistedCoefficients, write_atomic};

/// Unit the totalizer reports in.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum TotalUnit {
    #[default]
    #[serde(rename = "L", alias = "l")]
    Litres,
    #[serde(rename = "m3", alias = "M3")]
    CubicMetres,
}

impl TotalUnit {
    /// Convert a reading in this unit to litres.
    pub fn to_litres(self, value: f64) -> f64 {
        match self {
            TotalUnit::Litres => value,
            TotalUnit::CubicMetres => value * 1000.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pipe {
    pub name: String,
    /// "L" or "m3"
    pub total_unit: TotalUnit,
}

impl Default for Pipe {
    fn default() -> Self {
        Self {
            name: "main".to_string(),
            total_unit: TotalUnit::Litres,
        }
    }
}

/// User-facing thermal parameters (the ones exposed for tuning).
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Thermal {
    /// L/min per °C/min at or above `t_warm`
    pub k_warm: f64,
    /// L/min per °C/min at or below `t_cold`
    pub k_cold: f64,
    pub t_warm: f64,
    pub t_cold: f64,
    /// Lower clip for the gradient fed into the flow conversion (°C/min, magnitude)
    pub clip: f64,
    pub max_residuum_l: f64,
    pub max_flow_l_per_min: f64,
}

impl Default for Thermal {
    fn default() -> Self {
        Self {
            k_warm: 4.0,
            k_cold: 8.0,
            t_warm: 16.0,
            t_cold: 12.0,
            clip: 2.5,
            max_residuum_l: 10.0,
            max_flow_l_per_min: 25.0,
        }
    }
}

/// Kalman noise parameters and sample debounce.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct FilterCfg {
    pub q_temp: f64,
    pub q_slope: f64,
    pub r: f64,
    /// Readings closer than this to the previous one are ignored (seconds)
    pub min_dt_s: f64,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            q_temp: 0.005,
            q_slope: 0.0005,
            r: 0.08,
            min_dt_s: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct BaselineCfg {
    pub window: usize,
    pub min_samples: usize,
    pub night_percentile: f64,
    pub day_percentile: f64,
    pub night_start_hour: u32,
    pub night_end_hour: u32,
    /// Used before any filtered temperature exists
    pub fallback_temperature: f64,
}

impl Default for BaselineCfg {
    fn default() -> Self {
        Self {
            window: 720,
            min_samples: 60,
            night_percentile: 1.0,
            day_percentile: 2.0,
            night_start_hour: 22,
            night_end_hour: 6,
            fallback_temperature: 15.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct OutlierCfg {
    pub window: usize,
    pub min_samples: usize,
    pub z_threshold: f64,
    /// Lower bound for the MAD (°C/min)
    pub mad_floor: f64,
    /// Consecutive rejections after which the level shift is accepted
    pub max_consecutive: u32,
}

impl Default for OutlierCfg {
    fn default() -> Self {
        Self {
            window: 15,
            min_samples: 5,
            z_threshold: 6.0,
            mad_floor: 0.005,
            max_consecutive: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DetectorCfg {
    /// Entry threshold (°C/min) at or above `warm_temp`
    pub warm_threshold: f64,
    /// Entry threshold (°C/min) at or below `cold_temp`
    pub cold_threshold: f64,
    pub warm_temp: f64,
    pub cold_temp: f64,
    pub exit_ratio: f64,
    pub night_factor: f64,
    pub deep_sleep_factor: f64,
    pub deep_sleep_after_s: f64,
    pub confirmation_samples: u32,
    /// Below this filtered temperature the variance path is consulted
    pub cold_regime_below: f64,
    pub strong_factor: f64,
    pub variance_window: usize,
    pub variance_min_samples: usize,
    pub variance_ratio_cold: f64,
    pub variance_ratio_warm: f64,
}

impl Default for DetectorCfg {
    fn default() -> Self {
        Self {
            warm_threshold: -0.008,
            cold_threshold: -0.002,
            warm_temp: 20.0,
            cold_temp: 8.0,
            exit_ratio: 0.33,
            night_factor: 1.25,
            deep_sleep_factor: 1.2,
            deep_sleep_after_s: 7200.0,
            confirmation_samples: 3,
            cold_regime_below: 10.0,
            strong_factor: 3.0,
            variance_window: 30,
            variance_min_samples: 10,
            variance_ratio_cold: 2.0,
            variance_ratio_warm: 4.0,
        }
    }
}

/// Acceptance gate thresholds (°C/min) keyed by time since the last totalizer tick.
///
/// Before the first tick the gate falls back to the scaled entry threshold.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct GateCfg {
    pub fresh_tick_s: f64,
    pub fresh: f64,
    pub recent_tick_s: f64,
    pub recent: f64,
    pub stale: f64,
    pub deep_sleep_factor: f64,
    /// |d²T/dt²| below this everywhere in the history marks linear drift
    pub drift_epsilon: f64,
    pub drift_history: usize,
}

impl Default for GateCfg {
    fn default() -> Self {
        Self {
            fresh_tick_s: 300.0,
            fresh: -0.01,
            recent_tick_s: 1800.0,
            recent: -0.08,
            stale: -0.20,
            deep_sleep_factor: 1.2,
            drift_epsilon: 0.003,
            drift_history: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CalibrationCfg {
    pub tick_l: f64,
    pub tick_min_l: f64,
    pub tick_max_l: f64,
    pub min_residuum_l: f64,
    pub plausible_min_l: f64,
    pub plausible_max_l: f64,
    pub correction_min: f64,
    pub correction_max: f64,
    /// Fraction of the full correction applied per tick
    pub step: f64,
    pub regression_tolerance_l: f64,
    /// Uncertainty accrued per litre integrated
    pub uncertainty_rate: f64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            tick_l: 10.0,
            tick_min_l: 9.5,
            tick_max_l: 10.5,
            min_residuum_l: 1.0,
            plausible_min_l: 4.0,
            plausible_max_l: 16.0,
            correction_min: 0.7,
            correction_max: 1.3,
            step: 0.25,
            regression_tolerance_l: 0.1,
            uncertainty_rate: 0.12,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct VibrationCfg {
    pub std_threshold: f64,
    pub std_max: f64,
    pub flow_max_l_per_min: f64,
    pub active_above_l_per_min: f64,
    pub max_dt_s: f64,
    pub max_residuum_l: f64,
    /// Jumps up to this size re-sync the volume; larger ones only move the reference
    pub resync_max_l: f64,
}

impl Default for VibrationCfg {
    fn default() -> Self {
        Self {
            std_threshold: 0.048,
            std_max: 0.060,
            flow_max_l_per_min: 30.0,
            active_above_l_per_min: 0.1,
            max_dt_s: 60.0,
            max_residuum_l: 100.0,
            resync_max_l: 100.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pipe: Pipe,
    pub thermal: Thermal,
    pub filter: FilterCfg,
    pub baseline: BaselineCfg,
    pub outlier: OutlierCfg,
    pub detector: DetectorCfg,
    pub gate: GateCfg,
    pub calibration: CalibrationCfg,
    /// Enables the vibration estimator when present
    pub vibration: Option<VibrationCfg>,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Upper bound for a plausible household draw.
const MAX_FLOW_L_PER_MIN: f64 = 25.0;

fn finite_in(v: f64, lo: f64, hi: f64) -> bool {
    v.is_finite() && (lo..=hi).contains(&v)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pipe
        if self.pipe.name.trim().is_empty() {
            eyre::bail!("pipe.name must not be empty");
        }

        // Thermal
        let t = &self.thermal;
        if !finite_in(t.k_warm, 0.5, 15.0) {
            eyre::bail!("thermal.k_warm must be in [0.5, 15.0]");
        }
        if !finite_in(t.k_cold, 0.5, 10.0) {
            eyre::bail!("thermal.k_cold must be in [0.5, 10.0]");
        }
        if !finite_in(t.t_warm, 5.0, 35.0) {
            eyre::bail!("thermal.t_warm must be in [5.0, 35.0]");
        }
        if !finite_in(t.t_cold, 5.0, 35.0) {
            eyre::bail!("thermal.t_cold must be in [5.0, 35.0]");
        }
        if !finite_in(t.clip, 0.5, 5.0) {
            eyre::bail!("thermal.clip must be in [0.5, 5.0]");
        }
        if !finite_in(t.max_residuum_l, 5.0, 50.0) {
            eyre::bail!("thermal.max_residuum_l must be in [5.0, 50.0]");
        }
        if !(t.max_flow_l_per_min.is_finite()
            && t.max_flow_l_per_min > 0.0
            && t.max_flow_l_per_min <= MAX_FLOW_L_PER_MIN)
        {
            eyre::bail!("thermal.max_flow_l_per_min must be in (0, 25]");
        }

        // Filter
        let f = &self.filter;
        if !(f.q_temp.is_finite() && f.q_temp > 0.0) {
            eyre::bail!("filter.q_temp must be > 0");
        }
        if !(f.q_slope.is_finite() && f.q_slope > 0.0) {
            eyre::bail!("filter.q_slope must be > 0");
        }
        if !(f.r.is_finite() && f.r > 0.0) {
            eyre::bail!("filter.r must be > 0");
        }
        if !(f.min_dt_s.is_finite() && f.min_dt_s >= 0.0) {
            eyre::bail!("filter.min_dt_s must be >= 0");
        }

        // Baseline
        let b = &self.baseline;
        if b.window == 0 {
            eyre::bail!("baseline.window must be >= 1");
        }
        if b.min_samples == 0 || b.min_samples > b.window {
            eyre::bail!("baseline.min_samples must be in [1, baseline.window]");
        }
        if !finite_in(b.night_percentile, 0.0, 100.0) || !finite_in(b.day_percentile, 0.0, 100.0)
        {
            eyre::bail!("baseline percentiles must be in [0, 100]");
        }
        if b.night_percentile > b.day_percentile {
            eyre::bail!("baseline.night_percentile must be <= baseline.day_percentile");
        }
        if b.night_start_hour > 23 || b.night_end_hour > 23 {
            eyre::bail!("baseline night hours must be in [0, 23]");
        }
        if !b.fallback_temperature.is_finite() {
            eyre::bail!("baseline.fallback_temperature must be finite");
        }

        // Outlier guard
        let o = &self.outlier;
        if o.window == 0 {
            eyre::bail!("outlier.window must be >= 1");
        }
        if o.min_samples == 0 || o.min_samples > o.window {
            eyre::bail!("outlier.min_samples must be in [1, outlier.window]");
        }
        if !(o.z_threshold.is_finite() && o.z_threshold > 0.0) {
            eyre::bail!("outlier.z_threshold must be > 0");
        }
        if !(o.mad_floor.is_finite() && o.mad_floor >= 0.0) {
            eyre::bail!("outlier.mad_floor must be >= 0");
        }
        if o.max_consecutive == 0 {
            eyre::bail!("outlier.max_consecutive must be >= 1");
        }

        // Detector
        let d = &self.detector;
        if !(d.warm_threshold.is_finite() && d.warm_threshold < 0.0)
            || !(d.cold_threshold.is_finite() && d.cold_threshold < 0.0)
        {
            eyre::bail!("detector thresholds must be negative");
        }
        if !(d.warm_temp.is_finite() && d.cold_temp.is_finite() && d.cold_temp < d.warm_temp) {
            eyre::bail!("detector.cold_temp must be < detector.warm_temp");
        }
        if !finite_in(d.exit_ratio, 0.0, 1.0) {
            eyre::bail!("detector.exit_ratio must be in [0.0, 1.0]");
        }
        if !(d.night_factor.is_finite() && d.night_factor > 0.0) {
            eyre::bail!("detector.night_factor must be > 0");
        }
        if !(d.deep_sleep_factor.is_finite() && d.deep_sleep_factor > 0.0) {
            eyre::bail!("detector.deep_sleep_factor must be > 0");
        }
        if !(d.deep_sleep_after_s.is_finite() && d.deep_sleep_after_s > 0.0) {
            eyre::bail!("detector.deep_sleep_after_s must be > 0");
        }
        if d.confirmation_samples == 0 {
            eyre::bail!("detector.confirmation_samples must be >= 1");
        }
        if !(d.strong_factor.is_finite() && d.strong_factor >= 1.0) {
            eyre::bail!("detector.strong_factor must be >= 1");
        }
        if d.variance_window == 0 {
            eyre::bail!("detector.variance_window must be >= 1");
        }
        if d.variance_min_samples < 2 || d.variance_min_samples > d.variance_window {
            eyre::bail!("detector.variance_min_samples must be in [2, detector.variance_window]");
        }
        if !(d.variance_ratio_cold > 1.0 && d.variance_ratio_warm > 1.0) {
            eyre::bail!("detector variance ratios must be > 1");
        }

        // Gate
        let g = &self.gate;
        for (name, v) in [
            ("gate.fresh", g.fresh),
            ("gate.recent", g.recent),
            ("gate.stale", g.stale),
        ] {
            if !(v.is_finite() && v < 0.0) {
                eyre::bail!("{name} must be negative");
            }
        }
        if !(g.fresh_tick_s > 0.0 && g.fresh_tick_s < g.recent_tick_s) {
            eyre::bail!("gate.fresh_tick_s must be > 0 and < gate.recent_tick_s");
        }
        if !(g.deep_sleep_factor.is_finite() && g.deep_sleep_factor > 0.0) {
            eyre::bail!("gate.deep_sleep_factor must be > 0");
        }
        if !(g.drift_epsilon.is_finite() && g.drift_epsilon >= 0.0) {
            eyre::bail!("gate.drift_epsilon must be >= 0");
        }
        if g.drift_history == 0 {
            eyre::bail!("gate.drift_history must be >= 1");
        }

        // Calibration
        let c = &self.calibration;
        if !(c.tick_l > 0.0 && c.tick_min_l <= c.tick_l && c.tick_l <= c.tick_max_l) {
            eyre::bail!(
                "calibration.tick_min_l <= calibration.tick_l <= calibration.tick_max_l required"
            );
        }
        if !(c.plausible_min_l >= 0.0 && c.plausible_min_l < c.plausible_max_l) {
            eyre::bail!("calibration.plausible_min_l must be < calibration.plausible_max_l");
        }
        if !(c.correction_min > 0.0 && c.correction_min <= 1.0 && c.correction_max >= 1.0) {
            eyre::bail!("calibration correction bounds must bracket 1.0");
        }
        if !finite_in(c.step, 0.0, 1.0) {
            eyre::bail!("calibration.step must be in [0.0, 1.0]");
        }
        if !(c.regression_tolerance_l.is_finite() && c.regression_tolerance_l >= 0.0) {
            eyre::bail!("calibration.regression_tolerance_l must be >= 0");
        }
        if !finite_in(c.uncertainty_rate, 0.0, 1.0) {
            eyre::bail!("calibration.uncertainty_rate must be in [0.0, 1.0]");
        }

        // Vibration
        if let Some(v) = &self.vibration {
            if !(v.std_threshold.is_finite() && v.std_threshold >= 0.0) {
                eyre::bail!("vibration.std_threshold must be >= 0");
            }
            if !(v.std_max.is_finite() && v.std_max > v.std_threshold) {
                eyre::bail!("vibration.std_max must be > vibration.std_threshold");
            }
            if !(v.flow_max_l_per_min.is_finite() && v.flow_max_l_per_min > 0.0) {
                eyre::bail!("vibration.flow_max_l_per_min must be > 0");
            }
            if !(v.max_dt_s.is_finite() && v.max_dt_s > 0.0) {
                eyre::bail!("vibration.max_dt_s must be > 0");
            }
            if !(v.max_residuum_l.is_finite() && v.max_residuum_l > 0.0) {
                eyre::bail!("vibration.max_residuum_l must be > 0");
            }
            if !(v.resync_max_l.is_finite() && v.resync_max_l >= c.tick_max_l) {
                eyre::bail!("vibration.resync_max_l must be >= calibration.tick_max_l");
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = load_toml("").unwrap();
        assert_eq!(cfg.pipe.name, "main");
        assert_eq!(cfg.thermal.k_warm, 4.0);
        assert_eq!(cfg.baseline.window, 720);
        assert!(cfg.vibration.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn cubic_metres_convert_to_litres() {
        assert!((TotalUnit::CubicMetres.to_litres(0.11) - 110.0).abs() < 1e-9);
        assert_eq!(TotalUnit::Litres.to_litres(110.0), 110.0);
    }
}
