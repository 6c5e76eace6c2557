//! `From` implementations bridging `residuum_config` types to runtime types.

use crate::config::{
    BaselineCfg, CalibrationCfg, DetectorCfg, EstimatorCfg, GateCfg, KalmanCfg, OutlierCfg,
    ThermalParams, VibrationParams,
};
use residuum_config::TotalUnit;

// ── ThermalParams ────────────────────────────────────────────────────────────

impl From<&residuum_config::Thermal> for ThermalParams {
    fn from(c: &residuum_config::Thermal) -> Self {
        Self {
            k_warm: c.k_warm,
            k_cold: c.k_cold,
            t_warm: c.t_warm,
            t_cold: c.t_cold,
            clip: c.clip,
            max_residuum_l: c.max_residuum_l,
            max_flow_l_per_min: c.max_flow_l_per_min,
        }
    }
}

// ── KalmanCfg ────────────────────────────────────────────────────────────────

impl From<&residuum_config::FilterCfg> for KalmanCfg {
    fn from(c: &residuum_config::FilterCfg) -> Self {
        Self {
            q_temp: c.q_temp,
            q_slope: c.q_slope,
            r: c.r,
            min_dt_s: c.min_dt_s,
        }
    }
}

// ── BaselineCfg ──────────────────────────────────────────────────────────────

impl From<&residuum_config::BaselineCfg> for BaselineCfg {
    fn from(c: &residuum_config::BaselineCfg) -> Self {
        Self {
            window: c.window.max(1),
            min_samples: c.min_samples,
            night_percentile: c.night_percentile,
            day_percentile: c.day_percentile,
            night_start_hour: c.night_start_hour,
            night_end_hour: c.night_end_hour,
            fallback_temperature: c.fallback_temperature,
        }
    }
}

// ── OutlierCfg ───────────────────────────────────────────────────────────────

impl From<&residuum_config::OutlierCfg> for OutlierCfg {
    fn from(c: &residuum_config::OutlierCfg) -> Self {
        Self {
            window: c.window.max(1),
            min_samples: c.min_samples,
            z_threshold: c.z_threshold,
            mad_floor: c.mad_floor,
            max_consecutive: c.max_consecutive.max(1),
        }
    }
}

// ── DetectorCfg ──────────────────────────────────────────────────────────────

impl From<&residuum_config::DetectorCfg> for DetectorCfg {
    fn from(c: &residuum_config::DetectorCfg) -> Self {
        Self {
            warm_threshold: c.warm_threshold,
            cold_threshold: c.cold_threshold,
            warm_temp: c.warm_temp,
            cold_temp: c.cold_temp,
            exit_ratio: c.exit_ratio,
            night_factor: c.night_factor,
            deep_sleep_factor: c.deep_sleep_factor,
            deep_sleep_after_s: c.deep_sleep_after_s,
            confirmation_samples: c.confirmation_samples.max(1),
            cold_regime_below: c.cold_regime_below,
            strong_factor: c.strong_factor,
            variance_window: c.variance_window.max(1),
            variance_min_samples: c.variance_min_samples,
            variance_ratio_cold: c.variance_ratio_cold,
            variance_ratio_warm: c.variance_ratio_warm,
        }
    }
}

// ── GateCfg ──────────────────────────────────────────────────────────────────

impl From<&residuum_config::GateCfg> for GateCfg {
    fn from(c: &residuum_config::GateCfg) -> Self {
        Self {
            fresh_tick_s: c.fresh_tick_s,
            fresh: c.fresh,
            recent_tick_s: c.recent_tick_s,
            recent: c.recent,
            stale: c.stale,
            deep_sleep_factor: c.deep_sleep_factor,
            drift_epsilon: c.drift_epsilon,
            drift_history: c.drift_history.max(1),
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&residuum_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &residuum_config::CalibrationCfg) -> Self {
        Self {
            tick_l: c.tick_l,
            tick_min_l: c.tick_min_l,
            tick_max_l: c.tick_max_l,
            min_residuum_l: c.min_residuum_l,
            plausible_min_l: c.plausible_min_l,
            plausible_max_l: c.plausible_max_l,
            correction_min: c.correction_min,
            correction_max: c.correction_max,
            step: c.step,
            regression_tolerance_l: c.regression_tolerance_l,
            uncertainty_rate: c.uncertainty_rate,
        }
    }
}

// ── VibrationParams ──────────────────────────────────────────────────────────

impl VibrationParams {
    /// The vibration estimator reuses the tick window from `[calibration]`.
    pub fn from_parts(
        v: &residuum_config::VibrationCfg,
        c: &residuum_config::CalibrationCfg,
        unit: TotalUnit,
    ) -> Self {
        Self {
            std_threshold: v.std_threshold,
            std_max: v.std_max,
            flow_max_l_per_min: v.flow_max_l_per_min,
            active_above_l_per_min: v.active_above_l_per_min,
            max_dt_s: v.max_dt_s,
            max_residuum_l: v.max_residuum_l,
            resync_max_l: v.resync_max_l,
            tick_l: c.tick_l,
            tick_min_l: c.tick_min_l,
            tick_max_l: c.tick_max_l,
            regression_tolerance_l: c.regression_tolerance_l,
            unit,
        }
    }

    /// `None` when the config has no `[vibration]` section.
    pub fn from_config(cfg: &residuum_config::Config) -> Option<Self> {
        cfg.vibration
            .as_ref()
            .map(|v| Self::from_parts(v, &cfg.calibration, cfg.pipe.total_unit))
    }
}

// ── EstimatorCfg ─────────────────────────────────────────────────────────────

impl From<&residuum_config::Config> for EstimatorCfg {
    fn from(c: &residuum_config::Config) -> Self {
        Self {
            name: c.pipe.name.clone(),
            unit: c.pipe.total_unit,
            thermal: (&c.thermal).into(),
            kalman: (&c.filter).into(),
            baseline: (&c.baseline).into(),
            outlier: (&c.outlier).into(),
            detector: (&c.detector).into(),
            gate: (&c.gate).into(),
            calibration: (&c.calibration).into(),
        }
    }
}

impl EstimatorCfg {
    /// Apply persisted coefficients over the configured ones.
    pub fn with_persisted(mut self, p: &residuum_config::PersistedCoefficients) -> Self {
        if let Some(k) = p.k_warm {
            self.thermal.k_warm = k;
        }
        if let Some(k) = p.k_cold {
            self.thermal.k_cold = k;
        }
        self
    }
}
