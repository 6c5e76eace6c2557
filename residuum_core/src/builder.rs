//! Builder for `ThermalEstimator`.
//!
//! `try_build()` validates the runtime configuration and the init mode before
//! constructing; `ThermalEstimator::new` itself trusts its inputs.

use crossbeam_channel as xch;

use crate::config::EstimatorCfg;
use crate::error::{BuildError, Result};
use crate::estimator::{InitMode, ParamsPatch, ThermalEstimator};
use crate::notify::{Observer, ParamUpdate};
use crate::snapshot::Snapshot;

#[derive(Default)]
pub struct EstimatorBuilder {
    cfg: Option<EstimatorCfg>,
    init: InitMode,
    persist: Option<xch::Sender<ParamUpdate>>,
    observers: Vec<Observer<Snapshot>>,
}

impl core::fmt::Debug for EstimatorBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EstimatorBuilder")
            .field("cfg", &self.cfg)
            .field("init", &self.init)
            .field("persist", &self.persist.is_some())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl EstimatorBuilder {
    pub fn config(mut self, cfg: EstimatorCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Convenience: runtime config straight from the TOML schema.
    pub fn from_config(self, cfg: &residuum_config::Config) -> Self {
        self.config(cfg.into())
    }

    pub fn init_mode(mut self, init: InitMode) -> Self {
        self.init = init;
        self
    }

    pub fn persistence(mut self, tx: xch::Sender<ParamUpdate>) -> Self {
        self.persist = Some(tx);
        self
    }

    pub fn observer(mut self, observer: impl FnMut(&Snapshot) + Send + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn try_build(self) -> Result<ThermalEstimator> {
        let cfg = self.cfg.unwrap_or_default();
        validate(&cfg)?;
        if let InitMode::RestoredVolume(v) = self.init
            && !(v.is_finite() && v >= 0.0)
        {
            return Err(eyre::Report::new(BuildError::InvalidRestoredVolume(v)));
        }

        let mut est = ThermalEstimator::new(cfg, self.init);
        if let Some(tx) = self.persist {
            est.set_persistence(tx);
        }
        for obs in self.observers {
            est.subscribe(obs);
        }
        Ok(est)
    }
}

fn invalid(name: &'static str, reason: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidParam { name, reason })
}

fn validate(cfg: &EstimatorCfg) -> Result<()> {
    // ── Thermal ──────────────────────────────────────────────────────────────
    let t = &cfg.thermal;
    ParamsPatch {
        k_warm: Some(t.k_warm),
        k_cold: Some(t.k_cold),
        t_warm: Some(t.t_warm),
        t_cold: Some(t.t_cold),
        clip: Some(t.clip),
        max_residuum_l: Some(t.max_residuum_l),
    }
    .validate()
    .map_err(eyre::Report::new)?;
    if !(t.max_flow_l_per_min.is_finite() && t.max_flow_l_per_min > 0.0) {
        return Err(invalid("max_flow_l_per_min", "must be > 0"));
    }

    // ── Filter ───────────────────────────────────────────────────────────────
    let k = &cfg.kalman;
    if !(k.q_temp > 0.0 && k.q_slope > 0.0 && k.r > 0.0) {
        return Err(invalid("kalman", "noise parameters must be > 0"));
    }
    if !(k.min_dt_s.is_finite() && k.min_dt_s >= 0.0) {
        return Err(invalid("min_dt_s", "must be >= 0"));
    }

    // ── Windows ──────────────────────────────────────────────────────────────
    if cfg.baseline.window == 0 || cfg.baseline.min_samples > cfg.baseline.window {
        return Err(invalid("baseline.window", "must be >= 1 and >= min_samples"));
    }
    if cfg.outlier.window == 0 || cfg.outlier.min_samples > cfg.outlier.window {
        return Err(invalid("outlier.window", "must be >= 1 and >= min_samples"));
    }
    if !(cfg.outlier.z_threshold > 0.0) {
        return Err(invalid("outlier.z_threshold", "must be > 0"));
    }
    if cfg.detector.variance_window == 0 || cfg.detector.confirmation_samples == 0 {
        return Err(invalid("detector", "windows and confirmation must be >= 1"));
    }
    if cfg.gate.drift_history == 0 {
        return Err(invalid("gate.drift_history", "must be >= 1"));
    }

    // ── Calibration ──────────────────────────────────────────────────────────
    let c = &cfg.calibration;
    if !(c.tick_l > 0.0 && c.tick_min_l <= c.tick_l && c.tick_l <= c.tick_max_l) {
        return Err(invalid("calibration.tick_l", "tick window must contain tick_l"));
    }
    if !(0.0..=1.0).contains(&c.step) {
        return Err(invalid("calibration.step", "must be in [0, 1]"));
    }
    Ok(())
}
