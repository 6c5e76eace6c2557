//! `ThermalEstimator`: per-pipe owner of the whole estimation pipeline.
//!
//! Temperature readings: parse → seed or debounce → tentative Kalman step →
//! baseline → gradient → outlier guard → commit → detector → k(T) → integrate.
//! Totalizer readings go through `CalibrationFusion`.
//! Observers are notified after every accepted mutation.

use crate::baseline::BaselineTracker;
use crate::config::{EstimatorCfg, ThermalParams};
use crate::detector::{DetectorInput, FlowDetector};
use crate::dual_k::{DualKModel, KMAX, KMAX_COLD, KMIN};
use crate::error::BuildError;
use crate::fusion::CalibrationFusion;
use crate::kalman::TemperatureFilter;
use crate::notify::{ObserverList, ParamUpdate};
use crate::outlier::{OutlierGuard, OutlierVerdict};
use crate::snapshot::Snapshot;
use crate::status::{IgnoreReason, KTarget, SampleOutcome, TotalizerOutcome, parse_value};
use crate::util::secs_between;
use crate::volume::VolumeAccount;
use chrono::NaiveDateTime;
use crossbeam_channel as xch;
use residuum_traits::ParamKey;

/// How the volume account starts out.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InitMode {
    /// Anchor on the first totalizer reading (rounded down to a whole tick).
    #[default]
    FreshStart,
    /// Continue from a previously accumulated volume; the first totalizer
    /// reading only establishes the reference.
    RestoredVolume(f64),
}

/// Partial update of the user-tunable parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParamsPatch {
    pub k_warm: Option<f64>,
    pub k_cold: Option<f64>,
    pub t_warm: Option<f64>,
    pub t_cold: Option<f64>,
    pub clip: Option<f64>,
    pub max_residuum_l: Option<f64>,
}

fn check_range(name: &'static str, v: Option<f64>, lo: f64, hi: f64) -> Result<(), BuildError> {
    match v {
        Some(x) if !(x.is_finite() && (lo..=hi).contains(&x)) => Err(BuildError::InvalidParam {
            name,
            reason: "out of range",
        }),
        _ => Ok(()),
    }
}

impl ParamsPatch {
    pub fn validate(&self) -> Result<(), BuildError> {
        check_range("k_warm", self.k_warm, KMIN, KMAX)?;
        check_range("k_cold", self.k_cold, KMIN, KMAX_COLD)?;
        check_range("t_warm", self.t_warm, 5.0, 35.0)?;
        check_range("t_cold", self.t_cold, 5.0, 35.0)?;
        check_range("clip", self.clip, 0.5, 5.0)?;
        check_range("max_residuum_l", self.max_residuum_l, 5.0, 50.0)?;
        Ok(())
    }
}

pub struct ThermalEstimator {
    cfg: EstimatorCfg,
    params: ThermalParams,
    filter: Option<TemperatureFilter>,
    baseline: BaselineTracker,
    guard: OutlierGuard,
    detector: FlowDetector,
    model: DualKModel,
    account: VolumeAccount,
    fusion: CalibrationFusion,
    last_ts: Option<NaiveDateTime>,
    last_at: Option<NaiveDateTime>,
    last_relative: f64,
    last_gradient: Option<f64>,
    last_raw: Option<f64>,
    flow_l_per_min: f64,
    active_k: f64,
    night: bool,
    deep_sleep: bool,
    variance_flow: bool,
    observers: ObserverList<Snapshot>,
    persist: Option<xch::Sender<ParamUpdate>>,
}

impl core::fmt::Debug for ThermalEstimator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThermalEstimator")
            .field("name", &self.cfg.name)
            .field("volume_l", &self.account.volume_l())
            .field("residuum_l", &self.account.residuum_l())
            .field("flow_active", &self.detector.is_active())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ThermalEstimator {
    /// Construct directly. Prefer `EstimatorBuilder`, which validates inputs.
    pub fn new(cfg: EstimatorCfg, init: InitMode) -> Self {
        let params = cfg.thermal;
        let model = DualKModel::from_params(&params);
        let mut account =
            VolumeAccount::new(params.max_residuum_l, cfg.calibration.uncertainty_rate);
        let restored = match init {
            InitMode::FreshStart => false,
            InitMode::RestoredVolume(v) => {
                account.anchor(v);
                tracing::info!(volume_l = v, pipe = %cfg.name, "volume restored");
                true
            }
        };
        Self {
            params,
            filter: None,
            baseline: BaselineTracker::new(cfg.baseline),
            guard: OutlierGuard::new(cfg.outlier),
            detector: FlowDetector::new(cfg.detector, cfg.gate),
            model,
            account,
            fusion: CalibrationFusion::new(cfg.calibration, restored),
            last_ts: None,
            last_at: None,
            last_relative: 0.0,
            last_gradient: None,
            last_raw: None,
            flow_l_per_min: 0.0,
            active_k: model.k(cfg.baseline.fallback_temperature),
            night: false,
            deep_sleep: true,
            variance_flow: false,
            observers: ObserverList::default(),
            persist: None,
            cfg,
        }
    }

    pub fn builder() -> crate::builder::EstimatorBuilder {
        crate::builder::EstimatorBuilder::default()
    }

    /// Register a callback run after every accepted mutation.
    pub fn subscribe(&mut self, observer: impl FnMut(&Snapshot) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Route calibrated coefficients to a persistence queue.
    pub fn set_persistence(&mut self, tx: xch::Sender<ParamUpdate>) {
        self.persist = Some(tx);
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn config(&self) -> &EstimatorCfg {
        &self.cfg
    }

    pub fn params(&self) -> &ThermalParams {
        &self.params
    }

    pub fn model(&self) -> &DualKModel {
        &self.model
    }

    pub fn account(&self) -> &VolumeAccount {
        &self.account
    }

    pub fn fusion(&self) -> &CalibrationFusion {
        &self.fusion
    }

    pub fn flow_l_per_min(&self) -> f64 {
        self.flow_l_per_min
    }

    pub fn volume_l(&self) -> f64 {
        self.account.volume_l()
    }

    pub fn residuum_l(&self) -> f64 {
        self.account.residuum_l()
    }

    pub fn uncertainty_l(&self) -> f64 {
        self.account.uncertainty_l()
    }

    pub fn is_flow_active(&self) -> bool {
        self.detector.is_active()
    }

    pub fn filtered_temperature(&self) -> Option<f64> {
        self.filter.map(|f| f.temperature())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            at: self.last_at,
            flow_l_per_min: self.flow_l_per_min,
            volume_l: self.account.volume_l(),
            offset_l: self.account.offset_l(),
            residuum_l: self.account.residuum_l(),
            uncertainty_l: self.account.uncertainty_l(),
            active_k: self.active_k,
            filtered_temperature: self.filtered_temperature(),
            raw_temperature: self.last_raw,
            gradient: self.last_gradient.unwrap_or(0.0),
            night_mode: self.night,
            deep_sleep: self.deep_sleep,
            flow_active: self.detector.is_active(),
            variance_ratio: self.detector.variance().ratio(),
            variance_flow: self.variance_flow,
            k_warm: self.model.k_warm(),
            k_cold: self.model.k_cold(),
            last_totalizer_l: self.fusion.last_total_l(),
        }
    }

    fn notify(&mut self) {
        let snap = self.snapshot();
        self.observers.notify(&snap);
    }

    fn persist(&self, key: ParamKey, value: f64) {
        if let Some(tx) = &self.persist
            && let Err(e) = tx.try_send(ParamUpdate { key, value })
        {
            tracing::warn!(
                key = key.as_str(),
                value,
                error = %e,
                "could not queue coefficient for persistence"
            );
        }
    }

    /// Handle a raw temperature reading as delivered by the feed.
    pub fn on_temperature(&mut self, at: NaiveDateTime, raw: &str) -> SampleOutcome {
        match parse_value(raw) {
            Ok(v) => self.process_temperature(at, v),
            Err(reason) => {
                tracing::debug!(raw, reason = reason.as_str(), "temperature reading ignored");
                SampleOutcome::Ignored(reason)
            }
        }
    }

    /// Handle a parsed temperature in °C.
    pub fn process_temperature(&mut self, at: NaiveDateTime, raw: f64) -> SampleOutcome {
        if !raw.is_finite() {
            return SampleOutcome::Ignored(IgnoreReason::Malformed);
        }
        let (Some(filter), Some(last_ts)) = (self.filter, self.last_ts) else {
            self.filter = Some(TemperatureFilter::new(&self.cfg.kalman, raw));
            self.last_ts = Some(at);
            self.last_at = Some(at);
            self.last_raw = Some(raw);
            self.last_relative = 0.0;
            self.night = self.baseline.is_night(at);
            self.active_k = self.model.k(raw);
            tracing::info!(pipe = %self.cfg.name, temperature = raw, "estimator initialized");
            self.notify();
            return SampleOutcome::Initialized;
        };

        let dt_s = secs_between(last_ts, at);
        if dt_s <= 0.0 || dt_s < self.cfg.kalman.min_dt_s {
            tracing::debug!(dt_s, "temperature reading debounced");
            return SampleOutcome::Ignored(IgnoreReason::Debounced);
        }

        let mut tentative = filter;
        tentative.step(dt_s, raw);
        let filtered = tentative.temperature();
        let night = self.baseline.is_night(at);
        let baseline = self.baseline.baseline(at, Some(filtered));
        let relative = filtered - baseline;
        let dt_min = dt_s / 60.0;
        let gradient = (relative - self.last_relative) / dt_min;
        let d2 = self.last_gradient.map(|prev| (gradient - prev) / dt_min);

        match self.guard.assess(gradient) {
            OutlierVerdict::Reject { z } => {
                tracing::debug!(gradient, z, raw, "gradient rejected as outlier");
                return SampleOutcome::Ignored(IgnoreReason::Outlier);
            }
            OutlierVerdict::Reanchor { z } => {
                tracing::warn!(gradient, z, raw, "persistent level shift accepted; re-anchoring");
                self.commit(tentative, at, raw, relative, night);
                self.last_gradient = None;
                self.flow_l_per_min = 0.0;
                self.active_k = self.model.k(filtered);
                self.notify();
                return SampleOutcome::Processed;
            }
            OutlierVerdict::Accept => {}
        }

        self.commit(tentative, at, raw, relative, night);
        self.guard.push(gradient);
        if let Some(d2) = d2 {
            self.detector.push_d2(d2);
        }
        self.last_gradient = Some(gradient);

        let det = self.detector.evaluate(DetectorInput {
            at,
            gradient,
            filtered,
            night,
            last_tick: self.fusion.last_tick(),
            clip: self.params.clip,
        });
        self.deep_sleep = det.deep_sleep;
        self.variance_flow = det.variance_flow;

        let k = self.model.k(filtered);
        self.active_k = k;
        let mut flow = if det.clipped < 0.0 { k * -det.clipped } else { 0.0 };
        if flow > self.params.max_flow_l_per_min {
            tracing::warn!(
                flow_l_per_min = flow,
                cap = self.params.max_flow_l_per_min,
                "flow estimate above maximum; capping"
            );
            flow = self.params.max_flow_l_per_min;
        }
        self.flow_l_per_min = flow;

        if flow > 0.0 {
            let ceiling = self
                .fusion
                .last_total_l()
                .map(|t| t + self.params.max_residuum_l);
            let step = self.account.integrate(flow, dt_s, ceiling);
            if step.saturated {
                tracing::warn!(
                    volume_l = self.account.volume_l(),
                    ceiling = ?ceiling,
                    "volume saturated at totalizer ceiling"
                );
            }
        }

        tracing::trace!(
            raw,
            filtered,
            baseline,
            gradient,
            flow_l_per_min = flow,
            k,
            residuum_l = self.account.residuum_l(),
            "temperature processed"
        );
        self.notify();
        SampleOutcome::Processed
    }

    fn commit(
        &mut self,
        filter: TemperatureFilter,
        at: NaiveDateTime,
        raw: f64,
        relative: f64,
        night: bool,
    ) {
        let filtered = filter.temperature();
        self.filter = Some(filter);
        self.last_ts = Some(at);
        self.last_at = Some(at);
        self.last_raw = Some(raw);
        self.last_relative = relative;
        self.night = night;
        self.baseline.push(filtered);
        self.fusion.record_temperature(filtered);
        self.detector.push_raw(raw);
    }

    /// Handle a raw totalizer reading in the configured unit.
    pub fn on_totalizer(&mut self, at: NaiveDateTime, raw: &str) -> TotalizerOutcome {
        let value = match parse_value(raw) {
            Ok(v) if v >= 0.0 => v,
            Ok(_) => {
                tracing::debug!(raw, "negative totalizer reading ignored");
                return TotalizerOutcome::Ignored(IgnoreReason::Malformed);
            }
            Err(reason) => {
                tracing::debug!(raw, reason = reason.as_str(), "totalizer reading ignored");
                return TotalizerOutcome::Ignored(reason);
            }
        };
        self.process_totalizer(at, self.cfg.unit.to_litres(value))
    }

    /// Handle a totalizer reading already in litres.
    pub fn process_totalizer(&mut self, at: NaiveDateTime, total_l: f64) -> TotalizerOutcome {
        let outcome = self
            .fusion
            .on_total(at, total_l, &mut self.account, &mut self.model);
        if let TotalizerOutcome::Tick {
            correction: Some(c),
        } = outcome
        {
            match c.target {
                KTarget::Warm => self.persist(ParamKey::KWarm, self.model.k_warm()),
                KTarget::Cold => self.persist(ParamKey::KCold, self.model.k_cold()),
            }
        }
        if let Some(t) = self.filtered_temperature() {
            self.active_k = self.model.k(t);
        }
        if !matches!(
            outcome,
            TotalizerOutcome::Regression { .. } | TotalizerOutcome::Ignored(_)
        ) {
            self.last_at = Some(at);
            self.notify();
        }
        outcome
    }

    /// Manual reset: residuum and uncertainty to zero.
    pub fn reset(&mut self) {
        self.account.reset();
        tracing::info!(offset_l = self.account.offset_l(), "residuum reset");
        self.notify();
    }

    /// User override of the warm coefficient; persisted.
    pub fn set_k_warm(&mut self, k: f64) -> f64 {
        let stored = self.model.set_k_warm(k);
        self.params.k_warm = stored;
        self.persist(ParamKey::KWarm, stored);
        self.refresh_k();
        self.notify();
        stored
    }

    /// User override of the cold coefficient; persisted.
    pub fn set_k_cold(&mut self, k: f64) -> f64 {
        let stored = self.model.set_k_cold(k);
        self.params.k_cold = stored;
        self.persist(ParamKey::KCold, stored);
        self.refresh_k();
        self.notify();
        stored
    }

    /// Apply a partial parameter update. All-or-nothing.
    pub fn set_params(&mut self, patch: ParamsPatch) -> Result<(), BuildError> {
        patch.validate()?;
        if let Some(k) = patch.k_warm {
            self.params.k_warm = self.model.set_k_warm(k);
        }
        if let Some(k) = patch.k_cold {
            self.params.k_cold = self.model.set_k_cold(k);
        }
        if patch.t_warm.is_some() || patch.t_cold.is_some() {
            let t_warm = patch.t_warm.unwrap_or(self.model.t_warm());
            let t_cold = patch.t_cold.unwrap_or(self.model.t_cold());
            self.model.set_temperatures(t_warm, t_cold);
            self.params.t_warm = t_warm;
            self.params.t_cold = t_cold;
        }
        if let Some(clip) = patch.clip {
            self.params.clip = clip;
        }
        if let Some(max) = patch.max_residuum_l {
            self.params.max_residuum_l = max;
            self.account.set_max_residuum_l(max);
        }
        tracing::info!(?patch, "parameters updated");
        self.refresh_k();
        self.notify();
        Ok(())
    }

    fn refresh_k(&mut self) {
        if let Some(t) = self.filtered_temperature() {
            self.active_k = self.model.k(t);
        }
    }
}
