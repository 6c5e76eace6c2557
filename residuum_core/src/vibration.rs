//! Vibration-based flow estimator.
//!
//! The sensor reports the standard deviation of pipe acceleration; flowing
//! water makes the pipe hum. Flow is a linear map of that amplitude between a
//! noise threshold and a saturation point. Volume bookkeeping is the same
//! `VolumeAccount` the thermal estimator uses, without uncertainty accrual.

use crate::config::VibrationParams;
use crate::notify::ObserverList;
use crate::snapshot::VibrationSnapshot;
use crate::status::{IgnoreReason, SampleOutcome, TotalizerOutcome, parse_value};
use crate::util::secs_between;
use crate::volume::VolumeAccount;
use chrono::NaiveDateTime;

/// Headroom above `flow_max` for exceptionally strong readings.
const FLOW_OVERSHOOT: f64 = 1.5;

/// Partial update of the vibration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VibrationPatch {
    pub std_threshold: Option<f64>,
    pub std_max: Option<f64>,
    pub flow_max_l_per_min: Option<f64>,
    pub max_residuum_l: Option<f64>,
}

pub struct VibrationEstimator {
    params: VibrationParams,
    account: VolumeAccount,
    last_ts: Option<NaiveDateTime>,
    last_at: Option<NaiveDateTime>,
    last_std: Option<f64>,
    flow_l_per_min: f64,
    active: bool,
    liter_mark: u32,
    last_total_l: Option<f64>,
    observers: ObserverList<VibrationSnapshot>,
}

impl core::fmt::Debug for VibrationEstimator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VibrationEstimator")
            .field("volume_l", &self.account.volume_l())
            .field("residuum_l", &self.account.residuum_l())
            .field("flow_active", &self.active)
            .finish()
    }
}

impl VibrationEstimator {
    pub fn new(params: VibrationParams) -> Self {
        Self {
            account: VolumeAccount::new(params.max_residuum_l, 0.0),
            params,
            last_ts: None,
            last_at: None,
            last_std: None,
            flow_l_per_min: 0.0,
            active: false,
            liter_mark: 0,
            last_total_l: None,
            observers: ObserverList::default(),
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&VibrationSnapshot) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn params(&self) -> &VibrationParams {
        &self.params
    }

    pub fn account(&self) -> &VolumeAccount {
        &self.account
    }

    /// Flow for a given amplitude (L/min).
    pub fn std_to_flow(&self, std: f64) -> f64 {
        let p = &self.params;
        if std < p.std_threshold {
            return 0.0;
        }
        let range = p.std_max - p.std_threshold;
        if range <= 0.0 {
            return 0.0;
        }
        ((std - p.std_threshold) / range * p.flow_max_l_per_min)
            .min(p.flow_max_l_per_min * FLOW_OVERSHOOT)
    }

    /// Highest whole tick mark at or below `residuum_l`, capped at the residuum ceiling.
    pub fn liter_mark_for(&self, residuum_l: f64) -> u32 {
        let step = self.params.tick_l;
        if !(step > 0.0 && residuum_l >= 0.0) {
            return 0;
        }
        let capped = residuum_l.min(self.params.max_residuum_l);
        ((capped / step).floor() * step) as u32
    }

    pub fn snapshot(&self) -> VibrationSnapshot {
        VibrationSnapshot {
            at: self.last_at,
            flow_l_per_min: self.flow_l_per_min,
            volume_l: self.account.volume_l(),
            offset_l: self.account.offset_l(),
            residuum_l: self.account.residuum_l(),
            flow_active: self.active,
            last_std: self.last_std,
            liter_mark: self.liter_mark,
            last_totalizer_l: self.last_total_l,
        }
    }

    fn notify(&mut self) {
        self.liter_mark = self.liter_mark_for(self.account.residuum_l());
        let snap = self.snapshot();
        self.observers.notify(&snap);
    }

    pub fn on_vibration(&mut self, at: NaiveDateTime, raw: &str) -> SampleOutcome {
        match parse_value(raw) {
            Ok(v) if v >= 0.0 => self.process_vibration(at, v),
            Ok(_) => SampleOutcome::Ignored(IgnoreReason::Malformed),
            Err(reason) => {
                tracing::debug!(raw, reason = reason.as_str(), "vibration reading ignored");
                SampleOutcome::Ignored(reason)
            }
        }
    }

    pub fn process_vibration(&mut self, at: NaiveDateTime, std: f64) -> SampleOutcome {
        let flow = self.std_to_flow(std);
        self.last_std = Some(std);
        self.flow_l_per_min = flow;
        self.active = flow > self.params.active_above_l_per_min;

        let first = self.last_ts.is_none();
        if let Some(prev) = self.last_ts {
            let dt_s = secs_between(prev, at);
            if dt_s > 0.0 && dt_s < self.params.max_dt_s {
                self.account.integrate(flow, dt_s, None);
            } else {
                tracing::debug!(dt_s, "vibration gap too long; not integrating");
            }
        }
        self.last_ts = Some(at);
        self.last_at = Some(at);
        tracing::trace!(
            std,
            flow_l_per_min = flow,
            residuum_l = self.account.residuum_l(),
            "vibration processed"
        );
        self.notify();
        if first {
            SampleOutcome::Initialized
        } else {
            SampleOutcome::Processed
        }
    }

    pub fn on_totalizer(&mut self, at: NaiveDateTime, raw: &str) -> TotalizerOutcome {
        match parse_value(raw) {
            Ok(v) if v >= 0.0 => self.process_totalizer(at, self.params.unit.to_litres(v)),
            Ok(_) => TotalizerOutcome::Ignored(IgnoreReason::Malformed),
            Err(reason) => TotalizerOutcome::Ignored(reason),
        }
    }

    pub fn process_totalizer(&mut self, at: NaiveDateTime, total_l: f64) -> TotalizerOutcome {
        let p = self.params;
        let Some(prev) = self.last_total_l else {
            let anchored = (total_l / p.tick_l).floor() * p.tick_l;
            self.account.anchor(anchored);
            self.last_total_l = Some(total_l);
            self.last_at = Some(at);
            self.notify();
            return TotalizerOutcome::Initialized;
        };

        let delta = total_l - prev;
        let outcome = if delta >= p.tick_min_l && delta <= p.tick_max_l {
            tracing::info!(
                residuum_l = self.account.residuum_l(),
                total_l,
                "totalizer tick; residuum reset"
            );
            self.account.anchor(total_l);
            TotalizerOutcome::Tick { correction: None }
        } else if delta > p.tick_max_l && delta <= p.resync_max_l {
            tracing::info!(delta_l = delta, total_l, "totalizer jump; re-synchronising");
            self.account.anchor(total_l);
            TotalizerOutcome::Jump { delta_l: delta }
        } else if delta > p.resync_max_l {
            tracing::warn!(
                delta_l = delta,
                total_l,
                "implausible totalizer jump; not re-synchronising"
            );
            TotalizerOutcome::Jump { delta_l: delta }
        } else if delta < -p.regression_tolerance_l {
            tracing::warn!(delta_l = delta, total_l, "totalizer went backwards; ignored");
            return TotalizerOutcome::Regression { delta_l: delta };
        } else {
            TotalizerOutcome::Updated
        };
        self.last_total_l = Some(total_l);
        self.account.guard_offset(total_l);
        self.last_at = Some(at);
        self.notify();
        outcome
    }

    pub fn reset(&mut self) {
        self.account.reset();
        tracing::info!(offset_l = self.account.offset_l(), "vibration residuum reset");
        self.notify();
    }

    pub fn set_params(&mut self, patch: VibrationPatch) -> Result<(), crate::error::BuildError> {
        let mut next = self.params;
        if let Some(v) = patch.std_threshold {
            next.std_threshold = v;
        }
        if let Some(v) = patch.std_max {
            next.std_max = v;
        }
        if let Some(v) = patch.flow_max_l_per_min {
            next.flow_max_l_per_min = v;
        }
        if let Some(v) = patch.max_residuum_l {
            next.max_residuum_l = v;
        }
        if !(next.std_threshold.is_finite()
            && next.std_threshold >= 0.0
            && next.std_max > next.std_threshold)
        {
            return Err(crate::error::BuildError::InvalidParam {
                name: "std_max",
                reason: "must exceed std_threshold",
            });
        }
        if !(next.flow_max_l_per_min.is_finite() && next.flow_max_l_per_min > 0.0) {
            return Err(crate::error::BuildError::InvalidParam {
                name: "flow_max_l_per_min",
                reason: "must be > 0",
            });
        }
        if !(next.max_residuum_l.is_finite() && next.max_residuum_l > 0.0) {
            return Err(crate::error::BuildError::InvalidParam {
                name: "max_residuum_l",
                reason: "must be > 0",
            });
        }
        self.params = next;
        self.account.set_max_residuum_l(next.max_residuum_l);
        self.notify();
        Ok(())
    }
}
