//! Totalizer reconciliation and auto-calibration of the k model.
//!
//! Every 10 L tick is ground truth: the estimated residuum at that moment
//! shows how far off the coefficient in use was. The coefficient for the
//! temperature band the pipe spent the interval in is nudged a fraction of
//! the way toward the value that would have matched, then the volume
//! account is re-anchored on the totalizer.

use crate::config::CalibrationCfg;
use crate::dual_k::{DualKModel, KMAX, KMAX_COLD, KMIN};
use crate::status::{KCorrection, KTarget, TotalizerOutcome};
use crate::volume::VolumeAccount;
use chrono::NaiveDateTime;

/// Running mean of filtered temperatures since the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SinceTick {
    sum: f64,
    count: u64,
}

impl SinceTick {
    pub fn record(&mut self, filtered: f64) {
        self.sum += filtered;
        self.count += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationFusion {
    cfg: CalibrationCfg,
    last_total_l: Option<f64>,
    last_tick: Option<NaiveDateTime>,
    since_tick: SinceTick,
    /// Volume was restored at construction; the first reading only sets the reference.
    restored: bool,
}

impl CalibrationFusion {
    pub fn new(cfg: CalibrationCfg, restored: bool) -> Self {
        Self {
            cfg,
            last_total_l: None,
            last_tick: None,
            since_tick: SinceTick::default(),
            restored,
        }
    }

    pub fn last_total_l(&self) -> Option<f64> {
        self.last_total_l
    }

    pub fn last_tick(&self) -> Option<NaiveDateTime> {
        self.last_tick
    }

    pub fn since_tick(&self) -> &SinceTick {
        &self.since_tick
    }

    pub fn record_temperature(&mut self, filtered: f64) {
        self.since_tick.record(filtered);
    }

    /// Correction the current residuum would justify, without applying it.
    pub fn proposed_correction(&self, residuum_l: f64, model: &DualKModel) -> Option<KCorrection> {
        let c = &self.cfg;
        if !(residuum_l > c.min_residuum_l
            && residuum_l >= c.plausible_min_l
            && residuum_l <= c.plausible_max_l)
        {
            return None;
        }
        let avg = self.since_tick.mean()?;
        let (target, old_k, bound) = if avg >= model.t_warm() {
            (KTarget::Warm, model.k_warm(), KMAX)
        } else if avg <= model.t_cold() {
            (KTarget::Cold, model.k_cold(), KMAX_COLD)
        } else {
            return None;
        };
        let factor = (c.tick_l / residuum_l).clamp(c.correction_min, c.correction_max);
        let new_k = (old_k + c.step * (old_k * factor - old_k)).clamp(KMIN, bound);
        Some(KCorrection {
            target,
            old_k,
            new_k,
            factor,
            residuum_l,
            avg_temperature: avg,
        })
    }

    /// Handle a totalizer reading already converted to litres.
    pub fn on_total(
        &mut self,
        at: NaiveDateTime,
        total_l: f64,
        account: &mut VolumeAccount,
        model: &mut DualKModel,
    ) -> TotalizerOutcome {
        let Some(prev) = self.last_total_l else {
            if !self.restored {
                let anchored = (total_l / self.cfg.tick_l).floor() * self.cfg.tick_l;
                account.anchor(anchored);
            }
            self.last_total_l = Some(total_l);
            account.guard_offset(total_l);
            tracing::info!(total_l, restored = self.restored, "totalizer reference established");
            return TotalizerOutcome::Initialized;
        };

        let delta = total_l - prev;
        let outcome = if delta >= self.cfg.tick_min_l && delta <= self.cfg.tick_max_l {
            let residuum = account.residuum_l();
            let correction = self.proposed_correction(residuum, model);
            if let Some(c) = &correction {
                let stored = match c.target {
                    KTarget::Warm => model.set_k_warm(c.new_k),
                    KTarget::Cold => model.set_k_cold(c.new_k),
                };
                tracing::info!(
                    target = ?c.target,
                    old_k = c.old_k,
                    new_k = stored,
                    factor = c.factor,
                    residuum_l = c.residuum_l,
                    avg_temperature = c.avg_temperature,
                    "auto-calibration"
                );
            }
            tracing::info!(total_l, residuum_l = residuum, "totalizer tick");
            account.anchor(total_l);
            self.since_tick.clear();
            self.last_tick = Some(at);
            self.last_total_l = Some(total_l);
            TotalizerOutcome::Tick { correction }
        } else if delta > self.cfg.tick_max_l {
            tracing::warn!(
                delta_l = delta,
                total_l,
                "implausible totalizer jump; not re-anchoring"
            );
            self.last_total_l = Some(total_l);
            TotalizerOutcome::Jump { delta_l: delta }
        } else if delta < -self.cfg.regression_tolerance_l {
            tracing::warn!(delta_l = delta, total_l, "totalizer went backwards; ignored");
            TotalizerOutcome::Regression { delta_l: delta }
        } else {
            self.last_total_l = Some(total_l);
            TotalizerOutcome::Updated
        };

        if let Some(last) = self.last_total_l {
            account.guard_offset(last);
        }
        outcome
    }
}
