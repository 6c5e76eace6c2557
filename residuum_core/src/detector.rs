//! Flow detection over the baseline-corrected gradient.
//!
//! A hysteresis state machine (idle ↔ active) with temperature-dependent
//! thresholds, a variance monitor for cold pipes where the gradient alone is
//! too weak, and an acceptance gate keyed by time since the last totalizer
//! tick that decides whether an active sample may produce flow.

use crate::config::{DetectorCfg, GateCfg};
use crate::util::{lerp_clamped, population_variance, secs_between};
use chrono::NaiveDateTime;
use std::collections::VecDeque;

const INITIAL_BASELINE_VARIANCE: f64 = 0.001;
const MIN_BASELINE_VARIANCE: f64 = 1e-4;
const VARIANCE_LEARN_RATE: f64 = 0.01;

/// Rolling variance of raw temperatures against a slowly learned idle baseline.
#[derive(Debug, Clone)]
pub struct VarianceMonitor {
    window: VecDeque<f64>,
    capacity: usize,
    min_samples: usize,
    ratio_cold: f64,
    ratio_warm: f64,
    cold_below: f64,
    baseline: f64,
    flagged: bool,
    last_ratio: Option<f64>,
}

impl VarianceMonitor {
    pub fn new(cfg: &DetectorCfg) -> Self {
        Self {
            window: VecDeque::with_capacity(cfg.variance_window),
            capacity: cfg.variance_window,
            min_samples: cfg.variance_min_samples,
            ratio_cold: cfg.variance_ratio_cold,
            ratio_warm: cfg.variance_ratio_warm,
            cold_below: cfg.cold_regime_below,
            baseline: INITIAL_BASELINE_VARIANCE,
            flagged: false,
            last_ratio: None,
        }
    }

    pub fn push(&mut self, raw: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(raw);
    }

    /// Re-evaluate the flag. The idle baseline is only learned while no flow
    /// is active and the previous evaluation was not flagged.
    pub fn evaluate(&mut self, flow_active: bool) -> bool {
        if self.window.len() < self.min_samples {
            self.flagged = false;
            self.last_ratio = None;
            return false;
        }
        let (a, b) = self.window.as_slices();
        let values: Vec<f64> = a.iter().chain(b).copied().collect();
        let Some(current) = population_variance(&values) else {
            return false;
        };
        if !flow_active && !self.flagged {
            self.baseline = ((1.0 - VARIANCE_LEARN_RATE) * self.baseline
                + VARIANCE_LEARN_RATE * current)
                .max(MIN_BASELINE_VARIANCE);
        }
        let ratio = current / self.baseline;
        let cold = values.last().is_some_and(|t| *t < self.cold_below);
        let needed = if cold { self.ratio_cold } else { self.ratio_warm };
        self.flagged = ratio > needed;
        self.last_ratio = Some(ratio);
        self.flagged
    }

    pub fn flagged(&self) -> bool {
        self.flagged
    }

    pub fn ratio(&self) -> Option<f64> {
        self.last_ratio
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }
}

/// Inputs for one detector evaluation.
#[derive(Debug, Clone, Copy)]
pub struct DetectorInput {
    pub at: NaiveDateTime,
    /// Baseline-corrected gradient (°C/min).
    pub gradient: f64,
    pub filtered: f64,
    pub night: bool,
    pub last_tick: Option<NaiveDateTime>,
    /// Gradient clip magnitude (°C/min).
    pub clip: f64,
}

/// What the detector decided for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Detection {
    pub detected: bool,
    pub active: bool,
    pub started: bool,
    pub stopped: bool,
    pub accepted: bool,
    pub deep_sleep: bool,
    pub variance_flow: bool,
    pub entry_threshold: f64,
    pub gate_threshold: f64,
    /// `max(gradient, −clip)` when active and accepted, else 0.
    pub clipped: f64,
}

#[derive(Debug, Clone)]
pub struct FlowDetector {
    cfg: DetectorCfg,
    gate: GateCfg,
    active: bool,
    confirmations: u32,
    last_flow: Option<NaiveDateTime>,
    variance: VarianceMonitor,
    d2_history: VecDeque<f64>,
}

impl FlowDetector {
    pub fn new(cfg: DetectorCfg, gate: GateCfg) -> Self {
        Self {
            variance: VarianceMonitor::new(&cfg),
            d2_history: VecDeque::with_capacity(gate.drift_history),
            cfg,
            gate,
            active: false,
            confirmations: 0,
            last_flow: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn confirmations(&self) -> u32 {
        self.confirmations
    }

    pub fn last_flow(&self) -> Option<NaiveDateTime> {
        self.last_flow
    }

    pub fn variance(&self) -> &VarianceMonitor {
        &self.variance
    }

    /// Record a raw temperature for the variance path.
    pub fn push_raw(&mut self, raw: f64) {
        self.variance.push(raw);
    }

    /// Record a gradient-of-gradient (°C/min²) for drift rejection.
    pub fn push_d2(&mut self, d2: f64) {
        if self.d2_history.len() == self.gate.drift_history {
            self.d2_history.pop_front();
        }
        self.d2_history.push_back(d2);
    }

    /// No accepted flow for longer than `deep_sleep_after_s`, or never.
    pub fn is_deep_sleep(&self, at: NaiveDateTime) -> bool {
        self.last_flow
            .is_none_or(|t| secs_between(t, at) > self.cfg.deep_sleep_after_s)
    }

    /// Entry threshold for a filtered temperature, before night/deep-sleep scaling.
    pub fn base_threshold(&self, filtered: f64) -> f64 {
        lerp_clamped(
            filtered,
            self.cfg.cold_temp,
            self.cfg.cold_threshold,
            self.cfg.warm_temp,
            self.cfg.warm_threshold,
        )
    }

    /// Gate threshold keyed by time since the last totalizer tick.
    ///
    /// Before the first tick there is nothing to measure elapsed time
    /// against, so the already scaled entry threshold `entry` is used.
    pub fn gate_threshold(
        &self,
        at: NaiveDateTime,
        last_tick: Option<NaiveDateTime>,
        deep_sleep: bool,
        entry: f64,
    ) -> f64 {
        let Some(tick) = last_tick else {
            return entry;
        };
        let since = secs_between(tick, at);
        let base = if since < self.gate.fresh_tick_s {
            self.gate.fresh
        } else if since < self.gate.recent_tick_s {
            self.gate.recent
        } else {
            self.gate.stale
        };
        if deep_sleep {
            base * self.gate.deep_sleep_factor
        } else {
            base
        }
    }

    /// Every recent gradient-of-gradient is tiny: the change is too steady to be a draw.
    pub fn is_drift(&self) -> bool {
        !self.d2_history.is_empty()
            && self
                .d2_history
                .iter()
                .all(|d| d.abs() < self.gate.drift_epsilon)
    }

    /// The acceptance gate.
    pub fn should_accept(&self, gradient: f64, gate_threshold: f64) -> bool {
        !self.is_drift() && gradient < gate_threshold
    }

    /// Scaled entry threshold for one sample.
    pub fn entry_threshold(&self, filtered: f64, night: bool, deep_sleep: bool) -> f64 {
        let mut entry = self.base_threshold(filtered);
        if night {
            entry *= self.cfg.night_factor;
        }
        if deep_sleep {
            entry *= self.cfg.deep_sleep_factor;
        }
        entry
    }

    pub fn evaluate(&mut self, input: DetectorInput) -> Detection {
        let g = input.gradient;
        let deep_sleep = self.is_deep_sleep(input.at);

        let entry = self.entry_threshold(input.filtered, input.night, deep_sleep);
        let exit = entry * self.cfg.exit_ratio;

        let variance_flow = self.variance.evaluate(self.active);
        let gradient_flow = g < entry;
        let detected = if input.filtered < self.cfg.cold_regime_below {
            g < entry * self.cfg.strong_factor
                || (gradient_flow && variance_flow)
                || (variance_flow && g < 0.0)
        } else {
            gradient_flow
        };

        let mut started = false;
        let mut stopped = false;
        if detected {
            self.confirmations = self.confirmations.saturating_add(1);
            if !self.active && self.confirmations >= self.cfg.confirmation_samples {
                self.active = true;
                started = true;
                tracing::info!(gradient = g, filtered = input.filtered, "flow started");
            }
        } else {
            self.confirmations = 0;
            if self.active && g > exit {
                self.active = false;
                stopped = true;
                tracing::info!(gradient = g, exit, "flow stopped");
            }
        }

        let gate_threshold = self.gate_threshold(input.at, input.last_tick, deep_sleep, entry);
        let accepted = self.active && self.should_accept(g, gate_threshold);
        let clipped = if accepted { g.max(-input.clip.abs()) } else { 0.0 };
        if clipped < 0.0 {
            self.last_flow = Some(input.at);
        }

        tracing::trace!(
            gradient = g,
            entry,
            exit,
            detected,
            active = self.active,
            accepted,
            deep_sleep,
            variance_flow,
            "detector step"
        );

        Detection {
            detected,
            active: self.active,
            started,
            stopped,
            accepted,
            deep_sleep,
            variance_flow,
            entry_threshold: entry,
            gate_threshold,
            clipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use rstest::rstest;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn input(
        at: NaiveDateTime,
        g: f64,
        filtered: f64,
        last_tick: Option<NaiveDateTime>,
    ) -> DetectorInput {
        DetectorInput {
            at,
            gradient: g,
            filtered,
            night: false,
            last_tick,
            clip: 2.5,
        }
    }

    fn detector() -> FlowDetector {
        FlowDetector::new(DetectorCfg::default(), GateCfg::default())
    }

    #[test]
    fn threshold_follows_pipe_temperature() {
        let d = detector();
        assert!((d.base_threshold(25.0) + 0.008).abs() < 1e-12);
        assert!((d.base_threshold(14.0) + 0.005).abs() < 1e-12);
        assert!((d.base_threshold(3.0) + 0.002).abs() < 1e-12);
    }

    #[test]
    fn gate_threshold_by_time_since_tick() {
        let d = detector();
        let t = noon();
        let entry = -0.0066;
        assert_eq!(d.gate_threshold(t, Some(t - Duration::seconds(60)), false, entry), -0.01);
        assert_eq!(d.gate_threshold(t, Some(t - Duration::seconds(600)), false, entry), -0.08);
        assert_eq!(d.gate_threshold(t, Some(t - Duration::seconds(3600)), false, entry), -0.20);
        let stale_asleep = d.gate_threshold(t, Some(t - Duration::seconds(3600)), true, entry);
        assert!((stale_asleep + 0.24).abs() < 1e-12);
    }

    #[rstest]
    #[case(false, false)]
    #[case(true, false)]
    #[case(false, true)]
    fn gate_before_first_tick_is_the_entry_threshold(#[case] night: bool, #[case] deep: bool) {
        let d = detector();
        let entry = d.entry_threshold(15.0, night, deep);
        assert_eq!(d.gate_threshold(noon(), None, deep, entry), entry);
    }

    #[rstest]
    #[case(false, false, -0.008)]
    #[case(true, false, -0.010)]
    #[case(false, true, -0.0096)]
    #[case(true, true, -0.012)]
    fn entry_threshold_scales_with_night_and_deep_sleep(
        #[case] night: bool,
        #[case] deep: bool,
        #[case] want: f64,
    ) {
        let d = detector();
        assert!((d.entry_threshold(20.0, night, deep) - want).abs() < 1e-12);
    }

    #[test]
    fn detection_reports_night_scaled_entry() {
        let mut d = detector();
        let mut i = input(noon(), 0.0, 20.0, None);
        i.night = true;
        let r = d.evaluate(i);
        assert!(r.deep_sleep);
        assert!((r.entry_threshold + 0.012).abs() < 1e-12);
    }

    /// Active at 20 °C from three strong samples right after a tick.
    fn activated() -> (FlowDetector, NaiveDateTime) {
        let mut d = detector();
        let t = noon();
        d.push_d2(-0.05);
        for i in 1..=3 {
            d.evaluate(input(t + Duration::seconds(60 * i), -0.05, 20.0, Some(t)));
        }
        assert!(d.is_active());
        (d, t)
    }

    #[rstest]
    #[case(false, false)]
    #[case(true, true)]
    fn night_widens_the_exit_band(#[case] night: bool, #[case] stops: bool) {
        // day exit −0.00264, night exit −0.0033
        let (mut d, t) = activated();
        let mut i = input(t + Duration::seconds(240), -0.003, 20.0, Some(t));
        i.night = night;
        let r = d.evaluate(i);
        assert!(!r.detected);
        assert_eq!(r.stopped, stops);
        assert_eq!(r.active, !stops);
    }

    #[test]
    fn deep_sleep_ends_with_flow_and_returns_after_idle() {
        assert!(detector().is_deep_sleep(noon()));

        let (mut d, t) = activated();
        let flow_at = t + Duration::seconds(180);
        assert_eq!(d.last_flow(), Some(flow_at));

        let r = d.evaluate(input(t + Duration::seconds(240), 0.001, 20.0, Some(t)));
        assert!(r.stopped);
        assert!(!r.deep_sleep);
        assert!((r.entry_threshold + 0.008).abs() < 1e-12);

        let r = d.evaluate(input(flow_at + Duration::seconds(7200), 0.0, 20.0, Some(t)));
        assert!(!r.deep_sleep);
        let r = d.evaluate(input(flow_at + Duration::seconds(7260), 0.0, 20.0, Some(t)));
        assert!(r.deep_sleep);
        assert!((r.entry_threshold + 0.0096).abs() < 1e-12);
    }

    #[test]
    fn single_qualifying_sample_does_not_activate() {
        let mut d = detector();
        let t = noon();
        let tick = Some(t);
        d.push_d2(-0.05);
        let r = d.evaluate(input(t + Duration::seconds(60), -0.05, 15.0, tick));
        assert!(r.detected && !r.active);
        assert_eq!(r.clipped, 0.0);
        // the next sample breaks the run
        let r = d.evaluate(input(t + Duration::seconds(120), 0.0, 15.0, tick));
        assert!(!r.detected && !r.active);
        assert_eq!(d.confirmations(), 0);
    }

    #[test]
    fn three_consecutive_detections_activate_and_exit_on_recovery() {
        let mut d = detector();
        let t = noon();
        let tick = Some(t);
        d.push_d2(-0.05);
        let mut last = Detection::default();
        for i in 1..=3 {
            last = d.evaluate(input(t + Duration::seconds(60 * i), -0.05, 15.0, tick));
        }
        assert!(last.started && last.active && last.accepted);
        assert!((last.clipped + 0.05).abs() < 1e-12);
        assert!(d.last_flow().is_some());

        // weakly negative but above the exit threshold → stop
        let r = d.evaluate(input(t + Duration::seconds(240), 0.001, 15.0, tick));
        assert!(r.stopped && !r.active);
    }

    #[test]
    fn gradient_is_clipped() {
        let mut d = detector();
        let t = noon();
        d.push_d2(-1.0);
        let mut r = Detection::default();
        for i in 1..=3 {
            r = d.evaluate(input(t + Duration::seconds(60 * i), -7.0, 15.0, None));
        }
        assert_eq!(r.clipped, -2.5);
    }

    #[test]
    fn steady_drift_is_rejected_by_gate() {
        let mut d = detector();
        let t = noon();
        for _ in 0..5 {
            d.push_d2(0.001);
        }
        let gate = d.gate_threshold(t, Some(t), false, -0.008);
        assert!(d.is_drift());
        assert!(!d.should_accept(-0.5, gate));
        d.push_d2(-0.02);
        assert!(!d.is_drift());
        assert!(d.should_accept(-0.5, gate));
    }

    #[test]
    fn cold_pipe_needs_strong_gradient_without_variance() {
        let mut d = detector();
        let t = noon();
        // 6 °C: entry −0.002 ×1.2 deep sleep = −0.0024; strong = −0.0072
        let weak = d.evaluate(input(t, -0.004, 6.0, None));
        assert!(!weak.detected);
        let strong = d.evaluate(input(t + Duration::seconds(60), -0.01, 6.0, None));
        assert!(strong.detected);
    }

    #[test]
    fn variance_flag_needs_min_samples_and_ratio() {
        let cfg = DetectorCfg::default();
        let mut v = VarianceMonitor::new(&cfg);
        for _ in 0..9 {
            v.push(6.0);
        }
        assert!(!v.evaluate(false));
        assert_eq!(v.ratio(), None);
        v.push(6.0);
        assert!(!v.evaluate(false));
        assert_eq!(v.baseline(), MIN_BASELINE_VARIANCE.max(0.99 * INITIAL_BASELINE_VARIANCE));

        // alternate ±0.1 → variance ≈ 0.005 ≫ 2 × baseline
        for i in 0..20 {
            v.push(if i % 2 == 0 { 5.9 } else { 6.1 });
        }
        assert!(v.evaluate(false));
        assert!(v.ratio().unwrap() > 2.0);
    }

    #[test]
    fn cold_pipe_with_variance_detects_weak_drop() {
        let mut d = detector();
        let t = noon();
        for i in 0..30 {
            d.push_raw(if i % 2 == 0 { 5.9 } else { 6.1 });
        }
        let r = d.evaluate(input(t, -0.001, 6.0, None));
        assert!(r.variance_flow);
        assert!(r.detected);
    }
}
