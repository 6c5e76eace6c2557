//! Rolling low-percentile estimate of the pipe's resting temperature.
//!
//! Draws only ever pull the pipe temperature down, so a low percentile of a
//! long window tracks ambient while ignoring the dips caused by consumption.

use crate::config::BaselineCfg;
use crate::util::percentile;
use chrono::{NaiveDateTime, Timelike};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct BaselineTracker {
    cfg: BaselineCfg,
    window: VecDeque<f64>,
}

impl BaselineTracker {
    pub fn new(cfg: BaselineCfg) -> Self {
        Self {
            window: VecDeque::with_capacity(cfg.window),
            cfg,
        }
    }

    /// Night spans `night_start_hour..night_end_hour`, wrapping past midnight.
    pub fn is_night(&self, at: NaiveDateTime) -> bool {
        let h = at.hour();
        let (start, end) = (self.cfg.night_start_hour, self.cfg.night_end_hour);
        if start <= end {
            (start..end).contains(&h)
        } else {
            h >= start || h < end
        }
    }

    /// Baseline at `at`. With too little history this is `current` (the latest
    /// filtered temperature), or the configured fallback when none exists yet.
    pub fn baseline(&self, at: NaiveDateTime, current: Option<f64>) -> f64 {
        if self.window.len() < self.cfg.min_samples {
            return current.unwrap_or(self.cfg.fallback_temperature);
        }
        let p = if self.is_night(at) {
            self.cfg.night_percentile
        } else {
            self.cfg.day_percentile
        };
        let (a, b) = self.window.as_slices();
        let values: Vec<f64> = a.iter().chain(b).copied().collect();
        percentile(&values, p).unwrap_or(self.cfg.fallback_temperature)
    }

    /// Append a filtered temperature, evicting the oldest at capacity.
    pub fn push(&mut self, filtered: f64) {
        if self.window.len() == self.cfg.window {
            self.window.pop_front();
        }
        self.window.push_back(filtered);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[rstest]
    #[case(21, 59, false)]
    #[case(22, 0, true)]
    #[case(2, 30, true)]
    #[case(5, 59, true)]
    #[case(6, 0, false)]
    #[case(13, 0, false)]
    fn night_window_wraps_midnight(#[case] h: u32, #[case] m: u32, #[case] night: bool) {
        let b = BaselineTracker::new(BaselineCfg::default());
        assert_eq!(b.is_night(at(h, m)), night);
    }

    #[test]
    fn warm_up_falls_back_to_current_then_default() {
        let mut b = BaselineTracker::new(BaselineCfg::default());
        assert_eq!(b.baseline(at(12, 0), None), 15.0);
        for _ in 0..59 {
            b.push(11.0);
        }
        assert_eq!(b.baseline(at(12, 0), Some(11.3)), 11.3);
        b.push(11.0);
        assert_eq!(b.baseline(at(12, 0), Some(11.3)), 11.0);
    }

    #[test]
    fn uses_lower_percentile_at_night() {
        let mut b = BaselineTracker::new(BaselineCfg::default());
        // 101 values 10.00, 10.01, ..., 11.00
        for i in 0..=100 {
            b.push(10.0 + f64::from(i) * 0.01);
        }
        let day = b.baseline(at(12, 0), None);
        let night = b.baseline(at(23, 0), None);
        assert!((day - 10.02).abs() < 1e-9, "{day}");
        assert!((night - 10.01).abs() < 1e-9, "{night}");
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let cfg = BaselineCfg {
            window: 60,
            ..BaselineCfg::default()
        };
        let mut b = BaselineTracker::new(cfg);
        for _ in 0..60 {
            b.push(5.0);
        }
        for _ in 0..60 {
            b.push(9.0);
        }
        assert_eq!(b.len(), 60);
        assert_eq!(b.baseline(at(12, 0), None), 9.0);
    }
}
