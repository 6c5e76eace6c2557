//! Median/MAD rejection of spurious gradient spikes.
//!
//! The guard scores each candidate gradient against the accepted history
//! (not including the candidate). A run of `max_consecutive` rejections is
//! treated as a genuine level shift: the history is dropped and the caller
//! re-anchors on the new level.

use crate::config::OutlierCfg;
use crate::util::median;
use std::collections::VecDeque;

/// Consistency constant turning a MAD into a standard-deviation estimate.
pub const MAD_SCALE: f64 = 1.4826;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierVerdict {
    /// Not enough history yet, or within bounds.
    Accept,
    /// Discard the sample.
    Reject { z: f64 },
    /// Too many rejections in a row; history was cleared.
    Reanchor { z: f64 },
}

#[derive(Debug, Clone)]
pub struct OutlierGuard {
    cfg: OutlierCfg,
    history: VecDeque<f64>,
    consecutive: u32,
}

impl OutlierGuard {
    pub fn new(cfg: OutlierCfg) -> Self {
        Self {
            history: VecDeque::with_capacity(cfg.window),
            cfg,
            consecutive: 0,
        }
    }

    /// Robust z-score of `g` against the history, if the guard is armed.
    pub fn z_score(&self, g: f64) -> Option<f64> {
        if self.history.len() < self.cfg.min_samples {
            return None;
        }
        let (a, b) = self.history.as_slices();
        let values: Vec<f64> = a.iter().chain(b).copied().collect();
        let med = median(&values)?;
        let deviations: Vec<f64> = values.iter().map(|x| (x - med).abs()).collect();
        let mad = median(&deviations)?.max(self.cfg.mad_floor);
        if mad <= 0.0 {
            // Zero floor and a perfectly flat history: only an exact repeat is in bounds.
            return Some(if g == med { 0.0 } else { f64::INFINITY.copysign(g - med) });
        }
        Some((g - med) / (MAD_SCALE * mad))
    }

    /// Judge a candidate gradient. Does not record it; call `push` on commit.
    pub fn assess(&mut self, g: f64) -> OutlierVerdict {
        let Some(z) = self.z_score(g) else {
            self.consecutive = 0;
            return OutlierVerdict::Accept;
        };
        if z.abs() <= self.cfg.z_threshold {
            self.consecutive = 0;
            return OutlierVerdict::Accept;
        }
        self.consecutive += 1;
        if self.consecutive >= self.cfg.max_consecutive {
            self.consecutive = 0;
            self.history.clear();
            OutlierVerdict::Reanchor { z }
        } else {
            OutlierVerdict::Reject { z }
        }
    }

    pub fn push(&mut self, g: f64) {
        if self.history.len() == self.cfg.window {
            self.history.pop_front();
        }
        self.history.push_back(g);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
