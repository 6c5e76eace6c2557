//! Two-state Kalman filter over pipe temperature.
//!
//! State is `[temperature, slope]` with slope in °C per second; the
//! covariance is a 2x2 matrix stored row-major as `[P00, P01, P10, P11]`.
//! The filter is `Copy` so callers can step a tentative copy and decide
//! afterwards whether to commit it.

use crate::config::KalmanCfg;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureFilter {
    state: [f64; 2],
    cov: [f64; 4],
    q_temp: f64,
    q_slope: f64,
    r: f64,
}

impl TemperatureFilter {
    /// Seed from the first reading: zero slope, identity covariance.
    pub fn new(cfg: &KalmanCfg, first: f64) -> Self {
        Self {
            state: [first, 0.0],
            cov: [1.0, 0.0, 0.0, 1.0],
            q_temp: cfg.q_temp,
            q_slope: cfg.q_slope,
            r: cfg.r,
        }
    }

    /// Propagate by `dt_s` seconds. No-op for `dt_s <= 0`.
    pub fn predict(&mut self, dt_s: f64) {
        if !(dt_s > 0.0) {
            return;
        }
        // x' = F x, F = [[1, dt], [0, 1]]
        self.state = [self.state[0] + dt_s * self.state[1], self.state[1]];

        // P' = F P F' + Q
        let p = self.cov;
        let fp = [p[0] + dt_s * p[2], p[1] + dt_s * p[3], p[2], p[3]];
        self.cov = [
            fp[0] + dt_s * fp[1] + self.q_temp,
            fp[1],
            fp[2] + dt_s * fp[3],
            fp[3] + self.q_slope,
        ];
    }

    /// Fuse a temperature observation (H = [1, 0]).
    pub fn update(&mut self, z: f64) {
        let p = self.cov;
        let y = z - self.state[0];
        let s = p[0] + self.r;
        if !(s > 0.0) {
            return;
        }
        let k = [p[0] / s, p[2] / s];
        self.state = [self.state[0] + k[0] * y, self.state[1] + k[1] * y];
        self.cov = [
            (1.0 - k[0]) * p[0],
            (1.0 - k[0]) * p[1],
            p[2] - k[1] * p[0],
            p[3] - k[1] * p[1],
        ];
    }

    /// Predict then update; the usual per-sample step.
    pub fn step(&mut self, dt_s: f64, z: f64) {
        self.predict(dt_s);
        self.update(z);
    }

    pub fn temperature(&self) -> f64 {
        self.state[0]
    }

    pub fn slope_per_min(&self) -> f64 {
        self.state[1] * 60.0
    }

    pub fn covariance(&self) -> [f64; 4] {
        self.cov
    }
}
