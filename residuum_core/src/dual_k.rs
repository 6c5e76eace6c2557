//! Temperature-dependent conversion from gradient (°C/min) to flow (L/min).

use crate::config::ThermalParams;
use crate::util::lerp_clamped;

pub const KMIN: f64 = 0.5;
pub const KMAX: f64 = 15.0;
/// Upper bound for the cold-side coefficient.
pub const KMAX_COLD: f64 = 10.0;

/// Piecewise-linear k(T) between a warm and a cold reference point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualKModel {
    k_warm: f64,
    k_cold: f64,
    t_warm: f64,
    t_cold: f64,
}

impl DualKModel {
    pub fn new(k_warm: f64, k_cold: f64, t_warm: f64, t_cold: f64) -> Self {
        Self {
            k_warm: clamp_warm(k_warm),
            k_cold: clamp_cold(k_cold),
            t_warm,
            t_cold,
        }
    }

    pub fn from_params(p: &ThermalParams) -> Self {
        Self::new(p.k_warm, p.k_cold, p.t_warm, p.t_cold)
    }

    /// k at filtered temperature `t`, always within `[KMIN, KMAX]`.
    pub fn k(&self, t: f64) -> f64 {
        let k = if t >= self.t_warm {
            self.k_warm
        } else if t <= self.t_cold {
            self.k_cold
        } else if self.t_warm - self.t_cold <= 0.0 {
            self.k_warm
        } else {
            lerp_clamped(t, self.t_cold, self.k_cold, self.t_warm, self.k_warm)
        };
        k.clamp(KMIN, KMAX)
    }

    pub fn k_warm(&self) -> f64 {
        self.k_warm
    }

    pub fn k_cold(&self) -> f64 {
        self.k_cold
    }

    pub fn t_warm(&self) -> f64 {
        self.t_warm
    }

    pub fn t_cold(&self) -> f64 {
        self.t_cold
    }

    /// Set the warm coefficient; returns the stored (clamped) value.
    pub fn set_k_warm(&mut self, k: f64) -> f64 {
        self.k_warm = clamp_warm(k);
        self.k_warm
    }

    /// Set the cold coefficient; returns the stored (clamped) value.
    pub fn set_k_cold(&mut self, k: f64) -> f64 {
        self.k_cold = clamp_cold(k);
        self.k_cold
    }

    pub fn set_temperatures(&mut self, t_warm: f64, t_cold: f64) {
        self.t_warm = t_warm;
        self.t_cold = t_cold;
    }
}

fn clamp_warm(k: f64) -> f64 {
    if k.is_finite() { k.clamp(KMIN, KMAX) } else { KMIN }
}

fn clamp_cold(k: f64) -> f64 {
    if k.is_finite() {
        k.clamp(KMIN, KMAX_COLD)
    } else {
        KMIN
    }
}
