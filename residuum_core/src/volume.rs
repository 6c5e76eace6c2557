//! Volume bookkeeping shared by the thermal and vibration estimators.
//!
//! `residuum = clamp(volume − offset, 0, max_residuum)` is the estimated
//! consumption since the last totalizer anchor.

/// Result of one integration step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Integrated {
    /// Volume actually added (after floor/ceiling).
    pub delta_l: f64,
    /// The ceiling cut the step short.
    pub saturated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeAccount {
    volume_l: f64,
    offset_l: f64,
    uncertainty_l: f64,
    max_residuum_l: f64,
    uncertainty_rate: f64,
}

impl VolumeAccount {
    pub fn new(max_residuum_l: f64, uncertainty_rate: f64) -> Self {
        Self {
            volume_l: 0.0,
            offset_l: 0.0,
            uncertainty_l: 0.0,
            max_residuum_l,
            uncertainty_rate,
        }
    }

    pub fn volume_l(&self) -> f64 {
        self.volume_l
    }

    pub fn offset_l(&self) -> f64 {
        self.offset_l
    }

    pub fn uncertainty_l(&self) -> f64 {
        self.uncertainty_l
    }

    pub fn max_residuum_l(&self) -> f64 {
        self.max_residuum_l
    }

    pub fn residuum_l(&self) -> f64 {
        (self.volume_l - self.offset_l).clamp(0.0, self.max_residuum_l)
    }

    pub fn set_max_residuum_l(&mut self, max: f64) {
        self.max_residuum_l = max;
    }

    /// Add `flow_l_per_min` over `dt_s`. The volume is floored at 0 and, when
    /// `ceiling_l` is given, capped there.
    pub fn integrate(
        &mut self,
        flow_l_per_min: f64,
        dt_s: f64,
        ceiling_l: Option<f64>,
    ) -> Integrated {
        if !(flow_l_per_min.is_finite() && dt_s.is_finite() && dt_s > 0.0) {
            return Integrated::default();
        }
        let before = self.volume_l;
        let mut next = (before + flow_l_per_min * dt_s / 60.0).max(0.0);
        let mut saturated = false;
        if let Some(ceiling) = ceiling_l
            && next > ceiling
        {
            next = ceiling.max(0.0);
            saturated = true;
        }
        self.volume_l = next;
        let delta = next - before;
        self.uncertainty_l += self.uncertainty_rate * delta.abs();
        Integrated {
            delta_l: delta,
            saturated,
        }
    }

    /// Manual reset: residuum and uncertainty to 0, volume untouched.
    pub fn reset(&mut self) {
        self.offset_l = self.volume_l;
        self.uncertainty_l = 0.0;
    }

    /// Re-anchor both volume and offset on an absolute reading.
    pub fn anchor(&mut self, total_l: f64) {
        self.volume_l = total_l;
        self.offset_l = total_l;
        self.uncertainty_l = 0.0;
    }

    /// Keep the offset at or below the last totalizer reading.
    pub fn guard_offset(&mut self, last_total_l: f64) {
        if self.offset_l > last_total_l {
            self.offset_l = last_total_l;
        }
    }
}
