//! Offline comparison of two vibration recordings (water off vs. water on).
//!
//! Used to pick `std_threshold`/`std_max`: if the "on" recording does not
//! differ from the "off" one, the sensor placement is not usable.

use crate::util::{mean, sample_std};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesStats {
    /// Needs at least two samples.
    pub fn of(values: &[f64]) -> Option<Self> {
        let std = sample_std(values)?;
        let mean = mean(values)?;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            count: values.len(),
            mean,
            std,
            min,
            max,
        })
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// Cohen's d bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSize {
    None,
    Small,
    Medium,
    Large,
}

impl EffectSize {
    pub fn from_d(d: f64) -> Self {
        if d < 0.2 {
            EffectSize::None
        } else if d < 0.5 {
            EffectSize::Small
        } else if d < 0.8 {
            EffectSize::Medium
        } else {
            EffectSize::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectSize::None => "none",
            EffectSize::Small => "small",
            EffectSize::Medium => "medium",
            EffectSize::Large => "large",
        }
    }
}

/// Whether the "on" recording is noisier than the "off" one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarianceShift {
    More,
    Less,
    Unchanged,
}

impl VarianceShift {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 1.2 {
            VarianceShift::More
        } else if ratio < 0.8 {
            VarianceShift::Less
        } else {
            VarianceShift::Unchanged
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VarianceShift::More => "more",
            VarianceShift::Less => "less",
            VarianceShift::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub off: SeriesStats,
    pub on: SeriesStats,
    pub cohens_d: f64,
    pub effect: EffectSize,
    pub std_ratio: f64,
    pub variance_shift: VarianceShift,
}

/// Compare two series. `None` when either has fewer than two samples.
pub fn compare(off: &[f64], on: &[f64]) -> Option<Comparison> {
    let off = SeriesStats::of(off)?;
    let on = SeriesStats::of(on)?;
    let pooled = ((off.std * off.std + on.std * on.std) / 2.0).sqrt();
    let cohens_d = if pooled > 0.0 {
        (on.mean - off.mean).abs() / pooled
    } else {
        0.0
    };
    let std_ratio = if off.std > 0.0 { on.std / off.std } else { 1.0 };
    Some(Comparison {
        off,
        on,
        cohens_d,
        effect: EffectSize::from_d(cohens_d),
        std_ratio,
        variance_shift: VarianceShift::from_ratio(std_ratio),
    })
}
