//! Per-reading outcomes returned by the estimators.
//!
//! Nothing about a single reading is fatal; the outcome says what happened.

/// Why a reading did not advance the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Source reported `unavailable`/`unknown` or an empty value.
    Unavailable,
    /// Value did not parse as a finite number.
    Malformed,
    /// Arrived too soon after (or before) the previous reading.
    Debounced,
    /// Gradient was rejected by the outlier guard.
    Outlier,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::Unavailable => "unavailable",
            IgnoreReason::Malformed => "malformed",
            IgnoreReason::Debounced => "debounced",
            IgnoreReason::Outlier => "outlier",
        }
    }
}

/// Outcome of a temperature (or vibration) reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// First valid reading; state seeded, no flow computed.
    Initialized,
    Processed,
    Ignored(IgnoreReason),
}

/// Which coefficient a calibration step adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KTarget {
    Warm,
    Cold,
}

/// One auto-calibration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KCorrection {
    pub target: KTarget,
    pub old_k: f64,
    pub new_k: f64,
    /// Full correction factor `10 L / residuum` after clamping.
    pub factor: f64,
    pub residuum_l: f64,
    pub avg_temperature: f64,
}

/// Outcome of a totalizer reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TotalizerOutcome {
    /// First reading established the reference.
    Initialized,
    /// A single totalizer step; the account was re-anchored.
    Tick { correction: Option<KCorrection> },
    /// Larger than one step: reference moved, no reset.
    Jump { delta_l: f64 },
    /// Went backwards: ignored.
    Regression { delta_l: f64 },
    /// Sub-step change: reference moved.
    Updated,
    Ignored(IgnoreReason),
}

/// Parse a raw sensor value the way the feeds deliver it.
pub fn parse_value(raw: &str) -> Result<f64, IgnoreReason> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("unavailable") || s.eq_ignore_ascii_case("unknown") {
        return Err(IgnoreReason::Unavailable);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(IgnoreReason::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("14.25", Ok(14.25))]
    #[case(" 7 ", Ok(7.0))]
    #[case("unavailable", Err(IgnoreReason::Unavailable))]
    #[case("Unknown", Err(IgnoreReason::Unavailable))]
    #[case("", Err(IgnoreReason::Unavailable))]
    #[case("warm", Err(IgnoreReason::Malformed))]
    #[case("NaN", Err(IgnoreReason::Malformed))]
    #[case("inf", Err(IgnoreReason::Malformed))]
    fn parses_raw_values(#[case] raw: &str, #[case] want: Result<f64, IgnoreReason>) {
        assert_eq!(parse_value(raw), want);
    }
}
