//! One monitored pipe: the thermal estimator plus an optional vibration one.
//!
//! Both estimators reconcile against the same totalizer, so totalizer readings
//! are routed to each of them. The reported outcome is the thermal one.

use crate::estimator::ThermalEstimator;
use crate::runner::{Handled, ReadingHandler};
use crate::vibration::VibrationEstimator;
use residuum_traits::{Channel, RawReading};

#[derive(Debug)]
pub struct PipeMonitor {
    thermal: ThermalEstimator,
    vibration: Option<VibrationEstimator>,
}

impl PipeMonitor {
    pub fn new(thermal: ThermalEstimator) -> Self {
        Self {
            thermal,
            vibration: None,
        }
    }

    #[must_use]
    pub fn with_vibration(mut self, vibration: VibrationEstimator) -> Self {
        self.vibration = Some(vibration);
        self
    }

    pub fn thermal(&self) -> &ThermalEstimator {
        &self.thermal
    }

    pub fn thermal_mut(&mut self) -> &mut ThermalEstimator {
        &mut self.thermal
    }

    pub fn vibration(&self) -> Option<&VibrationEstimator> {
        self.vibration.as_ref()
    }

    pub fn vibration_mut(&mut self) -> Option<&mut VibrationEstimator> {
        self.vibration.as_mut()
    }

    pub fn into_parts(self) -> (ThermalEstimator, Option<VibrationEstimator>) {
        (self.thermal, self.vibration)
    }

    pub fn reset(&mut self) {
        self.thermal.reset();
        if let Some(v) = self.vibration.as_mut() {
            v.reset();
        }
    }
}

impl ReadingHandler for PipeMonitor {
    fn handle(&mut self, r: &RawReading) -> Handled {
        match r.channel {
            Channel::Temperature => self.thermal.handle(r),
            Channel::Vibration => match self.vibration.as_mut() {
                Some(v) => v.handle(r),
                None => Handled::Skipped,
            },
            Channel::Totalizer => {
                if let Some(v) = self.vibration.as_mut() {
                    let outcome = v.on_totalizer(r.at, &r.value);
                    tracing::trace!(?outcome, "vibration totalizer");
                }
                self.thermal.handle(r)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EstimatorCfg, VibrationParams};
    use crate::estimator::InitMode;
    use crate::status::{SampleOutcome, TotalizerOutcome};
    use chrono::NaiveDate;

    fn at(s: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .map(|t| t + chrono::Duration::seconds(i64::from(s)))
            .unwrap()
    }

    fn monitor() -> PipeMonitor {
        let thermal = ThermalEstimator::new(EstimatorCfg::default(), InitMode::FreshStart);
        let vib = VibrationEstimator::new(VibrationParams::default());
        PipeMonitor::new(thermal).with_vibration(vib)
    }

    #[test]
    fn totalizer_reaches_both_estimators() {
        let mut m = monitor();
        let h = m.handle(&RawReading::new(at(0), Channel::Totalizer, "123.0"));
        assert_eq!(h, Handled::Totalizer(TotalizerOutcome::Initialized));
        assert_eq!(m.thermal().fusion().last_total_l(), Some(123.0));
        let v = m.vibration().unwrap();
        assert_eq!(v.snapshot().last_totalizer_l, Some(123.0));
    }

    #[test]
    fn channels_are_routed() {
        let mut m = monitor();
        let h = m.handle(&RawReading::new(at(0), Channel::Temperature, "14.0"));
        assert_eq!(h, Handled::Temperature(SampleOutcome::Initialized));
        let h = m.handle(&RawReading::new(at(0), Channel::Vibration, "0.01"));
        assert_eq!(h, Handled::Vibration(SampleOutcome::Initialized));
    }

    #[test]
    fn vibration_is_skipped_without_estimator() {
        let thermal = ThermalEstimator::new(EstimatorCfg::default(), InitMode::FreshStart);
        let mut m = PipeMonitor::new(thermal);
        let h = m.handle(&RawReading::new(at(0), Channel::Vibration, "0.01"));
        assert_eq!(h, Handled::Skipped);
    }
}
