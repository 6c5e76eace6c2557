//! End-to-end estimator scenarios on synthetic one-minute traces.
//!
//! All traces start at 08:00 so the daytime baseline percentile applies and
//! the baseline window is past its warm-up (60 samples) before anything
//! interesting happens.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use residuum_core::{
    EstimatorCfg, IgnoreReason, InitMode, KTarget, SampleOutcome, ThermalEstimator,
    TotalizerOutcome,
};

fn at_min(m: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
        + Duration::minutes(m)
}

fn estimator() -> ThermalEstimator {
    ThermalEstimator::builder().try_build().unwrap()
}

fn steady(e: &mut ThermalEstimator, minutes: std::ops::Range<i64>, temperature: f64) {
    for m in minutes {
        let outcome = e.process_temperature(at_min(m), temperature);
        assert_ne!(outcome, SampleOutcome::Ignored(IgnoreReason::Outlier));
    }
}

#[test]
fn cooling_after_fresh_tick_is_integrated() {
    let mut e = estimator();
    steady(&mut e, 0..201, 14.0);
    assert_eq!(e.process_totalizer(at_min(150), 100.0), TotalizerOutcome::Initialized);
    assert_eq!(e.volume_l(), 100.0);

    let tick = e.process_totalizer(at_min(200) + Duration::seconds(30), 110.0);
    assert_eq!(tick, TotalizerOutcome::Tick { correction: None });
    assert_eq!(e.volume_l(), 110.0);
    assert_eq!(e.residuum_l(), 0.0);

    // Drops of 0.02 °C per minute; three confirmations are needed.
    let mut t = 14.0;
    for (i, m) in (201..204).enumerate() {
        t -= 0.02;
        assert_eq!(e.process_temperature(at_min(m), t), SampleOutcome::Processed);
        if i < 2 {
            assert!(!e.is_flow_active(), "active too early at drop {}", i + 1);
            assert_eq!(e.flow_l_per_min(), 0.0);
        }
    }
    assert!(e.is_flow_active());
    assert!(e.flow_l_per_min() > 0.0);
    assert!(e.volume_l() > 110.0);

    let snap = e.snapshot();
    let filtered = snap.filtered_temperature.unwrap();
    assert!((snap.active_k - e.model().k(filtered)).abs() < 1e-12);
    assert!(snap.residuum_l > 0.0 && snap.residuum_l <= 10.0);
    assert!(snap.uncertainty_l > 0.0);
}

#[test]
fn cooling_without_tick_is_integrated_at_interpolated_k() {
    let mut e = estimator();
    assert_eq!(e.process_totalizer(at_min(0), 100.0), TotalizerOutcome::Initialized);
    steady(&mut e, 1..121, 14.0);
    assert_eq!(e.fusion().last_tick(), None);

    let mut t = 14.0;
    for m in 121..123 {
        t -= 0.02;
        assert_eq!(e.process_temperature(at_min(m), t), SampleOutcome::Processed);
        assert!(!e.is_flow_active(), "active too early at minute {m}");
        assert_eq!(e.volume_l(), 100.0);
    }
    t -= 0.02;
    assert_eq!(e.process_temperature(at_min(123), t), SampleOutcome::Processed);
    assert!(e.is_flow_active());
    assert!(e.flow_l_per_min() > 0.0);
    assert!(e.volume_l() > 100.0);

    let snap = e.snapshot();
    let midpoint = (e.model().k_cold() + e.model().k_warm()) / 2.0;
    assert!((snap.active_k - midpoint).abs() < 0.1, "k = {}", snap.active_k);

    t -= 0.02;
    let before = e.volume_l();
    e.process_temperature(at_min(124), t);
    assert!(e.volume_l() > before);
}

#[test]
fn steady_temperature_never_accumulates() {
    let mut e = estimator();
    e.process_totalizer(at_min(0), 250.0);
    steady(&mut e, 0..400, 14.0);
    assert!(!e.is_flow_active());
    assert_eq!(e.volume_l(), 250.0);
    assert_eq!(e.residuum_l(), 0.0);
}

#[test]
fn single_spike_is_rejected_without_moving_the_filter() {
    let mut e = estimator();
    steady(&mut e, 0..100, 14.0);
    let before = e.filtered_temperature().unwrap();

    assert_eq!(
        e.process_temperature(at_min(100), 20.0),
        SampleOutcome::Ignored(IgnoreReason::Outlier)
    );
    assert_eq!(e.filtered_temperature(), Some(before));
    assert_eq!(e.process_temperature(at_min(101), 14.0), SampleOutcome::Processed);
    assert!(!e.is_flow_active());
}

#[test]
fn persistent_level_shift_is_accepted_on_third_reading() {
    let mut e = estimator();
    steady(&mut e, 0..120, 14.0);
    let outlier = SampleOutcome::Ignored(IgnoreReason::Outlier);
    assert_eq!(e.process_temperature(at_min(120), 18.0), outlier);
    assert_eq!(e.process_temperature(at_min(121), 18.0), outlier);
    assert_eq!(e.process_temperature(at_min(122), 18.0), SampleOutcome::Processed);
    assert!(e.filtered_temperature().unwrap() > 17.0);
    assert_eq!(e.flow_l_per_min(), 0.0);
}

#[test]
fn warm_tick_with_short_residuum_raises_k_warm() {
    let mut e = ThermalEstimator::builder()
        .init_mode(InitMode::RestoredVolume(108.0))
        .try_build()
        .unwrap();
    steady(&mut e, 0..10, 20.0);
    assert_eq!(e.process_totalizer(at_min(10), 100.0), TotalizerOutcome::Initialized);
    assert_eq!(e.residuum_l(), 8.0);

    let TotalizerOutcome::Tick {
        correction: Some(c),
    } = e.process_totalizer(at_min(11), 110.0)
    else {
        panic!("expected a corrected tick");
    };
    assert_eq!(c.target, KTarget::Warm);
    assert_eq!(c.old_k, 4.0);
    assert!((c.factor - 1.25).abs() < 1e-12);
    assert!((c.new_k - 4.25).abs() < 1e-12);
    assert!((e.model().k_warm() - 4.25).abs() < 1e-12);
    assert_eq!(e.model().k_cold(), 8.0);
    assert_eq!(e.volume_l(), 110.0);
    assert_eq!(e.account().offset_l(), 110.0);
    assert_eq!(e.uncertainty_l(), 0.0);
}

#[test]
fn cold_tick_adjusts_k_cold() {
    let mut e = ThermalEstimator::builder()
        .init_mode(InitMode::RestoredVolume(112.0))
        .try_build()
        .unwrap();
    steady(&mut e, 0..10, 9.0);
    e.process_totalizer(at_min(10), 100.0);
    assert_eq!(e.residuum_l(), 10.0);
    let TotalizerOutcome::Tick {
        correction: Some(c),
    } = e.process_totalizer(at_min(11), 110.0)
    else {
        panic!("expected a corrected tick");
    };
    // Residuum is clamped to max_residuum_l (10 L) so the factor is exactly 1.
    assert_eq!(c.target, KTarget::Cold);
    assert!((c.new_k - 8.0).abs() < 1e-12);
}

#[test]
fn tick_between_reference_temperatures_does_not_calibrate() {
    let mut e = ThermalEstimator::builder()
        .init_mode(InitMode::RestoredVolume(106.0))
        .try_build()
        .unwrap();
    steady(&mut e, 0..10, 14.0);
    e.process_totalizer(at_min(10), 100.0);
    assert_eq!(
        e.process_totalizer(at_min(11), 110.0),
        TotalizerOutcome::Tick { correction: None }
    );
    assert_eq!(e.model().k_warm(), 4.0);
    assert_eq!(e.model().k_cold(), 8.0);
}

#[test]
fn large_jump_moves_reference_without_reset() {
    let mut e = ThermalEstimator::builder()
        .init_mode(InitMode::RestoredVolume(104.0))
        .try_build()
        .unwrap();
    e.process_totalizer(at_min(0), 100.0);
    let out = e.process_totalizer(at_min(1), 250.0);
    assert_eq!(out, TotalizerOutcome::Jump { delta_l: 150.0 });
    assert_eq!(e.volume_l(), 104.0);
    assert_eq!(e.fusion().last_total_l(), Some(250.0));
    // Next ordinary tick is measured from the new reference.
    assert!(matches!(
        e.process_totalizer(at_min(2), 260.0),
        TotalizerOutcome::Tick { .. }
    ));
    assert_eq!(e.volume_l(), 260.0);
}

#[test]
fn regression_is_ignored() {
    let mut e = estimator();
    e.process_totalizer(at_min(0), 120.0);
    let out = e.process_totalizer(at_min(1), 119.0);
    assert_eq!(out, TotalizerOutcome::Regression { delta_l: -1.0 });
    assert_eq!(e.fusion().last_total_l(), Some(120.0));
    // Jitter within tolerance moves the reference.
    assert_eq!(e.process_totalizer(at_min(2), 119.95), TotalizerOutcome::Updated);
    assert_eq!(e.fusion().last_total_l(), Some(119.95));
}

#[test]
fn fresh_start_anchors_on_whole_tick() {
    let mut e = estimator();
    e.process_totalizer(at_min(0), 1234.5);
    assert_eq!(e.volume_l(), 1230.0);
    assert_eq!(e.account().offset_l(), 1230.0);
}

#[test]
fn manual_reset_keeps_volume() {
    let mut e = ThermalEstimator::new(EstimatorCfg::default(), InitMode::RestoredVolume(106.0));
    e.process_totalizer(at_min(0), 100.0);
    assert_eq!(e.residuum_l(), 6.0);
    e.reset();
    assert_eq!(e.residuum_l(), 0.0);
    assert_eq!(e.volume_l(), 106.0);
    assert_eq!(e.account().offset_l(), 106.0);
}
