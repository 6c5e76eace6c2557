use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use residuum_core::{KMAX, KMAX_COLD, KMIN, ThermalEstimator, VibrationEstimator, VibrationParams};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, 10)
        .unwrap()
        .and_hms_opt(21, 0, 0)
        .unwrap()
}

#[derive(Debug, Clone)]
enum Step {
    Temp { dt_s: i64, value: f64 },
    Total { delta_l: f64 },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        8 => (0i64..180, 2.0f64..35.0).prop_map(|(dt_s, value)| Step::Temp { dt_s, value }),
        1 => prop_oneof![Just(10.0), Just(0.0), Just(-2.0), Just(35.0), 9.6f64..10.4]
            .prop_map(|delta_l| Step::Total { delta_l }),
    ]
}

proptest! {
    #[test]
    fn thermal_invariants_hold_for_arbitrary_traces(
        steps in prop::collection::vec(step_strategy(), 1..400),
        first_total in 0.0f64..5000.0,
    ) {
        let mut e = ThermalEstimator::builder().try_build().unwrap();
        let mut now = start();
        let mut total = first_total;
        e.process_totalizer(now, total);

        for s in steps {
            match s {
                Step::Temp { dt_s, value } => {
                    now += Duration::seconds(dt_s);
                    e.process_temperature(now, value);
                }
                Step::Total { delta_l } => {
                    total = (total + delta_l).max(0.0);
                    e.process_totalizer(now, total);
                }
            }
            let snap = e.snapshot();
            let max_res = e.params().max_residuum_l;
            prop_assert!(snap.residuum_l >= 0.0 && snap.residuum_l <= max_res);
            prop_assert!(snap.flow_l_per_min >= 0.0);
            prop_assert!(snap.flow_l_per_min <= e.params().max_flow_l_per_min);
            prop_assert!(snap.uncertainty_l >= 0.0);
            prop_assert!(snap.k_warm >= KMIN && snap.k_warm <= KMAX);
            prop_assert!(snap.k_cold >= KMIN && snap.k_cold <= KMAX_COLD);
            prop_assert!(snap.active_k >= KMIN && snap.active_k <= KMAX);
            prop_assert!(snap.volume_l.is_finite());
            if let Some(last) = snap.last_totalizer_l {
                prop_assert!(snap.offset_l <= last + 1e-9);
            }
        }

        e.reset();
        prop_assert_eq!(e.residuum_l(), 0.0);
        prop_assert_eq!(e.uncertainty_l(), 0.0);
    }

    #[test]
    fn vibration_flow_is_bounded(stds in prop::collection::vec(0.0f64..1.0, 1..200)) {
        let mut v = VibrationEstimator::new(VibrationParams::default());
        let mut now = start();
        v.process_totalizer(now, 500.0);
        for s in stds {
            now += Duration::seconds(10);
            v.process_vibration(now, s);
            let snap = v.snapshot();
            prop_assert!(snap.flow_l_per_min >= 0.0);
            prop_assert!(snap.flow_l_per_min <= 1.5 * v.params().flow_max_l_per_min);
            prop_assert!(snap.residuum_l >= 0.0 && snap.residuum_l <= v.params().max_residuum_l);
            prop_assert!(
                snap.liter_mark % 10 == 0
                    && f64::from(snap.liter_mark) <= v.params().max_residuum_l
            );
        }
    }
}
