#![no_main]
use chrono::{Duration, NaiveDate};
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use residuum_core::{EstimatorCfg, InitMode, ThermalEstimator};

#[derive(Debug, Arbitrary)]
enum Step {
    Temperature { gap_s: u16, centi_c: i16 },
    Totalizer { gap_s: u16, deci_l: u32 },
    Raw { gap_s: u16, text: String },
    Reset,
}

fuzz_target!(|steps: Vec<Step>| {
    let Some(mut at) = NaiveDate::from_ymd_opt(2024, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return;
    };
    let mut e = ThermalEstimator::new(EstimatorCfg::default(), InitMode::FreshStart);
    let max_res = e.params().max_residuum_l;
    let max_flow = e.params().max_flow_l_per_min;

    for step in steps {
        match step {
            Step::Temperature { gap_s, centi_c } => {
                at += Duration::seconds(i64::from(gap_s));
                e.process_temperature(at, f64::from(centi_c) / 100.0);
            }
            Step::Totalizer { gap_s, deci_l } => {
                at += Duration::seconds(i64::from(gap_s));
                e.process_totalizer(at, f64::from(deci_l) / 10.0);
            }
            Step::Raw { gap_s, text } => {
                at += Duration::seconds(i64::from(gap_s));
                e.on_temperature(at, &text);
            }
            Step::Reset => e.reset(),
        }
        let r = e.residuum_l();
        assert!((0.0..=max_res + 1e-9).contains(&r), "residuum {r}");
        assert!(e.flow_l_per_min() <= max_flow + 1e-9);
        assert!(e.uncertainty_l() >= 0.0);
    }
});
