//! `vib-compare`: does the accelerometer see the water?

use residuum_core::analysis::{SeriesStats, compare};
use residuum_sources::{VibrationRecording, load_vibration_recording};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::path::Path;

const AXES: [&str; 4] = ["x", "y", "z", "mag"];

fn stats_json(s: Option<SeriesStats>) -> Value {
    s.map_or(Value::Null, |s| {
        json!({
            "count": s.count,
            "mean": s.mean,
            "std": s.std,
            "min": s.min,
            "max": s.max,
            "range": s.range(),
        })
    })
}

/// Per-axis statistics of both recordings plus the `mag` comparison.
pub fn report(off: &VibrationRecording, on: &VibrationRecording) -> eyre::Result<Value> {
    let Some(cmp) = compare(&off.mag, &on.mag) else {
        eyre::bail!(
            "each recording needs at least two samples (off: {}, on: {})",
            off.len(),
            on.len()
        );
    };

    let mut axes = serde_json::Map::new();
    for axis in AXES {
        let of = |r: &VibrationRecording| r.axis(axis).and_then(SeriesStats::of);
        axes.insert(
            axis.to_string(),
            json!({ "off": stats_json(of(off)), "on": stats_json(of(on)) }),
        );
    }

    Ok(json!({
        "axes": axes,
        "mag": {
            "cohens_d": cmp.cohens_d,
            "effect": cmp.effect.as_str(),
            "std_ratio": cmp.std_ratio,
            "variance": cmp.variance_shift.as_str(),
            "mean_shift": cmp.on.mean - cmp.off.mean,
        },
    }))
}

fn render_text(v: &Value) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<4} {:>6} {:>10} {:>10} {:>10} {:>10}",
        "axis", "state", "mean", "std", "min", "max"
    );
    for axis in AXES {
        for state in ["off", "on"] {
            let s = &v["axes"][axis][state];
            if s.is_null() {
                let _ = writeln!(out, "{axis:<4} {state:>6} {:>10}", "n/a");
                continue;
            }
            let f = |k: &str| s[k].as_f64().unwrap_or(f64::NAN);
            let _ = writeln!(
                out,
                "{axis:<4} {state:>6} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
                f("mean"),
                f("std"),
                f("min"),
                f("max")
            );
        }
    }
    let m = &v["mag"];
    let _ = write!(
        out,
        "mag: cohen's d {:.3} ({}), std ratio {:.2} ({} variance with water on)",
        m["cohens_d"].as_f64().unwrap_or(f64::NAN),
        m["effect"].as_str().unwrap_or("?"),
        m["std_ratio"].as_f64().unwrap_or(f64::NAN),
        m["variance"].as_str().unwrap_or("?"),
    );
    out
}

pub fn run(off: &Path, on: &Path, json_mode: bool) -> eyre::Result<()> {
    let off_rec = load_vibration_recording(off)?;
    let on_rec = load_vibration_recording(on)?;
    tracing::info!(off = off_rec.len(), on = on_rec.len(), "recordings loaded");
    let v = report(&off_rec, &on_rec)?;
    if json_mode {
        println!("{v}");
    } else {
        println!("{}", render_text(&v));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(mag: &[f64]) -> VibrationRecording {
        VibrationRecording {
            x: mag.to_vec(),
            y: vec![0.0; mag.len()],
            z: mag.iter().map(|m| -m).collect(),
            mag: mag.to_vec(),
        }
    }

    #[test]
    fn noisy_on_recording_is_a_large_effect() {
        let off = rec(&[1.00, 1.01, 0.99, 1.00, 1.01, 0.99]);
        let on = rec(&[1.10, 1.30, 0.90, 1.20, 1.00, 1.40]);
        let v = report(&off, &on).unwrap();
        assert_eq!(v["mag"]["effect"], "large");
        assert_eq!(v["mag"]["variance"], "more");
        assert_eq!(v["axes"]["mag"]["off"]["count"], 6);
        assert!(render_text(&v).contains("cohen's d"));
    }

    #[test]
    fn single_sample_recording_is_rejected() {
        assert!(report(&rec(&[1.0]), &rec(&[1.0, 2.0])).is_err());
    }
}
