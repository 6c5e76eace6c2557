//! Text and JSON-lines rendering of outcomes, snapshots and run summaries.

use residuum_core::runner::{SampleCounts, TotalizerCounts};
use residuum_core::{
    Handled, KCorrection, KTarget, PipeMonitor, RunSummary, SampleOutcome, Snapshot,
    TotalizerOutcome, VibrationSnapshot,
};
use residuum_traits::RawReading;
use serde_json::{Value, json};

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn outcome_name(h: &Handled) -> String {
    match h {
        Handled::Temperature(o) | Handled::Vibration(o) => match o {
            SampleOutcome::Initialized => "initialized".into(),
            SampleOutcome::Processed => "processed".into(),
            SampleOutcome::Ignored(r) => format!("ignored:{}", r.as_str()),
        },
        Handled::Totalizer(o) => match o {
            TotalizerOutcome::Initialized => "initialized".into(),
            TotalizerOutcome::Tick { .. } => "tick".into(),
            TotalizerOutcome::Jump { .. } => "jump".into(),
            TotalizerOutcome::Regression { .. } => "regression".into(),
            TotalizerOutcome::Updated => "updated".into(),
            TotalizerOutcome::Ignored(r) => format!("ignored:{}", r.as_str()),
        },
        Handled::Skipped => "skipped".into(),
    }
}

fn target_name(t: KTarget) -> &'static str {
    match t {
        KTarget::Warm => "k_warm",
        KTarget::Cold => "k_cold",
    }
}

fn correction_json(c: &KCorrection) -> Value {
    json!({
        "target": target_name(c.target),
        "old_k": c.old_k,
        "new_k": c.new_k,
        "factor": c.factor,
        "residuum_l": c.residuum_l,
        "avg_temperature": c.avg_temperature,
    })
}

pub fn snapshot_json(s: &Snapshot) -> Value {
    json!({
        "flow_l_per_min": s.flow_l_per_min,
        "volume_l": s.volume_l,
        "offset_l": s.offset_l,
        "residuum_l": s.residuum_l,
        "uncertainty_l": s.uncertainty_l,
        "active_k": s.active_k,
        "filtered_temperature": s.filtered_temperature,
        "raw_temperature": s.raw_temperature,
        "gradient": s.gradient,
        "night_mode": s.night_mode,
        "deep_sleep": s.deep_sleep,
        "flow_active": s.flow_active,
        "variance_ratio": s.variance_ratio,
        "variance_flow": s.variance_flow,
        "k_warm": s.k_warm,
        "k_cold": s.k_cold,
        "last_totalizer_l": s.last_totalizer_l,
    })
}

pub fn vibration_json(s: &VibrationSnapshot) -> Value {
    json!({
        "flow_l_per_min": s.flow_l_per_min,
        "volume_l": s.volume_l,
        "offset_l": s.offset_l,
        "residuum_l": s.residuum_l,
        "flow_active": s.flow_active,
        "last_std": s.last_std,
        "liter_mark": s.liter_mark,
    })
}

/// One JSON line per handled reading.
pub fn reading_json(pipe: &PipeMonitor, r: &RawReading, h: &Handled) -> Value {
    let mut obj = json!({
        "at": r.at.format(TS_FORMAT).to_string(),
        "channel": r.channel.as_str(),
        "value": r.value,
        "outcome": outcome_name(h),
        "thermal": snapshot_json(&pipe.thermal().snapshot()),
    });
    if let Some(v) = pipe.vibration() {
        obj["vibration"] = vibration_json(&v.snapshot());
    }
    if let Handled::Totalizer(TotalizerOutcome::Tick {
        correction: Some(c),
    }) = h
    {
        obj["correction"] = correction_json(c);
    }
    obj
}

pub fn snapshot_line(r: &RawReading, h: &Handled, s: &Snapshot) -> String {
    format!(
        "{} {:<11} {:<20} flow={:6.2} L/min  residuum={:5.2} L  volume={:.2} L  k={:.2}{}",
        r.at.format(TS_FORMAT),
        r.channel.as_str(),
        outcome_name(h),
        s.flow_l_per_min,
        s.residuum_l,
        s.volume_l,
        s.active_k,
        if s.flow_active { "  [flow]" } else { "" },
    )
}

/// Lines worth printing in text mode even without `--trace`.
pub fn notable_line(r: &RawReading, h: &Handled) -> Option<String> {
    let at = r.at.format(TS_FORMAT);
    match h {
        Handled::Totalizer(TotalizerOutcome::Tick { correction }) => Some(match correction {
            Some(c) => format!(
                "{at} tick at {} L; {} {:.3} -> {:.3} (residuum {:.2} L, avg {:.1} °C)",
                r.value,
                target_name(c.target),
                c.old_k,
                c.new_k,
                c.residuum_l,
                c.avg_temperature
            ),
            None => format!("{at} tick at {} L", r.value),
        }),
        Handled::Totalizer(TotalizerOutcome::Jump { delta_l }) => {
            Some(format!("{at} totalizer jump of {delta_l:.1} L"))
        }
        Handled::Totalizer(TotalizerOutcome::Regression { delta_l }) => {
            Some(format!("{at} totalizer went backwards by {:.2} L (ignored)", -delta_l))
        }
        _ => None,
    }
}

fn sample_counts_json(c: &SampleCounts) -> Value {
    json!({
        "initialized": c.initialized,
        "processed": c.processed,
        "unavailable": c.unavailable,
        "malformed": c.malformed,
        "debounced": c.debounced,
        "outliers": c.outliers,
    })
}

fn totalizer_counts_json(c: &TotalizerCounts) -> Value {
    json!({
        "initialized": c.initialized,
        "ticks": c.ticks,
        "corrections": c.corrections,
        "jumps": c.jumps,
        "regressions": c.regressions,
        "updated": c.updated,
        "ignored": c.ignored,
    })
}

pub fn summary_json(summary: &RunSummary, pipe: &PipeMonitor) -> Value {
    let mut obj = json!({
        "summary": {
            "readings": summary.readings,
            "interrupted": summary.interrupted,
            "skipped": summary.skipped,
            "temperature": sample_counts_json(&summary.temperature),
            "vibration": sample_counts_json(&summary.vibration),
            "totalizer": totalizer_counts_json(&summary.totalizer),
            "thermal": snapshot_json(&pipe.thermal().snapshot()),
        }
    });
    if let Some(v) = pipe.vibration() {
        obj["summary"]["vibration_estimate"] = vibration_json(&v.snapshot());
    }
    obj
}

pub fn summary_text(summary: &RunSummary, pipe: &PipeMonitor) -> String {
    let s = pipe.thermal().snapshot();
    let t = &summary.temperature;
    let mut out = String::new();
    out.push_str("--- Residuum Summary ---\n");
    out.push_str(&format!(
        "Readings: {}{}\n",
        summary.readings,
        if summary.interrupted { " (interrupted)" } else { "" }
    ));
    out.push_str(&format!(
        "Temperature: {} processed, {} ignored ({} outliers, {} debounced, {} unavailable, {} malformed)\n",
        t.processed,
        t.ignored(),
        t.outliers,
        t.debounced,
        t.unavailable,
        t.malformed
    ));
    out.push_str(&format!(
        "Totalizer: {} ticks, {} corrections, {} jumps, {} regressions\n",
        summary.totalizer.ticks,
        summary.totalizer.corrections,
        summary.totalizer.jumps,
        summary.totalizer.regressions
    ));
    out.push_str(&format!(
        "Volume: {:.2} L (residuum {:.2} ± {:.2} L)\n",
        s.volume_l, s.residuum_l, s.uncertainty_l
    ));
    out.push_str(&format!("Coefficients: k_warm={:.3} k_cold={:.3}\n", s.k_warm, s.k_cold));
    if let Some(v) = pipe.vibration() {
        let vs = v.snapshot();
        out.push_str(&format!(
            "Vibration: volume {:.2} L (residuum {:.2} L, mark {} L)\n",
            vs.volume_l, vs.residuum_l, vs.liter_mark
        ));
    }
    out.push_str("------------------------");
    out
}
