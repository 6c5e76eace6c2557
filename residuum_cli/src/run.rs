//! Estimator assembly and the reading-driven commands: replay, follow, simulate.

use crate::cli::RunOpts;
use crate::output::{notable_line, reading_json, snapshot_line, summary_json, summary_text};
use crate::state::StateFileSink;
use residuum_config::{Config, PersistedCoefficients};
use residuum_core::error::Result as CoreResult;
use residuum_core::feed::Feed;
use residuum_core::runner::{run_direct, run_feed};
use residuum_core::{
    EstimatorCfg, EstimatorError, Handled, InitMode, PersistWorker, PipeMonitor, RunSummary,
    ThermalEstimator, VibrationEstimator, VibrationParams,
};
use residuum_sources::{CsvReplaySource, LineSource, SimConfig, SimulatedPipe};
use residuum_traits::{RawReading, SystemClock};
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Estimators for one pipe plus the worker persisting their coefficients.
pub struct Assembly {
    pub pipe: PipeMonitor,
    /// Dropped after the run so queued coefficients are flushed.
    pub worker: Option<PersistWorker>,
}

pub fn load_state(path: &Path) -> CoreResult<Option<PersistedCoefficients>> {
    PersistedCoefficients::load(path).map_err(|e| EstimatorError::Persist(format!("{e}")).into())
}

pub fn assemble(cfg: &Config, state: Option<&Path>, opts: &RunOpts) -> CoreResult<Assembly> {
    let mut est_cfg = EstimatorCfg::from(cfg);
    let persisted = match state {
        Some(p) => load_state(p)?,
        None => None,
    };
    if let Some(p) = &persisted {
        tracing::info!(k_warm = ?p.k_warm, k_cold = ?p.k_cold, "using persisted coefficients");
        est_cfg = est_cfg.with_persisted(p);
    }

    let worker = state.map(|p| {
        PersistWorker::spawn(StateFileSink::new(p.to_path_buf(), persisted.unwrap_or_default()))
    });

    let mut builder = ThermalEstimator::builder().config(est_cfg);
    if let Some(v) = opts.restore_volume {
        builder = builder.init_mode(InitMode::RestoredVolume(v));
    }
    if let Some(w) = &worker {
        builder = builder.persistence(w.sender());
    }
    let thermal = builder.try_build()?;

    let mut pipe = PipeMonitor::new(thermal);
    if let Some(params) = VibrationParams::from_config(cfg) {
        tracing::info!(
            std_threshold = params.std_threshold,
            std_max = params.std_max,
            "vibration estimator enabled"
        );
        pipe = pipe.with_vibration(VibrationEstimator::new(params));
    }
    Ok(Assembly { pipe, worker })
}

fn printer(json: bool, trace: bool) -> impl FnMut(&PipeMonitor, &RawReading, &Handled) {
    move |pipe, r, h| {
        if json {
            println!("{}", reading_json(pipe, r, h));
        } else if trace {
            println!("{}", snapshot_line(r, h, &pipe.thermal().snapshot()));
        } else if let Some(line) = notable_line(r, h) {
            println!("{line}");
        }
    }
}

fn finish(assembly: Assembly, summary: RunSummary, json: bool) -> RunSummary {
    let Assembly { pipe, worker } = assembly;
    if json {
        println!("{}", summary_json(&summary, &pipe));
    } else {
        println!("{}", summary_text(&summary, &pipe));
    }
    drop(worker);
    summary
}

pub fn replay(
    cfg: &Config,
    state: Option<&Path>,
    input: &Path,
    opts: &RunOpts,
    json: bool,
    shutdown: &AtomicBool,
) -> CoreResult<RunSummary> {
    let mut source = CsvReplaySource::open(input)?;
    let mut assembly = assemble(cfg, state, opts)?;
    tracing::info!(input = %input.display(), pipe = %cfg.pipe.name, "replay start");
    let summary = run_direct(&mut assembly.pipe, &mut source, shutdown, printer(json, opts.trace))?;
    Ok(finish(assembly, summary, json))
}

pub fn follow(
    cfg: &Config,
    state: Option<&Path>,
    buffer: usize,
    opts: &RunOpts,
    json: bool,
    shutdown: &AtomicBool,
) -> CoreResult<RunSummary> {
    let mut assembly = assemble(cfg, state, opts)?;
    let source = LineSource::new(std::io::BufReader::new(std::io::stdin()), SystemClock::new());
    let feed = Feed::spawn(source, buffer);
    tracing::info!(pipe = %cfg.pipe.name, buffer, "following stdin");
    let summary = run_feed(&mut assembly.pipe, &feed, shutdown, printer(json, opts.trace))?;
    drop(feed);
    Ok(finish(assembly, summary, json))
}

/// Simulation knobs from the command line.
#[derive(Debug, Clone, Copy)]
pub struct SimArgs {
    pub hours: f64,
    pub step_s: i64,
    pub draw_every_h: f64,
    pub draw_min: f64,
    pub flow: f64,
    pub seed: u32,
}

impl SimArgs {
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_config(self, vibration: bool) -> CoreResult<SimConfig> {
        if !(self.hours.is_finite() && self.hours > 0.0) {
            eyre::bail!("--hours must be > 0");
        }
        if self.step_s < 1 {
            eyre::bail!("--step-s must be >= 1");
        }
        if !(self.flow.is_finite() && self.flow >= 0.0) {
            eyre::bail!("--flow must be >= 0");
        }
        Ok(SimConfig {
            step_s: self.step_s,
            duration_s: (self.hours * 3600.0).round() as i64,
            draw_every_s: (self.draw_every_h * 3600.0).round() as i64,
            draw_len_s: (self.draw_min * 60.0).round() as i64,
            draw_flow_l_per_min: self.flow,
            vibration,
            seed: self.seed,
            ..SimConfig::default()
        })
    }
}

pub fn simulate(
    cfg: &Config,
    state: Option<&Path>,
    args: SimArgs,
    opts: &RunOpts,
    json: bool,
    shutdown: &AtomicBool,
) -> CoreResult<RunSummary> {
    let sim_cfg = args.to_config(cfg.vibration.is_some())?;
    let mut assembly = assemble(cfg, state, opts)?;
    let mut source = SimulatedPipe::new(sim_cfg);
    tracing::info!(hours = args.hours, seed = args.seed, "simulation start");
    let summary = run_direct(&mut assembly.pipe, &mut source, shutdown, printer(json, opts.trace))?;
    tracing::info!(true_total_l = source.true_total_l(), "simulation finished");
    Ok(finish(assembly, summary, json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_coefficients_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(&path, "k_warm = 5.5\n").unwrap();
        let a = assemble(&Config::default(), Some(&path), &RunOpts::default()).unwrap();
        assert_eq!(a.pipe.thermal().model().k_warm(), 5.5);
        assert_eq!(a.pipe.thermal().model().k_cold(), 8.0);
        assert!(a.pipe.vibration().is_none());
    }

    #[test]
    fn corrupt_state_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(&path, "k_warm = \"warm\"\n").unwrap();
        let err = assemble(&Config::default(), Some(&path), &RunOpts::default())
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<EstimatorError>(),
            Some(EstimatorError::Persist(_))
        ));
    }

    #[test]
    fn negative_restore_volume_is_rejected() {
        let opts = RunOpts {
            restore_volume: Some(-1.0),
            trace: false,
        };
        assert!(assemble(&Config::default(), None, &opts).is_err());
    }

    #[test]
    fn sim_args_are_checked() {
        let args = SimArgs {
            hours: 0.0,
            step_s: 60,
            draw_every_h: 3.0,
            draw_min: 10.0,
            flow: 6.0,
            seed: 1,
        };
        assert!(args.to_config(false).is_err());
        let ok = SimArgs { hours: 2.0, ..args }.to_config(true).unwrap();
        assert_eq!(ok.duration_s, 7200);
        assert!(ok.vibration);
    }
}
