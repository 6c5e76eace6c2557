#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod logging;
mod output;
mod run;
mod state;
mod vib;

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use clap::Parser;
use eyre::WrapErr;
use residuum_config::Config;
use residuum_core::EstimatorError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

/// Explicit `--config` must exist; otherwise the default path is optional.
fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            p.exists().then(|| p.to_path_buf())
        }
    }
}

fn load_config(explicit: Option<&Path>) -> eyre::Result<(Config, Option<PathBuf>)> {
    let path = config_path(explicit);
    let cfg = match &path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .wrap_err_with(|| format!("read config {}", p.display()))?;
            residuum_config::load_toml(&text)
                .map_err(|e| EstimatorError::Config(format!("{}: {e}", p.display())))?
        }
        None => Config::default(),
    };
    cfg.validate()
        .map_err(|e| EstimatorError::Config(e.to_string()))?;
    Ok((cfg, path))
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let (cfg, cfg_path) = load_config(cli.config.as_deref())?;
    logging::init(&cli.log_level, cli.json, &cfg.logging)?;
    tracing::debug!(config = ?cfg_path, "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let state = cli.state.as_deref();
    match cli.cmd {
        Commands::Replay { input, run } => {
            run::replay(&cfg, state, &input, &run, cli.json, &shutdown)?;
        }
        Commands::Follow { buffer, run } => {
            if buffer == 0 {
                eyre::bail!("--buffer must be >= 1");
            }
            run::follow(&cfg, state, buffer, &run, cli.json, &shutdown)?;
        }
        Commands::Simulate {
            hours,
            step_s,
            draw_every_h,
            draw_min,
            flow,
            seed,
            run,
        } => {
            let args = run::SimArgs {
                hours,
                step_s,
                draw_every_h,
                draw_min,
                flow,
                seed,
            };
            run::simulate(&cfg, state, args, &run, cli.json, &shutdown)?;
        }
        Commands::CheckConfig => check_config(&cfg, cfg_path.as_deref(), state, cli.json)?,
        Commands::VibCompare { off, on } => vib::run(&off, &on, cli.json)?,
    }
    Ok(())
}

fn check_config(
    cfg: &Config,
    path: Option<&Path>,
    state: Option<&Path>,
    json: bool,
) -> eyre::Result<()> {
    let persisted = match state {
        Some(p) => run::load_state(p)?,
        None => None,
    };
    let est = residuum_core::EstimatorCfg::from(cfg);
    let est = match &persisted {
        Some(p) => est.with_persisted(p),
        None => est,
    };
    let source = path.map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string());
    let unit = format!("{:?}", cfg.pipe.total_unit).to_ascii_lowercase();

    if json {
        let v = serde_json::json!({
            "config": source,
            "pipe": cfg.pipe.name,
            "total_unit": unit,
            "k_warm": est.thermal.k_warm,
            "k_cold": est.thermal.k_cold,
            "t_warm": est.thermal.t_warm,
            "t_cold": est.thermal.t_cold,
            "tick_l": cfg.calibration.tick_l,
            "persisted": persisted.is_some(),
            "vibration": cfg.vibration.is_some(),
        });
        println!("{v}");
    } else {
        println!("config: {source}");
        println!("pipe: {} (totalizer in {unit})", cfg.pipe.name);
        println!(
            "k_warm={:.3} k_cold={:.3} (t_warm={} °C, t_cold={} °C){}",
            est.thermal.k_warm,
            est.thermal.k_cold,
            est.thermal.t_warm,
            est.thermal.t_cold,
            if persisted.is_some() { " [state file]" } else { "" }
        );
        println!("tick: {} L", cfg.calibration.tick_l);
        println!(
            "vibration estimator: {}",
            if cfg.vibration.is_some() { "enabled" } else { "disabled" }
        );
        println!("config OK");
    }
    Ok(())
}
