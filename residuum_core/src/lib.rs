#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Thermal water-flow estimation with totalizer reconciliation.
//!
//! A coarse totalizer only reports whole 10 L steps. Between those steps this
//! crate estimates consumption from a pipe temperature sensor: cold water
//! drawn through the pipe pulls its temperature down relative to ambient.
//!
//! ## Pipeline
//!
//! Per temperature reading:
//! `TemperatureFilter` (Kalman) → `BaselineTracker` (low percentile) →
//! `OutlierGuard` (median/MAD) → `FlowDetector` (hysteresis + acceptance gate) →
//! `DualKModel` (°C/min → L/min) → `VolumeAccount` (integration).
//!
//! Per totalizer reading: `CalibrationFusion` detects 10 L ticks, nudges the
//! conversion coefficient toward what the tick revealed and re-anchors the
//! volume account.
//!
//! All state is owned by one `ThermalEstimator` per pipe; readings are handled
//! to completion one at a time. `VibrationEstimator` is a simpler sibling that
//! shares the volume bookkeeping.

pub mod analysis;
pub mod baseline;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod detector;
pub mod dual_k;
pub mod error;
pub mod estimator;
pub mod feed;
pub mod fusion;
pub mod kalman;
pub mod mocks;
pub mod notify;
pub mod outlier;
pub mod pipe;
pub mod runner;
pub mod snapshot;
pub mod status;
pub mod util;
pub mod vibration;
pub mod volume;

pub use builder::EstimatorBuilder;
pub use config::{
    BaselineCfg, CalibrationCfg, DetectorCfg, EstimatorCfg, GateCfg, KalmanCfg, OutlierCfg,
    ThermalParams, VibrationParams,
};
pub use dual_k::{DualKModel, KMAX, KMAX_COLD, KMIN};
pub use error::{BuildError, EstimatorError, Result};
pub use estimator::{InitMode, ParamsPatch, ThermalEstimator};
pub use notify::{ParamUpdate, PersistWorker};
pub use pipe::PipeMonitor;
pub use runner::{Handled, ReadingHandler, RunSummary};
pub use snapshot::{Snapshot, VibrationSnapshot};
pub use status::{IgnoreReason, KCorrection, KTarget, SampleOutcome, TotalizerOutcome};
pub use vibration::VibrationEstimator;
