#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Concrete reading sources for the estimators.
//!
//! - [`CsvReplaySource`]: recorded `timestamp,channel,value` files
//! - [`LineSource`]: a live `<channel> <value>` line stream, stamped on arrival
//! - [`SimulatedPipe`]: a deterministic synthetic pipe with scheduled draws
//!
//! [`recording`] loads accelerometer recordings for offline comparison.

pub mod error;
pub mod line;
pub mod recording;
pub mod replay;
pub mod sim;
pub mod timestamp;

pub use error::SourceError;
pub use line::LineSource;
pub use recording::{VibrationRecording, load_vibration_recording};
pub use replay::CsvReplaySource;
pub use sim::{SimConfig, SimulatedPipe};
