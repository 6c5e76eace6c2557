//! Drives a `ReadingHandler` from a reading source.
//!
//! Two modes, mirroring how the readings arrive:
//! - `run_direct`: pull from the source on the caller's thread (file replay, simulation)
//! - `run_feed`: consume a `Feed` thread (live streams); polls the shutdown flag between readings

use crate::error::{EstimatorError, Result};
use crate::estimator::ThermalEstimator;
use crate::feed::{Feed, FeedItem};
use crate::status::{IgnoreReason, SampleOutcome, TotalizerOutcome};
use crate::vibration::VibrationEstimator;
use crossbeam_channel as xch;
use residuum_traits::{Channel, RawReading, ReadingSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const POLL: Duration = Duration::from_millis(100);

/// What a handler did with one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Handled {
    Temperature(SampleOutcome),
    Vibration(SampleOutcome),
    Totalizer(TotalizerOutcome),
    /// The handler has no use for this channel.
    Skipped,
}

/// Anything that consumes raw readings.
pub trait ReadingHandler {
    fn handle(&mut self, reading: &RawReading) -> Handled;
}

impl ReadingHandler for ThermalEstimator {
    fn handle(&mut self, r: &RawReading) -> Handled {
        match r.channel {
            Channel::Temperature => Handled::Temperature(self.on_temperature(r.at, &r.value)),
            Channel::Totalizer => Handled::Totalizer(self.on_totalizer(r.at, &r.value)),
            Channel::Vibration => Handled::Skipped,
        }
    }
}

impl ReadingHandler for VibrationEstimator {
    fn handle(&mut self, r: &RawReading) -> Handled {
        match r.channel {
            Channel::Vibration => Handled::Vibration(self.on_vibration(r.at, &r.value)),
            Channel::Totalizer => Handled::Totalizer(self.on_totalizer(r.at, &r.value)),
            Channel::Temperature => Handled::Skipped,
        }
    }
}

/// Per-outcome counts for sample channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCounts {
    pub initialized: u64,
    pub processed: u64,
    pub unavailable: u64,
    pub malformed: u64,
    pub debounced: u64,
    pub outliers: u64,
}

impl SampleCounts {
    fn record(&mut self, o: SampleOutcome) {
        match o {
            SampleOutcome::Initialized => self.initialized += 1,
            SampleOutcome::Processed => self.processed += 1,
            SampleOutcome::Ignored(IgnoreReason::Unavailable) => self.unavailable += 1,
            SampleOutcome::Ignored(IgnoreReason::Malformed) => self.malformed += 1,
            SampleOutcome::Ignored(IgnoreReason::Debounced) => self.debounced += 1,
            SampleOutcome::Ignored(IgnoreReason::Outlier) => self.outliers += 1,
        }
    }

    pub fn ignored(&self) -> u64 {
        self.unavailable + self.malformed + self.debounced + self.outliers
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TotalizerCounts {
    pub initialized: u64,
    pub ticks: u64,
    pub corrections: u64,
    pub jumps: u64,
    pub regressions: u64,
    pub updated: u64,
    pub ignored: u64,
}

impl TotalizerCounts {
    fn record(&mut self, o: TotalizerOutcome) {
        match o {
            TotalizerOutcome::Initialized => self.initialized += 1,
            TotalizerOutcome::Tick { correction } => {
                self.ticks += 1;
                if correction.is_some() {
                    self.corrections += 1;
                }
            }
            TotalizerOutcome::Jump { .. } => self.jumps += 1,
            TotalizerOutcome::Regression { .. } => self.regressions += 1,
            TotalizerOutcome::Updated => self.updated += 1,
            TotalizerOutcome::Ignored(_) => self.ignored += 1,
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub readings: u64,
    pub temperature: SampleCounts,
    pub vibration: SampleCounts,
    pub totalizer: TotalizerCounts,
    pub skipped: u64,
    /// Stopped by the shutdown flag rather than end of input.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn record(&mut self, h: &Handled) {
        self.readings += 1;
        match *h {
            Handled::Temperature(o) => self.temperature.record(o),
            Handled::Vibration(o) => self.vibration.record(o),
            Handled::Totalizer(o) => self.totalizer.record(o),
            Handled::Skipped => self.skipped += 1,
        }
    }
}

/// Pull readings from `source` on this thread until it is exhausted or `shutdown` is set.
pub fn run_direct<H, S, F>(
    handler: &mut H,
    source: &mut S,
    shutdown: &AtomicBool,
    mut on_handled: F,
) -> Result<RunSummary>
where
    H: ReadingHandler,
    S: ReadingSource,
    F: FnMut(&H, &RawReading, &Handled),
{
    let mut summary = RunSummary::default();
    loop {
        if shutdown.load(Ordering::Relaxed) {
            summary.interrupted = true;
            break;
        }
        let reading = match source.next_reading() {
            Ok(Some(r)) => r,
            Ok(None) => break,
            Err(e) => return Err(eyre::Report::new(EstimatorError::Source(e.to_string()))),
        };
        let h = handler.handle(&reading);
        summary.record(&h);
        on_handled(handler, &reading, &h);
    }
    tracing::debug!(?summary, "run finished");
    Ok(summary)
}

/// Consume a `Feed` until it disconnects, fails, or `shutdown` is set.
pub fn run_feed<H, F>(
    handler: &mut H,
    feed: &Feed,
    shutdown: &AtomicBool,
    mut on_handled: F,
) -> Result<RunSummary>
where
    H: ReadingHandler,
    F: FnMut(&H, &RawReading, &Handled),
{
    let mut summary = RunSummary::default();
    loop {
        if shutdown.load(Ordering::Relaxed) {
            summary.interrupted = true;
            break;
        }
        match feed.recv_timeout(POLL) {
            Ok(FeedItem::Reading(r)) => {
                let h = handler.handle(&r);
                summary.record(&h);
                on_handled(handler, &r, &h);
            }
            Ok(FeedItem::Failed(msg)) => {
                return Err(eyre::Report::new(EstimatorError::Source(msg)));
            }
            Err(xch::RecvTimeoutError::Timeout) => {}
            Err(xch::RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!(?summary, "feed run finished");
    Ok(summary)
}
