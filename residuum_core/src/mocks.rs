//! Test and helper mocks for residuum_core.

use residuum_traits::{ParamKey, ParamSink, RawReading, ReadingSource};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays a fixed list of readings, then reports exhaustion.
#[derive(Debug, Default, Clone)]
pub struct VecSource {
    readings: VecDeque<RawReading>,
}

impl VecSource {
    pub fn new(readings: impl IntoIterator<Item = RawReading>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
        }
    }
}

impl ReadingSource for VecSource {
    fn next_reading(
        &mut self,
    ) -> Result<Option<RawReading>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.readings.pop_front())
    }
}

/// Yields `ok_count` readings from the inner source, then fails.
pub struct FailingSource {
    inner: VecSource,
    ok_count: usize,
}

impl FailingSource {
    pub fn new(inner: VecSource, ok_count: usize) -> Self {
        Self { inner, ok_count }
    }
}

impl ReadingSource for FailingSource {
    fn next_reading(
        &mut self,
    ) -> Result<Option<RawReading>, Box<dyn std::error::Error + Send + Sync>> {
        if self.ok_count == 0 {
            return Err(Box::new(std::io::Error::other("sensor feed lost")));
        }
        self.ok_count -= 1;
        self.inner.next_reading()
    }
}

/// Records every stored coefficient; clones share the record.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    stored: Arc<Mutex<Vec<(ParamKey, f64)>>>,
}

impl RecordingSink {
    pub fn handle(&self) -> Arc<Mutex<Vec<(ParamKey, f64)>>> {
        self.stored.clone()
    }
}

impl ParamSink for RecordingSink {
    fn store(
        &mut self,
        key: ParamKey,
        value: f64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.stored
            .lock()
            .map_err(|_| std::io::Error::other("recording sink poisoned"))?
            .push((key, value));
        Ok(())
    }
}

/// A sink that always fails; persistence errors must not affect estimation.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSink;

impl ParamSink for FailingSink {
    fn store(
        &mut self,
        _key: ParamKey,
        _value: f64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("read-only storage")))
    }
}
