//! Replay of recorded readings from CSV.
//!
//! Exact headers `timestamp,channel,value`. Values stay strings so that
//! `unavailable` and garbage reach the estimator's ignore path; a bad
//! timestamp or channel is a broken recording and fails the replay.

use crate::error::{Result, SourceError};
use crate::timestamp::parse_timestamp;
use residuum_traits::{Channel, RawReading, ReadingSource};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const HEADERS: [&str; 3] = ["timestamp", "channel", "value"];

#[derive(Debug, Deserialize)]
struct ReplayRow {
    timestamp: String,
    channel: String,
    #[serde(default)]
    value: String,
}

pub struct CsvReplaySource<R: Read = File> {
    rows: csv::DeserializeRecordsIntoIter<R, ReplayRow>,
    line: u64,
}

impl CsvReplaySource<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl<R: Read> CsvReplaySource<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let actual: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if actual != HEADERS {
            return Err(SourceError::Headers {
                expected: "timestamp,channel,value",
                got: actual.join(","),
            });
        }
        Ok(Self {
            rows: rdr.into_deserialize(),
            line: 1,
        })
    }

    fn next_row(&mut self) -> Result<Option<RawReading>> {
        let Some(row) = self.rows.next() else {
            return Ok(None);
        };
        self.line += 1;
        let line = self.line;
        let row = row.map_err(|e| SourceError::Row {
            line,
            reason: e.to_string(),
        })?;
        let at = parse_timestamp(&row.timestamp).ok_or_else(|| SourceError::Timestamp {
            line,
            value: row.timestamp.clone(),
        })?;
        let channel: Channel = row
            .channel
            .parse()
            .map_err(|reason| SourceError::Row { line, reason })?;
        Ok(Some(RawReading::new(at, channel, row.value)))
    }
}

impl<R: Read> ReadingSource for CsvReplaySource<R> {
    fn next_reading(
        &mut self,
    ) -> std::result::Result<Option<RawReading>, Box<dyn std::error::Error + Send + Sync>> {
        self.next_row().map_err(Into::into)
    }
}
