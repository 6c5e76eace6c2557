//! Live readings from a line stream, one `<channel> <value>` per line.
//!
//! Readings are stamped with the clock on arrival. Blank lines and `#`
//! comments are skipped; a line naming an unknown channel is logged and
//! skipped so one bad line does not end a live session.

use residuum_traits::{Channel, Clock, RawReading, ReadingSource};
use std::io::BufRead;

pub struct LineSource<R, C> {
    reader: R,
    clock: C,
    line: u64,
    buf: String,
}

impl<R: BufRead, C: Clock> LineSource<R, C> {
    pub fn new(reader: R, clock: C) -> Self {
        Self {
            reader,
            clock,
            line: 0,
            buf: String::new(),
        }
    }

    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

impl<R: BufRead, C: Clock> ReadingSource for LineSource<R, C> {
    fn next_reading(
        &mut self,
    ) -> Result<Option<RawReading>, Box<dyn std::error::Error + Send + Sync>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let (name, value) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
            match name.parse::<Channel>() {
                Ok(channel) => {
                    return Ok(Some(RawReading::new(self.clock.now(), channel, value.trim())));
                }
                Err(reason) => {
                    tracing::warn!(line = self.line, %reason, "skipping line");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use residuum_traits::clock::test_clock::ManualClock;

    #[test]
    fn parses_and_stamps_lines() {
        let origin = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap();
        let clock = ManualClock::new(origin);
        let input = "# header\n\ntemp 14.5\ntotal   1234.5\npressure 3\nvib\n";
        let mut src = LineSource::new(input.as_bytes(), clock.clone());

        let a = src.next_reading().unwrap().unwrap();
        assert_eq!((a.channel, a.value.as_str()), (Channel::Temperature, "14.5"));
        assert_eq!(a.at, clock.now());

        clock.advance_secs(60);
        let b = src.next_reading().unwrap().unwrap();
        assert_eq!((b.channel, b.value.as_str()), (Channel::Totalizer, "1234.5"));
        assert_eq!(b.at, a.at + chrono::Duration::seconds(60));

        let c = src.next_reading().unwrap().unwrap();
        assert_eq!((c.channel, c.value.as_str()), (Channel::Vibration, ""));
        assert!(src.next_reading().unwrap().is_none());
        assert_eq!(src.lines_read(), 6);
    }
}
