use chrono::{Local, NaiveDateTime};

/// Wall-clock abstraction used to stamp readings that arrive without a timestamp.
///
/// - now(): local wall-clock time (time-of-day matters for night detection)
/// - seconds_since(): helper to compute elapsed seconds from an epoch
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    /// Seconds elapsed since `epoch`, saturating at 0 when the clock went backwards.
    fn seconds_since(&self, epoch: NaiveDateTime) -> f64 {
        let ms = (self.now() - epoch).num_milliseconds();
        (ms.max(0) as f64) / 1000.0
    }
}

/// Default clock backed by the system's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

pub mod test_clock {
    use super::*;
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    /// Deterministic clock whose time is advanced manually.
    ///
    /// now() = origin + offset
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        origin: NaiveDateTime,
        offset: Arc<Mutex<Duration>>,
    }

    impl ManualClock {
        pub fn new(origin: NaiveDateTime) -> Self {
            Self {
                origin,
                offset: Arc::new(Mutex::new(Duration::zero())),
            }
        }

        /// Advance the clock by the given duration.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off += d;
            }
        }

        /// Advance the clock by whole seconds.
        pub fn advance_secs(&self, secs: i64) {
            self.advance(Duration::seconds(secs));
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            let off = self.offset.lock().map(|g| *g).unwrap_or_else(|_| Duration::zero());
            self.origin + off
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::NaiveDate;

        #[test]
        fn manual_clock_advances() {
            let origin = NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(6, 0, 0)
                .unwrap();
            let clock = ManualClock::new(origin);
            assert_eq!(clock.now(), origin);
            clock.advance_secs(90);
            assert_eq!(clock.seconds_since(origin), 90.0);
        }
    }
}
