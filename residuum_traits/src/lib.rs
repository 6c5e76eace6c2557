pub mod clock;

pub use clock::{Clock, SystemClock};

use chrono::NaiveDateTime;

/// Which sensor a raw reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Temperature,
    Totalizer,
    Vibration,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Totalizer => "totalizer",
            Channel::Vibration => "vibration",
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temperature" | "temp" => Ok(Channel::Temperature),
            "totalizer" | "total" => Ok(Channel::Totalizer),
            "vibration" | "vib" => Ok(Channel::Vibration),
            other => Err(format!("unknown channel '{other}'")),
        }
    }
}

/// A reading as delivered by a sensor feed: the value is kept verbatim so that
/// "unavailable"/"unknown" states reach the estimator's ignore path.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub at: NaiveDateTime,
    pub channel: Channel,
    pub value: String,
}

impl RawReading {
    pub fn new(at: NaiveDateTime, channel: Channel, value: impl Into<String>) -> Self {
        Self {
            at,
            channel,
            value: value.into(),
        }
    }
}

/// Producer of sensor readings. `Ok(None)` means the source is exhausted.
pub trait ReadingSource {
    fn next_reading(
        &mut self,
    ) -> Result<Option<RawReading>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Tunable coefficients that auto-calibration may hand to persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKey {
    KWarm,
    KCold,
}

impl ParamKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKey::KWarm => "k_warm",
            ParamKey::KCold => "k_cold",
        }
    }
}

/// Persistence sink for calibrated coefficients.
pub trait ParamSink {
    fn store(
        &mut self,
        key: ParamKey,
        value: f64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
