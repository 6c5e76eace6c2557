//! Timestamp parsing for recorded feeds.

use chrono::{DateTime, NaiveDateTime};

const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Accepts ISO-8601 local times (`T` or space separated, optional fraction)
/// and RFC 3339 with an offset; offsets are dropped, keeping the wall-clock
/// time the sensor reported.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}
