//! Accelerometer recordings for offline vibration analysis.
//!
//! Two layouts are accepted:
//! - CSV with exact headers `x,y,z,mag`
//! - device log lines carrying `[DATA:<n>]: x,y,z,mag`; other lines are skipped

use eyre::WrapErr;
use serde::Deserialize;
use std::path::Path;

const LOG_MARKER: &str = "DATA:";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VibrationRecording {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub mag: Vec<f64>,
}

impl VibrationRecording {
    pub fn len(&self) -> usize {
        self.mag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mag.is_empty()
    }

    /// Axis series by name (`x`, `y`, `z`, `mag`).
    pub fn axis(&self, name: &str) -> Option<&[f64]> {
        match name {
            "x" => Some(&self.x),
            "y" => Some(&self.y),
            "z" => Some(&self.z),
            "mag" => Some(&self.mag),
            _ => None,
        }
    }

    fn push(&mut self, [x, y, z, mag]: [f64; 4]) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
        self.mag.push(mag);
    }
}

#[derive(Debug, Deserialize)]
struct Row {
    x: f64,
    y: f64,
    z: f64,
    mag: f64,
}

pub fn load_vibration_recording(path: &Path) -> eyre::Result<VibrationRecording> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read vibration recording {}", path.display()))?;
    parse_recording(&text).wrap_err_with(|| format!("parse vibration recording {}", path.display()))
}

pub fn parse_recording(text: &str) -> eyre::Result<VibrationRecording> {
    let first = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if first.trim_start().starts_with("x,") {
        parse_csv(text)
    } else {
        Ok(parse_log(text))
    }
}

fn parse_csv(text: &str) -> eyre::Result<VibrationRecording> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers != ["x", "y", "z", "mag"] {
        eyre::bail!(
            "vibration CSV must have headers 'x,y,z,mag', got: {}",
            headers.join(",")
        );
    }
    let mut rec = VibrationRecording::default();
    for (idx, row) in rdr.deserialize::<Row>().enumerate() {
        match row {
            Ok(r) => rec.push([r.x, r.y, r.z, r.mag]),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    Ok(rec)
}

fn parse_log(text: &str) -> VibrationRecording {
    let mut rec = VibrationRecording::default();
    for line in text.lines() {
        if let Some(values) = log_values(line) {
            rec.push(values);
        }
    }
    rec
}

fn log_values(line: &str) -> Option<[f64; 4]> {
    let after = &line[line.find(LOG_MARKER)? + LOG_MARKER.len()..];
    let payload = after.split_once("]:")?.1;
    let mut out = [0.0; 4];
    let mut parts = payload.trim().split(',');
    for slot in &mut out {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    parts.next().is_none().then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_csv_layout() {
        let rec = parse_recording("x,y,z,mag\n0.1,0.2,0.9,0.93\n0.0,0.1,1.0,1.01\n").unwrap();
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.axis("z"), Some(&[0.9, 1.0][..]));
        assert_eq!(rec.axis("w"), None);
    }

    #[test]
    fn csv_with_wrong_headers_fails() {
        let err = parse_recording("x,y,mag\n1,2,3\n").unwrap_err();
        assert!(err.to_string().contains("x,y,z,mag"));
    }

    #[test]
    fn reads_device_log_layout() {
        let log = "\
[12:00:01][I][boot]: starting\n\
[12:00:02][W][DATA:001]: -0.012,0.020,0.981,0.9812\n\
[12:00:02][W][DATA:002]: -0.010,0.018,0.979,0.9792\n\
[12:00:03][W][DATA:003]: broken\n";
        let rec = parse_recording(log).unwrap();
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.x, vec![-0.012, -0.010]);
        assert_eq!(rec.mag, vec![0.9812, 0.9792]);
    }

    #[test]
    fn loads_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "x,y,z,mag").unwrap();
        writeln!(f, "0,0,1,1").unwrap();
        let rec = load_vibration_recording(f.path()).unwrap();
        assert_eq!(rec.mag, vec![1.0]);
    }
}
