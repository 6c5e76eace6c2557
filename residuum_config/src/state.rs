//! Persisted auto-calibrated coefficients.
//!
//! Stored as a tiny TOML document next to the main config:
//!
//! ```toml
//! k_warm = 4.25
//! k_cold = 8.0
//! ```
use serde::{Deserialize, Serialize};
use std::{fs, io::Write, path::Path};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedCoefficients {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k_warm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k_cold: Option<f64>,
}

impl PersistedCoefficients {
    /// Load the state file. A missing file is not an error.
    pub fn load(path: &Path) -> eyre::Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(eyre::eyre!("read state file {:?}: {}", path, e)),
        };
        let parsed: Self = toml::from_str(&text)
            .map_err(|e| eyre::eyre!("parse state file {:?}: {}", path, e))?;
        for (name, v) in [("k_warm", parsed.k_warm), ("k_cold", parsed.k_cold)] {
            if let Some(v) = v
                && !v.is_finite()
            {
                eyre::bail!("state file {:?}: {name} must be finite", path);
            }
        }
        Ok(Some(parsed))
    }

    pub fn save(&self, path: &Path) -> eyre::Result<()> {
        let text = toml::to_string(self).map_err(|e| eyre::eyre!("encode state: {e}"))?;
        write_atomic(path, text.as_bytes())
            .map_err(|e| eyre::eyre!("write state file {:?}: {}", path, e))
    }

    /// Set one coefficient by its persisted key name.
    pub fn set(&mut self, key: &str, value: f64) -> eyre::Result<()> {
        match key {
            "k_warm" => self.k_warm = Some(value),
            "k_cold" => self.k_cold = Some(value),
            other => eyre::bail!("unknown coefficient '{other}'"),
        }
        Ok(())
    }
}

/// Write via a sibling temp file, fsync, then rename over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}
