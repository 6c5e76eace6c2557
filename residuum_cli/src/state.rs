//! State-file persistence for auto-calibrated coefficients.

use residuum_config::PersistedCoefficients;
use residuum_traits::{ParamKey, ParamSink};
use std::path::PathBuf;

/// Rewrites the whole state file atomically on every stored coefficient.
#[derive(Debug, Clone)]
pub struct StateFileSink {
    path: PathBuf,
    current: PersistedCoefficients,
}

impl StateFileSink {
    pub fn new(path: PathBuf, current: PersistedCoefficients) -> Self {
        Self { path, current }
    }
}

impl ParamSink for StateFileSink {
    fn store(
        &mut self,
        key: ParamKey,
        value: f64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut next = self.current;
        next.set(key.as_str(), value).map_err(|e| e.to_string())?;
        next.save(&self.path).map_err(|e| e.to_string())?;
        self.current = next;
        tracing::info!(key = key.as_str(), value, path = %self.path.display(), "coefficient saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_keeps_other_coefficient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        let initial = PersistedCoefficients {
            k_warm: None,
            k_cold: Some(7.5),
        };
        let mut sink = StateFileSink::new(path.clone(), initial);
        sink.store(ParamKey::KWarm, 4.25).unwrap();

        let back = PersistedCoefficients::load(&path).unwrap().unwrap();
        assert_eq!(back.k_warm, Some(4.25));
        assert_eq!(back.k_cold, Some(7.5));
    }

    #[test]
    fn unwritable_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("state.toml");
        let mut sink = StateFileSink::new(path, PersistedCoefficients::default());
        assert!(sink.store(ParamKey::KCold, 8.0).is_err());
    }
}
