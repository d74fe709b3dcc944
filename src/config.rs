//! Analysis settings.
//!
//! Settings come from defaults, an optional JSON file, and CLI
//! overrides, in that order. Validation is strict: out-of-range values
//! are configuration errors, never silently clamped.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::deviation::DEFAULT_EPSILON;
use crate::errors::ConfigError;
use crate::thresholds::{validate_levels, DEFAULT_LEVELS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Threshold levels as ordered fractions of the monthly reference
    /// peak, each in (0, 1].
    #[serde(default = "default_levels")]
    pub threshold_levels: Vec<f64>,
    /// Negligibility gate for deviation samples, in generation units.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_levels() -> Vec<f64> {
    DEFAULT_LEVELS.to_vec()
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold_levels: default_levels(),
            epsilon: default_epsilon(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_levels(&self.threshold_levels)?;
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ConfigError::InvalidEpsilon {
                epsilon: self.epsilon,
            });
        }
        Ok(())
    }
}

/// Loads settings from a JSON file. Missing fields fall back to the
/// defaults; the result is validated before being returned.
pub fn load_config(path: &Path) -> Result<AnalysisConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: PathBuf::from(path),
        });
    }

    let file = File::open(path).map_err(|e| ConfigError::Io {
        path: PathBuf::from(path),
        source: e,
    })?;
    let reader = BufReader::new(file);

    let config: AnalysisConfig =
        serde_json::from_reader(reader).map_err(|e| ConfigError::Json {
            path: PathBuf::from(path),
            source: e,
        })?;

    config.validate()?;
    Ok(config)
}
