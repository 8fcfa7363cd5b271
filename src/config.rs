//! Driver configuration.
//!
//! `Config` is plain data with public fields; [`Config::validate`] is called by the
//! driver whenever a new configuration is installed.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "serde")]
use std::path::Path;

use crate::{Activation, BackendKind, Error, Result};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How `Mlp::train` consumes the training set.
pub enum TrainMode {
    /// `epochs` full passes over the shuffled training set.
    #[default]
    Epochs,
    /// One pass per fold over the other `k_folds - 1` folds, validated on the held-out fold.
    CrossValidation,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub backend: BackendKind,
    pub mode: TrainMode,
    pub epochs: usize,
    pub k_folds: usize,
    pub learning_rate: f64,
    /// Fraction of the test set evaluated by `Mlp::test`, in `(0, 1]`.
    pub test_sample: f64,
    pub activation: Activation,
    /// Emit textual epoch/fold/test reports at `info` level.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Matrix,
            mode: TrainMode::Epochs,
            epochs: 5,
            k_folds: 3,
            learning_rate: 0.1,
            test_sample: 1.0,
            activation: Activation::Sigmoid,
            verbose: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        if self.k_folds < 2 {
            return Err(Error::InvalidConfig(format!(
                "k_folds must be >= 2, got {}",
                self.k_folds
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.test_sample > 0.0 && self.test_sample <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "test sample fraction must be in (0, 1], got {}",
                self.test_sample
            )));
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl Config {
    /// Parse a config from JSON; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Config = serde_json::from_str(s)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse config json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::io(&format!("failed to read {}", p.display()), e))?;
        Self::from_json_str(&s)
    }
}
