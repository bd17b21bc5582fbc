use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Relative influence of each rule indicator on the organic likelihood
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleWeights {
    pub color: f64,
    pub entropy: f64,
    pub edge_softness: f64,
    pub texture: f64,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            color: 0.4,
            entropy: 0.2,
            edge_softness: 0.2,
            texture: 0.2,
        }
    }
}

impl RuleWeights {
    pub fn sum(&self) -> f64 {
        self.color + self.entropy + self.edge_softness + self.texture
    }

    fn as_array(&self) -> [f64; 4] {
        [self.color, self.entropy, self.edge_softness, self.texture]
    }
}

/// Tunable constants of the rule-based classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub weights: RuleWeights,
    /// Entropy (bits) at which the entropy indicator saturates
    pub entropy_scale: f64,
    /// Edge density at which the edge softness indicator reaches zero
    pub edge_density_scale: f64,
    pub threshold: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            weights: RuleWeights::default(),
            entropy_scale: 6.0,
            edge_density_scale: 0.2,
            threshold: 0.5,
        }
    }
}

impl RuleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = self.weights.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::InvalidRules(format!(
                "weights must be finite and non-negative, got {:?}",
                self.weights
            )));
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidRules(format!("weights must sum to 1.0, got {sum}")));
        }
        for (name, scale) in [
            ("entropy_scale", self.entropy_scale),
            ("edge_density_scale", self.edge_density_scale),
        ] {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(ConfigError::InvalidRules(format!("{name} must be positive, got {scale}")));
            }
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidRules(format!(
                "threshold must lie in [0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Engine configuration, read once at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trained model artifact; rule-based only when absent
    pub model_path: Option<PathBuf>,
    pub rules: RuleConfig,
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.rules.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn with_model_path(mut self, model_path: Option<PathBuf>) -> Self {
        if model_path.is_some() {
            self.model_path = model_path;
        }
        self
    }
}
