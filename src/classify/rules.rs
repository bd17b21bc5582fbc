//! Deterministic heuristic classifier.
//!
//! Four indicators, each in [0, 1] with 1 meaning "looks organic", are combined by a weighted
//! mean into an organic likelihood:
//!
//! - `color`: the organic color score
//! - `entropy`: color entropy over `entropy_scale` bits, saturating at 1
//! - `edge_softness`: one minus edge density over `edge_density_scale`, floored at 0
//! - `texture`: irregularity of the texture descriptor

use crate::config::RuleConfig;
use crate::error::{ConfigError, ModelError};
use crate::features::texture;
use crate::features::FeatureSet;
use crate::models::{ClassificationResult, Method};

use super::Classifier;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleIndicators {
    pub color: f64,
    pub entropy: f64,
    pub edge_softness: f64,
    pub texture: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleEvaluation {
    pub indicators: RuleIndicators,
    pub likelihood: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RuleBasedClassifier {
    config: RuleConfig,
}

impl RuleBasedClassifier {
    pub fn new(config: RuleConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    pub fn indicators(&self, features: &FeatureSet) -> RuleIndicators {
        let entropy = (features.color_entropy / self.config.entropy_scale).clamp(0.0, 1.0);
        let edge_softness =
            1.0 - (features.edge_density / self.config.edge_density_scale).clamp(0.0, 1.0);

        RuleIndicators {
            color: features.organic_color_score.clamp(0.0, 1.0),
            entropy,
            edge_softness,
            texture: texture::irregularity(&features.texture_descriptor),
        }
    }

    pub fn evaluate(&self, features: &FeatureSet) -> RuleEvaluation {
        let indicators = self.indicators(features);
        let w = &self.config.weights;

        let weighted = w.color * indicators.color
            + w.entropy * indicators.entropy
            + w.edge_softness * indicators.edge_softness
            + w.texture * indicators.texture;
        let total = w.sum();
        let likelihood = if total > 0.0 {
            (weighted / total).clamp(0.0, 1.0)
        } else {
            self.config.threshold
        };

        RuleEvaluation { indicators, likelihood }
    }

    /// Threshold an organic likelihood; ties go to `Organic`
    pub fn decide(&self, likelihood: f64) -> ClassificationResult {
        ClassificationResult::from_rule_likelihood(likelihood, self.config.threshold)
    }

    pub fn classify_rules(&self, features: &FeatureSet) -> ClassificationResult {
        let evaluation = self.evaluate(features);
        tracing::debug!(
            color = evaluation.indicators.color,
            entropy = evaluation.indicators.entropy,
            edge_softness = evaluation.indicators.edge_softness,
            texture = evaluation.indicators.texture,
            likelihood = evaluation.likelihood,
            "rule evaluation"
        );
        self.decide(evaluation.likelihood)
    }
}

impl Classifier for RuleBasedClassifier {
    fn method(&self) -> Method {
        Method::RuleBased
    }

    fn classify(&self, features: &FeatureSet) -> Result<ClassificationResult, ModelError> {
        Ok(self.classify_rules(features))
    }
}
