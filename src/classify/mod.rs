pub mod model;
pub mod rules;

use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use tracing::{error, info, warn};

use crate::config::{EngineConfig, RuleConfig};
use crate::error::{ConfigError, ExtractionError, ModelError};
use crate::features::{FeatureExtractor, FeatureSet, FEATURE_VECTOR_LEN};
use crate::models::{ClassificationResult, Method};

pub use model::{classify_model, ModelArtifact, StatisticalModelClassifier};
pub use rules::{RuleBasedClassifier, RuleEvaluation, RuleIndicators};

/// A decision function from features to a material
pub trait Classifier: Send + Sync {
    /// Reported as the provenance of every result this classifier produces
    fn method(&self) -> Method;

    fn classify(&self, features: &FeatureSet) -> Result<ClassificationResult, ModelError>;

    /// Feature vector length this classifier was built for, if it is layout-sensitive
    fn expected_feature_len(&self) -> Option<usize> {
        None
    }
}

/// Extracts features and dispatches to the statistical model when one is loaded,
/// falling back to the rule-based classifier otherwise.
///
/// Holds no per-request state; share it behind an `Arc` across workers.
#[derive(Clone)]
pub struct MaterialClassifier {
    extractor: FeatureExtractor,
    rules: RuleBasedClassifier,
    model: Option<Arc<dyn Classifier>>,
}

impl MaterialClassifier {
    pub fn new(rules: RuleBasedClassifier, artifact: Option<Arc<ModelArtifact>>) -> Self {
        let model = artifact
            .map(|a| Arc::new(StatisticalModelClassifier::new(a)) as Arc<dyn Classifier>);
        Self::with_model(rules, model)
    }

    /// Use an arbitrary classifier in the model slot
    pub fn with_model(rules: RuleBasedClassifier, model: Option<Arc<dyn Classifier>>) -> Self {
        if let Some(expected) = model.as_ref().and_then(|m| m.expected_feature_len()) {
            if expected != FEATURE_VECTOR_LEN {
                warn!(
                    artifact_feature_len = expected,
                    extractor_feature_len = FEATURE_VECTOR_LEN,
                    "model artifact does not match the feature layout; requests will use rule-based classification"
                );
            }
        }
        Self {
            extractor: FeatureExtractor::new(),
            rules,
            model,
        }
    }

    /// Rule-based only
    pub fn rule_based(rules: RuleConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(RuleBasedClassifier::new(rules)?, None))
    }

    /// Build from configuration, loading the artifact once.
    ///
    /// An artifact that cannot be loaded leaves the classifier in rule-based mode.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let rules = RuleBasedClassifier::new(config.rules)?;

        let artifact = match &config.model_path {
            Some(path) => match ModelArtifact::load(path) {
                Ok(artifact) => Some(Arc::new(artifact)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not load model artifact; using rule-based classification");
                    None
                }
            },
            None => {
                info!("no model artifact configured; using rule-based classification");
                None
            }
        };

        Ok(Self::new(rules, artifact))
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn rules(&self) -> &RuleBasedClassifier {
        &self.rules
    }

    pub fn classify(&self, image: &RgbImage) -> Result<ClassificationResult, ExtractionError> {
        let features = self.extractor.extract(image)?;
        Ok(self.classify_features(&features))
    }

    pub fn classify_dynamic(&self, image: &DynamicImage) -> Result<ClassificationResult, ExtractionError> {
        self.classify(&image.to_rgb8())
    }

    /// Dispatch already-extracted features
    pub fn classify_features(&self, features: &FeatureSet) -> ClassificationResult {
        let Some(model) = &self.model else {
            return self.rules.classify_rules(features);
        };

        match model.classify(features) {
            Ok(result) => ClassificationResult {
                method: model.method(),
                ..result
            },
            Err(ModelError::Unavailable) => self.rules.classify_rules(features),
            Err(e @ ModelError::VersionMismatch(_)) => {
                warn!(error = %e, "model artifact is misconfigured; falling back to rule-based classification");
                self.rules.classify_rules(features)
            }
            Err(e) => {
                error!(error = %e, "model classification failed; falling back to rule-based classification");
                self.rules.classify_rules(features)
            }
        }
    }
}

impl Default for MaterialClassifier {
    fn default() -> Self {
        Self::new(RuleBasedClassifier::default(), None)
    }
}
