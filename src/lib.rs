pub mod classify;
pub mod config;
pub mod error;
pub mod features;
pub mod models;

pub use classify::{
    classify_model, Classifier, MaterialClassifier, ModelArtifact, RuleBasedClassifier,
    StatisticalModelClassifier,
};
pub use config::{EngineConfig, RuleConfig, RuleWeights};
pub use error::{ConfigError, ExtractionError, ModelError};
pub use features::{FeatureExtractor, FeatureSet, FeatureVector, FEATURE_VECTOR_LEN};
pub use models::{ClassificationResult, Material, Method, Probabilities};
