//! Pre-trained statistical model artifacts.
//!
//! An artifact is a JSON document produced by the offline training job. The only contract
//! between training and serving is the feature vector layout (see
//! [`FeatureSet::to_vector`](crate::features::FeatureSet::to_vector)) and the format
//! identifier/version pair below.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ModelError;
use crate::features::{FeatureSet, FeatureVector};
use crate::models::{ClassificationResult, Method};

use super::Classifier;

pub const ARTIFACT_FORMAT: &str = "wastesort.material-classifier";
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Standardization applied before the estimator: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Go to `left` when `x[feature] <= threshold`, otherwise `right`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { organic: f64 },
}

/// A decision tree stored as a flat node list; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Walk from the root to a leaf; `None` if the tree does not lead to one
    fn predict(&self, x: &[f64]) -> Option<f64> {
        let mut index = 0;
        for _ in 0..self.nodes.len() {
            match self.nodes.get(index)? {
                Node::Leaf { organic } => return Some(*organic),
                Node::Split { feature, threshold, left, right } => {
                    index = if *x.get(*feature)? <= *threshold { *left } else { *right };
                }
            }
        }
        None
    }

    fn validate(&self, tree_index: usize, feature_len: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::malformed(format!("tree {tree_index} has no nodes")));
        }
        let count = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { organic } => {
                    if !(0.0..=1.0).contains(organic) {
                        return Err(ModelError::malformed(format!(
                            "tree {tree_index} node {i}: leaf probability {organic} outside [0, 1]"
                        )));
                    }
                }
                Node::Split { feature, threshold, left, right } => {
                    if *feature >= feature_len {
                        return Err(ModelError::malformed(format!(
                            "tree {tree_index} node {i}: feature {feature} out of range"
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(ModelError::malformed(format!(
                            "tree {tree_index} node {i}: NaN threshold"
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= count {
                            return Err(ModelError::malformed(format!(
                                "tree {tree_index} node {i}: child {child} must point forward within the tree"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    /// Mean of per-tree organic probabilities
    Forest { trees: Vec<Tree> },
    /// `sigmoid(weights · x + bias)`
    Logistic { weights: Vec<f64>, bias: f64 },
}

/// A trained classifier, immutable once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: String,
    pub format_version: u32,
    /// Length of the feature vector the model was trained on
    pub feature_len: usize,
    #[serde(default)]
    pub scaler: Option<Scaler>,
    pub estimator: Estimator,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact = Self::from_json(&contents)?;
        info!(
            path = %path.display(),
            feature_len = artifact.feature_len,
            estimator = artifact.estimator_name(),
            "loaded model artifact"
        );
        Ok(artifact)
    }

    pub fn from_json(contents: &str) -> Result<Self, ModelError> {
        // Check the header before the body so an artifact from a newer trainer reports a
        // version mismatch rather than a parse error
        #[derive(Deserialize)]
        struct Header {
            format: String,
            format_version: u32,
        }
        let header: Header = serde_json::from_str(contents)?;
        check_format(&header.format, header.format_version)?;

        let artifact: ModelArtifact = serde_json::from_str(contents)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn estimator_name(&self) -> &'static str {
        match self.estimator {
            Estimator::Forest { .. } => "forest",
            Estimator::Logistic { .. } => "logistic",
        }
    }

    /// Structural checks independent of the extractor
    pub fn validate(&self) -> Result<(), ModelError> {
        check_format(&self.format, self.format_version)?;
        if self.feature_len == 0 {
            return Err(ModelError::malformed("feature_len must be positive"));
        }

        if let Some(scaler) = &self.scaler {
            if scaler.mean.len() != self.feature_len || scaler.scale.len() != self.feature_len {
                return Err(ModelError::malformed(format!(
                    "scaler has {} means and {} scales for {} features",
                    scaler.mean.len(),
                    scaler.scale.len(),
                    self.feature_len
                )));
            }
            if scaler.mean.iter().any(|m| !m.is_finite()) {
                return Err(ModelError::malformed("scaler means must be finite"));
            }
            if scaler.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
                return Err(ModelError::malformed("scaler scales must be positive"));
            }
        }

        match &self.estimator {
            Estimator::Forest { trees } => {
                if trees.is_empty() {
                    return Err(ModelError::malformed("forest has no trees"));
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(i, self.feature_len)?;
                }
            }
            Estimator::Logistic { weights, bias } => {
                if weights.len() != self.feature_len {
                    return Err(ModelError::malformed(format!(
                        "logistic model has {} weights for {} features",
                        weights.len(),
                        self.feature_len
                    )));
                }
                if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
                    return Err(ModelError::malformed("logistic parameters must be finite"));
                }
            }
        }
        Ok(())
    }

    /// P(organic) for a feature vector
    pub fn predict_organic(&self, vector: &FeatureVector) -> Result<f64, ModelError> {
        if vector.len() != self.feature_len {
            return Err(ModelError::version_mismatch(format!(
                "artifact expects {} features, extractor produces {}",
                self.feature_len,
                vector.len()
            )));
        }

        let x: Vec<f64> = match &self.scaler {
            Some(scaler) => vector
                .as_slice()
                .iter()
                .zip(scaler.mean.iter().zip(scaler.scale.iter()))
                .map(|(v, (mean, scale))| (v - mean) / scale)
                .collect(),
            None => vector.as_slice().to_vec(),
        };

        let organic = match &self.estimator {
            Estimator::Forest { trees } => {
                if trees.is_empty() {
                    return Err(ModelError::Inference("forest has no trees".to_string()));
                }
                let total = trees
                    .iter()
                    .map(|t| t.predict(&x))
                    .sum::<Option<f64>>()
                    .ok_or_else(|| ModelError::Inference("tree traversal did not reach a leaf".to_string()))?;
                total / trees.len() as f64
            }
            Estimator::Logistic { weights, bias } => {
                let z = weights.iter().zip(x.iter()).map(|(w, v)| w * v).sum::<f64>() + bias;
                1.0 / (1.0 + (-z).exp())
            }
        };

        if !organic.is_finite() || !(0.0..=1.0).contains(&organic) {
            return Err(ModelError::Inference(format!(
                "model produced organic probability {organic}"
            )));
        }
        Ok(organic)
    }
}

fn check_format(format: &str, version: u32) -> Result<(), ModelError> {
    if format != ARTIFACT_FORMAT {
        return Err(ModelError::version_mismatch(format!(
            "unknown artifact format `{format}`, expected `{ARTIFACT_FORMAT}`"
        )));
    }
    if version != ARTIFACT_FORMAT_VERSION {
        return Err(ModelError::version_mismatch(format!(
            "artifact format version {version} is not supported (expected {ARTIFACT_FORMAT_VERSION})"
        )));
    }
    Ok(())
}

/// Classify a feature vector with a loaded artifact
pub fn classify_model(
    vector: &FeatureVector,
    artifact: Option<&ModelArtifact>,
) -> Result<ClassificationResult, ModelError> {
    let artifact = artifact.ok_or(ModelError::Unavailable)?;
    let organic = artifact.predict_organic(vector)?;
    Ok(ClassificationResult::from_model_probability(organic))
}

/// [`Classifier`] backed by a shared, read-only artifact
#[derive(Debug, Clone)]
pub struct StatisticalModelClassifier {
    artifact: Arc<ModelArtifact>,
}

impl StatisticalModelClassifier {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self { artifact }
    }
}

impl Classifier for StatisticalModelClassifier {
    fn method(&self) -> Method {
        Method::MlModel
    }

    fn classify(&self, features: &FeatureSet) -> Result<ClassificationResult, ModelError> {
        classify_model(&features.to_vector(), Some(&self.artifact))
    }

    fn expected_feature_len(&self) -> Option<usize> {
        Some(self.artifact.feature_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Material;

    fn stump(feature_len: usize, threshold: f64) -> ModelArtifact {
        ModelArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_len,
            scaler: None,
            estimator: Estimator::Forest {
                trees: vec![Tree {
                    nodes: vec![
                        Node::Split { feature: 0, threshold, left: 1, right: 2 },
                        Node::Leaf { organic: 0.1 },
                        Node::Leaf { organic: 0.9 },
                    ],
                }],
            },
        }
    }

    #[test]
    fn test_forest_prediction() {
        let artifact = stump(2, 0.5);
        let low = FeatureVector::from(vec![0.2, 0.0]);
        let high = FeatureVector::from(vec![0.8, 0.0]);
        assert_eq!(artifact.predict_organic(&low).unwrap(), 0.1);
        assert_eq!(artifact.predict_organic(&high).unwrap(), 0.9);

        let result = classify_model(&high, Some(&artifact)).unwrap();
        assert_eq!(result.material, Material::Organic);
        assert_eq!(result.method, Method::MlModel);
        assert_eq!(result.confidence, result.probabilities.organic);
    }

    #[test]
    fn test_scaler_applied() {
        let mut artifact = stump(2, 0.0);
        artifact.scaler = Some(Scaler { mean: vec![10.0, 0.0], scale: vec![2.0, 1.0] });
        // (9 - 10) / 2 = -0.5 goes left
        assert_eq!(artifact.predict_organic(&FeatureVector::from(vec![9.0, 0.0])).unwrap(), 0.1);
        assert_eq!(artifact.predict_organic(&FeatureVector::from(vec![11.0, 0.0])).unwrap(), 0.9);
    }

    #[test]
    fn test_logistic_prediction() {
        let artifact = ModelArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_len: 2,
            scaler: None,
            estimator: Estimator::Logistic { weights: vec![1.0, -1.0], bias: 0.0 },
        };
        let p = artifact.predict_organic(&FeatureVector::from(vec![1.0, 1.0])).unwrap();
        assert_eq!(p, 0.5);
        let p = artifact.predict_organic(&FeatureVector::from(vec![0.0, 4.0])).unwrap();
        assert!(p < 0.05);
    }

    #[test]
    fn test_unavailable_without_artifact() {
        let vector = FeatureVector::from(vec![0.0; 4]);
        assert!(matches!(classify_model(&vector, None), Err(ModelError::Unavailable)));
    }

    #[test]
    fn test_length_mismatch_is_version_error() {
        let artifact = stump(3, 0.5);
        let vector = FeatureVector::from(vec![0.0; 2]);
        assert!(matches!(
            classify_model(&vector, Some(&artifact)),
            Err(ModelError::VersionMismatch(_))
        ));
    }

    #[test]
    fn test_json_round_trip_shape() {
        let json = stump(2, 0.5).to_json().unwrap();
        assert!(json.contains("\"kind\": \"forest\""));
        assert!(json.contains("\"split\""));
        assert_eq!(ModelArtifact::from_json(&json).unwrap(), stump(2, 0.5));
    }

    #[test]
    fn test_unknown_version_rejected_before_body() {
        let json = r#"{"format": "wastesort.material-classifier", "format_version": 7, "layers": []}"#;
        assert!(matches!(ModelArtifact::from_json(json), Err(ModelError::VersionMismatch(_))));

        let json = r#"{"format": "sklearn-pickle", "format_version": 1}"#;
        assert!(matches!(ModelArtifact::from_json(json), Err(ModelError::VersionMismatch(_))));
    }

    #[test]
    fn test_backward_child_rejected() {
        let mut artifact = stump(2, 0.5);
        if let Estimator::Forest { trees } = &mut artifact.estimator {
            trees[0].nodes[0] = Node::Split { feature: 0, threshold: 0.5, left: 0, right: 2 };
        }
        assert!(matches!(artifact.validate(), Err(ModelError::Malformed(_))));
    }

    #[test]
    fn test_bad_leaf_and_feature_rejected() {
        let mut artifact = stump(2, 0.5);
        if let Estimator::Forest { trees } = &mut artifact.estimator {
            trees[0].nodes[2] = Node::Leaf { organic: 1.5 };
        }
        assert!(matches!(artifact.validate(), Err(ModelError::Malformed(_))));

        let mut artifact = stump(2, 0.5);
        if let Estimator::Forest { trees } = &mut artifact.estimator {
            trees[0].nodes[0] = Node::Split { feature: 5, threshold: 0.5, left: 1, right: 2 };
        }
        assert!(matches!(artifact.validate(), Err(ModelError::Malformed(_))));
    }

    #[test]
    fn test_scaler_length_checked() {
        let mut artifact = stump(2, 0.5);
        artifact.scaler = Some(Scaler { mean: vec![0.0], scale: vec![1.0, 1.0] });
        assert!(matches!(artifact.validate(), Err(ModelError::Malformed(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = ModelArtifact::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
