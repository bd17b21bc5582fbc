use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Material {
    Organic,
    NonOrganic,
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Material::Organic => write!(f, "ORGANIC"),
            Material::NonOrganic => write!(f, "NON_ORGANIC"),
        }
    }
}

/// Which classifier produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    MlModel,
    RuleBased,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::MlModel => write!(f, "ml_model"),
            Method::RuleBased => write!(f, "rule_based"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    pub organic: f64,
    pub non_organic: f64,
}

impl Probabilities {
    /// Build the pair from P(organic); the complement is derived so the pair always sums to 1
    pub fn from_organic(organic: f64) -> Self {
        let organic = organic.clamp(0.0, 1.0);
        Self {
            organic,
            non_organic: 1.0 - organic,
        }
    }

    pub fn of(&self, material: Material) -> f64 {
        match material {
            Material::Organic => self.organic,
            Material::NonOrganic => self.non_organic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub material: Material,
    pub confidence: f64,
    pub method: Method,
    pub probabilities: Probabilities,
}

impl ClassificationResult {
    /// Result of the statistical model: argmax class, confidence is that class's probability.
    /// An exact tie resolves toward `Organic`.
    pub fn from_model_probability(organic: f64) -> Self {
        let probabilities = Probabilities::from_organic(organic);
        let material = if probabilities.organic >= probabilities.non_organic {
            Material::Organic
        } else {
            Material::NonOrganic
        };
        Self {
            material,
            confidence: probabilities.of(material),
            method: Method::MlModel,
            probabilities,
        }
    }

    /// Result of the rule-based path: thresholded at `threshold`, confidence is the
    /// rescaled distance of the likelihood from it.
    pub fn from_rule_likelihood(likelihood: f64, threshold: f64) -> Self {
        let probabilities = Probabilities::from_organic(likelihood);
        let material = if probabilities.organic >= threshold {
            Material::Organic
        } else {
            Material::NonOrganic
        };
        let confidence = ((probabilities.organic - threshold).abs() * 2.0).min(1.0);
        Self {
            material,
            confidence,
            method: Method::RuleBased,
            probabilities,
        }
    }

    pub fn is_organic(&self) -> bool {
        self.material == Material::Organic
    }
}
