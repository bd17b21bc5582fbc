use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning an image into a `FeatureSet`.
///
/// These are the only errors a classification request surfaces to its caller.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("buffer does not match a {width}x{height} RGB layout: expected {expected} bytes, got {actual}")]
    ChannelLayout {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("feature group `{0}` was not produced")]
    MissingGroup(&'static str),

    #[error("feature group `{0}` contains a non-finite value")]
    NonFinite(&'static str),
}

/// Errors from the statistical model path.
///
/// `Unavailable`, `VersionMismatch` and `Inference` are recovered by the façade.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no model artifact is loaded")]
    Unavailable,

    #[error("model artifact is incompatible: {0}")]
    VersionMismatch(String),

    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("malformed model artifact: {0}")]
    Malformed(String),

    #[error("model inference failed: {0}")]
    Inference(String),
}

impl ModelError {
    pub fn version_mismatch(details: impl Into<String>) -> Self {
        Self::VersionMismatch(details.into())
    }

    pub fn malformed(details: impl Into<String>) -> Self {
        Self::Malformed(details.into())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid rule configuration: {0}")]
    InvalidRules(String),

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
