pub mod preprocessing;
pub mod color;
pub mod texture;
pub mod shape;
pub mod steps;

use std::sync::Arc;

use image::{DynamicImage, GrayImage, RgbImage};
use serde::Serialize;
use tracing::debug;

use crate::error::ExtractionError;
use color::{ColorHistogram, ColorMoments};
use preprocessing::Hsv;
use shape::ContourMetrics;

/// Images are resized to a square of this side before analysis
pub const WORKING_SIZE: u32 = 224;
pub const HUE_BINS: usize = 18;
pub const SATURATION_BINS: usize = 8;
pub const VALUE_BINS: usize = 8;
pub const DOMINANT_COLOR_COUNT: usize = 4;
pub const TEXTURE_BINS: usize = 10;
pub const CANNY_LOW_THRESHOLD: f32 = 50.0;
pub const CANNY_HIGH_THRESHOLD: f32 = 150.0;

/// Length of [`FeatureVector`]. Trained artifacts declare the length they were trained on.
pub const FEATURE_VECTOR_LEN: usize = HUE_BINS
    + SATURATION_BINS
    + VALUE_BINS
    + 6
    + DOMINANT_COLOR_COUNT * 3
    + TEXTURE_BINS
    + 1
    + 3
    + 1
    + 1;

/// Named descriptors of one image. Every group is always present and finite.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub color_histogram: ColorHistogram,
    pub color_moments: ColorMoments,
    /// RGB triples, largest cluster first
    pub dominant_colors: [[f64; 3]; DOMINANT_COLOR_COUNT],
    pub texture_descriptor: [f64; TEXTURE_BINS],
    pub edge_density: f64,
    pub contour_metrics: ContourMetrics,
    pub organic_color_score: f64,
    /// Bits
    pub color_entropy: f64,
}

impl FeatureSet {
    /// Flatten into the order the statistical model was trained on:
    ///
    /// | range  | group                                      |
    /// |--------|--------------------------------------------|
    /// | 0..18  | hue histogram                              |
    /// | 18..26 | saturation histogram                       |
    /// | 26..34 | value histogram                            |
    /// | 34..40 | hue/saturation/value mean and std          |
    /// | 40..52 | dominant colors, (r, g, b) x 4             |
    /// | 52..62 | texture descriptor                         |
    /// | 62     | edge density                               |
    /// | 63..66 | circularity, solidity, contour count       |
    /// | 66     | organic color score                        |
    /// | 67     | color entropy                              |
    pub fn to_vector(&self) -> FeatureVector {
        let mut values = Vec::with_capacity(FEATURE_VECTOR_LEN);
        values.extend_from_slice(&self.color_histogram.hue);
        values.extend_from_slice(&self.color_histogram.saturation);
        values.extend_from_slice(&self.color_histogram.value);

        let m = &self.color_moments;
        values.extend_from_slice(&[
            m.hue_mean,
            m.hue_std,
            m.saturation_mean,
            m.saturation_std,
            m.value_mean,
            m.value_std,
        ]);

        for color in &self.dominant_colors {
            values.extend_from_slice(color);
        }
        values.extend_from_slice(&self.texture_descriptor);
        values.push(self.edge_density);
        values.push(self.contour_metrics.circularity);
        values.push(self.contour_metrics.solidity);
        values.push(self.contour_metrics.contour_count as f64);
        values.push(self.organic_color_score);
        values.push(self.color_entropy);

        debug_assert_eq!(values.len(), FEATURE_VECTOR_LEN);
        FeatureVector(values)
    }
}

/// Flattened, order-sensitive form of a [`FeatureSet`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Representations shared by all feature steps, computed once per image
pub struct FeatureInput {
    pub rgb: RgbImage,
    pub hsv: Vec<Hsv>,
    pub gray: GrayImage,
}

impl FeatureInput {
    pub fn prepare(image: &RgbImage) -> Result<Self, ExtractionError> {
        preprocessing::ensure_not_empty(image)?;
        let rgb = preprocessing::resize(image, WORKING_SIZE);
        let hsv = preprocessing::to_hsv(&rgb);
        let gray = preprocessing::to_grayscale(&rgb);
        Ok(Self { rgb, hsv, gray })
    }
}

/// Feature groups collected while steps run
#[derive(Debug, Default)]
pub struct FeatureSetBuilder {
    pub color_histogram: Option<ColorHistogram>,
    pub color_moments: Option<ColorMoments>,
    pub dominant_colors: Option<[[f64; 3]; DOMINANT_COLOR_COUNT]>,
    pub texture_descriptor: Option<[f64; TEXTURE_BINS]>,
    pub edge_density: Option<f64>,
    pub contour_metrics: Option<ContourMetrics>,
    pub organic_color_score: Option<f64>,
    pub color_entropy: Option<f64>,
}

impl FeatureSetBuilder {
    /// Assemble the final set, failing if any group is missing or non-finite
    pub fn build(self) -> Result<FeatureSet, ExtractionError> {
        let color_histogram = require(self.color_histogram, "color_histogram")?;
        check_finite(
            "color_histogram",
            color_histogram
                .hue
                .iter()
                .chain(color_histogram.saturation.iter())
                .chain(color_histogram.value.iter()),
        )?;

        let color_moments = require(self.color_moments, "color_moments")?;
        check_finite(
            "color_moments",
            [
                color_moments.hue_mean,
                color_moments.hue_std,
                color_moments.saturation_mean,
                color_moments.saturation_std,
                color_moments.value_mean,
                color_moments.value_std,
            ]
            .iter(),
        )?;

        let dominant_colors = require(self.dominant_colors, "dominant_colors")?;
        check_finite("dominant_colors", dominant_colors.iter().flatten())?;

        let texture_descriptor = require(self.texture_descriptor, "texture_descriptor")?;
        check_finite("texture_descriptor", texture_descriptor.iter())?;

        let edge_density = require(self.edge_density, "edge_density")?;
        check_finite("edge_density", [edge_density].iter())?;

        let contour_metrics = require(self.contour_metrics, "contour_metrics")?;
        check_finite(
            "contour_metrics",
            [contour_metrics.circularity, contour_metrics.solidity].iter(),
        )?;

        let organic_color_score = require(self.organic_color_score, "organic_color_score")?;
        check_finite("organic_color_score", [organic_color_score].iter())?;

        let color_entropy = require(self.color_entropy, "color_entropy")?;
        check_finite("color_entropy", [color_entropy].iter())?;

        Ok(FeatureSet {
            color_histogram,
            color_moments,
            dominant_colors,
            texture_descriptor,
            edge_density,
            contour_metrics,
            organic_color_score,
            color_entropy,
        })
    }
}

fn require<T>(group: Option<T>, name: &'static str) -> Result<T, ExtractionError> {
    group.ok_or(ExtractionError::MissingGroup(name))
}

fn check_finite<'a>(
    name: &'static str,
    mut values: impl Iterator<Item = &'a f64>,
) -> Result<(), ExtractionError> {
    if values.all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ExtractionError::NonFinite(name))
    }
}

/// Trait that all feature steps must implement
pub trait FeatureStep: Send + Sync {
    /// Compute one or more feature groups from the prepared input
    fn extract(
        &self,
        input: &FeatureInput,
        features: &mut FeatureSetBuilder,
    ) -> Result<(), ExtractionError>;

    /// Human-readable name for this step (used in logs)
    fn name(&self) -> &str;
}

/// Runs an ordered list of feature steps over an image
#[derive(Clone)]
pub struct FeatureExtractor {
    steps: Vec<Arc<dyn FeatureStep>>,
}

impl FeatureExtractor {
    /// The standard extractor producing every group of a [`FeatureSet`]
    pub fn new() -> Self {
        use steps::*;

        Self::empty()
            .add_step(Arc::new(ColorHistogramStep))
            .add_step(Arc::new(DominantColorStep))
            .add_step(Arc::new(ColorDistributionStep))
            .add_step(Arc::new(TextureStep))
            .add_step(Arc::new(EdgeShapeStep {
                low_threshold: CANNY_LOW_THRESHOLD,
                high_threshold: CANNY_HIGH_THRESHOLD,
            }))
    }

    /// An extractor with no steps; [`FeatureExtractor::extract`] fails until every group is covered
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step(mut self, step: Arc<dyn FeatureStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn extract(&self, image: &RgbImage) -> Result<FeatureSet, ExtractionError> {
        let input = FeatureInput::prepare(image)?;
        let mut builder = FeatureSetBuilder::default();

        for step in &self.steps {
            debug!(step = step.name(), "running feature step");
            step.extract(&input, &mut builder)?;
        }

        let features = builder.build()?;
        debug!(
            organic_color_score = features.organic_color_score,
            color_entropy = features.color_entropy,
            edge_density = features.edge_density,
            "features extracted"
        );
        Ok(features)
    }

    /// Convenience for callers holding a decoded image of any pixel format
    pub fn extract_dynamic(&self, image: &DynamicImage) -> Result<FeatureSet, ExtractionError> {
        self.extract(&image.to_rgb8())
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample_image() -> RgbImage {
        RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, ((x + y) * 2) as u8]))
    }

    #[test]
    fn test_vector_has_documented_length() {
        assert_eq!(FEATURE_VECTOR_LEN, 68);
        let features = FeatureExtractor::new().extract(&sample_image()).unwrap();
        assert_eq!(features.to_vector().len(), FEATURE_VECTOR_LEN);
    }

    #[test]
    fn test_vector_order() {
        let features = FeatureExtractor::new().extract(&sample_image()).unwrap();
        let vector = features.to_vector();
        let v = vector.as_slice();
        assert_eq!(v[0..18], features.color_histogram.hue);
        assert_eq!(v[18..26], features.color_histogram.saturation);
        assert_eq!(v[26..34], features.color_histogram.value);
        assert_eq!(v[34], features.color_moments.hue_mean);
        assert_eq!(v[35], features.color_moments.hue_std);
        assert_eq!(v[39], features.color_moments.value_std);
        assert_eq!(v[40..43], features.dominant_colors[0]);
        assert_eq!(v[49..52], features.dominant_colors[3]);
        assert_eq!(v[52..62], features.texture_descriptor);
        assert_eq!(v[62], features.edge_density);
        assert_eq!(v[63], features.contour_metrics.circularity);
        assert_eq!(v[64], features.contour_metrics.solidity);
        assert_eq!(v[65], features.contour_metrics.contour_count as f64);
        assert_eq!(v[66], features.organic_color_score);
        assert_eq!(v[67], features.color_entropy);
    }

    #[test]
    fn test_standard_step_order() {
        assert_eq!(
            FeatureExtractor::new().step_names(),
            ["Color Histogram", "Dominant Colors", "Color Distribution", "Texture", "Edges and Shape"]
        );
        assert!(FeatureExtractor::empty().step_names().is_empty());
    }

    #[test]
    fn test_dynamic_image_matches_rgb() {
        let rgb = sample_image();
        let rgba = DynamicImage::ImageRgb8(rgb.clone()).to_rgba8();
        let extractor = FeatureExtractor::new();
        assert_eq!(
            extractor.extract_dynamic(&DynamicImage::ImageRgba8(rgba)).unwrap(),
            extractor.extract(&rgb).unwrap()
        );
    }

    #[test]
    fn test_empty_image_fails() {
        let result = FeatureExtractor::new().extract(&RgbImage::new(0, 10));
        assert!(matches!(result, Err(ExtractionError::EmptyImage { width: 0, height: 10 })));
    }

    #[test]
    fn test_missing_group_fails() {
        let extractor = FeatureExtractor::empty().add_step(Arc::new(steps::TextureStep));
        let result = extractor.extract(&sample_image());
        assert!(matches!(result, Err(ExtractionError::MissingGroup("color_histogram"))));
    }

    #[test]
    fn test_non_finite_group_fails() {
        let mut builder = FeatureSetBuilder::default();
        let input = FeatureInput::prepare(&sample_image()).unwrap();
        for step in FeatureExtractor::new().steps.iter() {
            step.extract(&input, &mut builder).unwrap();
        }
        builder.color_entropy = Some(f64::NAN);
        assert!(matches!(builder.build(), Err(ExtractionError::NonFinite("color_entropy"))));
    }

    #[test]
    fn test_one_pixel_image_is_usable() {
        let img = RgbImage::from_pixel(1, 1, Rgb([10, 120, 30]));
        assert!(FeatureExtractor::new().extract(&img).is_ok());
    }
}
