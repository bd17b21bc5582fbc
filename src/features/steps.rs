use crate::error::ExtractionError;
use crate::features::{color, preprocessing, shape, texture};
use crate::features::{FeatureInput, FeatureSetBuilder, FeatureStep};

/// HSV histograms and moments
pub struct ColorHistogramStep;

impl FeatureStep for ColorHistogramStep {
    fn extract(&self, input: &FeatureInput, features: &mut FeatureSetBuilder) -> Result<(), ExtractionError> {
        features.color_histogram = Some(color::histogram(&input.hsv));
        features.color_moments = Some(color::moments(&input.hsv));
        Ok(())
    }

    fn name(&self) -> &str {
        "Color Histogram"
    }
}

/// k-means dominant colors
pub struct DominantColorStep;

impl FeatureStep for DominantColorStep {
    fn extract(&self, input: &FeatureInput, features: &mut FeatureSetBuilder) -> Result<(), ExtractionError> {
        features.dominant_colors = Some(color::dominant_colors(&input.rgb));
        Ok(())
    }

    fn name(&self) -> &str {
        "Dominant Colors"
    }
}

/// Organic color bands and color diversity
pub struct ColorDistributionStep;

impl FeatureStep for ColorDistributionStep {
    fn extract(&self, input: &FeatureInput, features: &mut FeatureSetBuilder) -> Result<(), ExtractionError> {
        features.organic_color_score = Some(color::organic_color_score(&input.hsv));
        features.color_entropy = Some(color::color_entropy(&input.rgb));
        Ok(())
    }

    fn name(&self) -> &str {
        "Color Distribution"
    }
}

/// Local binary pattern texture
pub struct TextureStep;

impl FeatureStep for TextureStep {
    fn extract(&self, input: &FeatureInput, features: &mut FeatureSetBuilder) -> Result<(), ExtractionError> {
        let descriptor = texture::lbp_histogram(&input.gray)
            .ok_or(ExtractionError::MissingGroup("texture_descriptor"))?;
        features.texture_descriptor = Some(descriptor);
        Ok(())
    }

    fn name(&self) -> &str {
        "Texture"
    }
}

/// Canny edges, edge density and contour shape
pub struct EdgeShapeStep {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl FeatureStep for EdgeShapeStep {
    fn extract(&self, input: &FeatureInput, features: &mut FeatureSetBuilder) -> Result<(), ExtractionError> {
        let edges = preprocessing::detect_edges(&input.gray, self.low_threshold, self.high_threshold);
        features.edge_density = Some(shape::edge_density(&edges));
        features.contour_metrics = Some(shape::contour_metrics(&edges));
        Ok(())
    }

    fn name(&self) -> &str {
        "Edges and Shape"
    }
}
