use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use palette::{IntoColor, Srgb, encoding};

use crate::error::ExtractionError;

/// A pixel in OpenCV-style HSV: hue in [0, 180), saturation and value in [0, 255]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

/// Reject images with no pixels
pub fn ensure_not_empty(img: &RgbImage) -> Result<(), ExtractionError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ExtractionError::EmptyImage { width, height });
    }
    Ok(())
}

/// Wrap raw interleaved RGB bytes, verifying they match the declared dimensions
pub fn rgb_from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Result<RgbImage, ExtractionError> {
    if width == 0 || height == 0 {
        return Err(ExtractionError::EmptyImage { width, height });
    }

    let expected = width as usize * height as usize * 3;
    let actual = bytes.len();
    if actual != expected {
        return Err(ExtractionError::ChannelLayout { width, height, expected, actual });
    }

    RgbImage::from_raw(width, height, bytes)
        .ok_or(ExtractionError::ChannelLayout { width, height, expected, actual })
}

/// Decode encoded image bytes (PNG, JPEG, ...) into an RGB raster
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, ExtractionError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = decoded.to_rgb8();
    ensure_not_empty(&rgb)?;
    Ok(rgb)
}

/// Resize to a square working resolution
pub fn resize(img: &RgbImage, size: u32) -> RgbImage {
    if img.dimensions() == (size, size) {
        return img.clone();
    }
    imageops::resize(img, size, size, FilterType::Triangle)
}

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    imageops::grayscale(img)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Convert one pixel, rescaling palette's unit HSV to the OpenCV ranges
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let hsv: palette::Hsv<encoding::Srgb, f64> = Srgb::new(r, g, b).into_format::<f64>().into_color();
    Hsv {
        h: (hsv.hue.into_positive_degrees() / 2.0) % 180.0,
        s: hsv.saturation * 255.0,
        // Value is the largest channel, so it maps back to a whole number
        v: (hsv.value * 255.0).round(),
    }
}

/// Convert every pixel to HSV, row-major
pub fn to_hsv(img: &RgbImage) -> Vec<Hsv> {
    img.pixels().map(|p| rgb_to_hsv(p[0], p[1], p[2])).collect()
}
