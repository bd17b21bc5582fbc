use image::{Rgb, RgbImage};
use std::io::Write;
use tempfile::NamedTempFile;
use wastesort::classify::model::{ARTIFACT_FORMAT, ARTIFACT_FORMAT_VERSION};
use wastesort::FEATURE_VECTOR_LEN;

/// Index of the organic color score in the feature vector
pub const ORGANIC_COLOR_SCORE_INDEX: usize = 66;

/// Side length of generated test images (matches the extractor's working size)
pub const TEST_IMAGE_SIZE: u32 = 224;

/// Small deterministic generator so fixtures never change between runs
struct Lcg(u32);

impl Lcg {
    fn next_offset(&mut self, amplitude: i32) -> i32 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((self.0 >> 16) % (2 * amplitude as u32 + 1)) as i32 - amplitude
    }
}

fn jitter(base: u8, offset: i32) -> u8 {
    (base as i32 + offset).clamp(0, 255) as u8
}

/// Blotchy greens and browns of near-equal brightness with fine low-contrast grain,
/// like a pile of leaves or peel: organic colors, soft edges, varied texture.
pub fn create_organic_image() -> RgbImage {
    const PALETTE: [[u8; 3]; 3] = [[70, 130, 45], [140, 90, 40], [105, 112, 48]];
    let mut rng = Lcg(42);
    RgbImage::from_fn(TEST_IMAGE_SIZE, TEST_IMAGE_SIZE, |x, y| {
        let cell = ((x / 16) * 7 + (y / 16) * 13) as usize % PALETTE.len();
        let base = PALETTE[cell];
        Rgb([
            jitter(base[0], rng.next_offset(10)),
            jitter(base[1], rng.next_offset(10)),
            jitter(base[2], rng.next_offset(10)),
        ])
    })
}

/// Flat gray, like a plastic or metal surface
pub fn create_gray_image() -> RgbImage {
    RgbImage::from_pixel(TEST_IMAGE_SIZE, TEST_IMAGE_SIZE, Rgb([128, 128, 128]))
}

/// A darker gray item on a lighter gray background
pub fn create_gray_object_image() -> RgbImage {
    RgbImage::from_fn(TEST_IMAGE_SIZE, TEST_IMAGE_SIZE, |x, y| {
        if (60..164).contains(&x) && (60..164).contains(&y) {
            Rgb([150, 150, 150])
        } else {
            Rgb([170, 170, 170])
        }
    })
}

/// Forest with one stump on the organic color score:
/// P(organic) = 0.95 above 0.5, 0.05 otherwise.
pub fn stump_artifact_json(feature_len: usize) -> String {
    serde_json::json!({
        "format": ARTIFACT_FORMAT,
        "format_version": ARTIFACT_FORMAT_VERSION,
        "feature_len": feature_len,
        "estimator": {
            "kind": "forest",
            "trees": [{
                "nodes": [
                    {"split": {"feature": ORGANIC_COLOR_SCORE_INDEX.min(feature_len - 1), "threshold": 0.5, "left": 1, "right": 2}},
                    {"leaf": {"organic": 0.05}},
                    {"leaf": {"organic": 0.95}}
                ]
            }]
        }
    })
    .to_string()
}

pub fn matching_artifact_json() -> String {
    stump_artifact_json(FEATURE_VECTOR_LEN)
}

/// Writes contents to a temp file that lives as long as the returned handle
pub fn write_temp_file(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp file");
    file
}

pub fn write_artifact(contents: &str) -> NamedTempFile {
    write_temp_file(contents, ".json")
}
