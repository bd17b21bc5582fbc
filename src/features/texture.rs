//! Local binary pattern texture descriptor.
//!
//! Each interior pixel is compared against its 8 neighbours at radius 1. The resulting code is
//! folded into rotation-invariant uniform classes: patterns with at most two 0/1 transitions
//! map to their count of set bits (0..=8), everything else lands in the last bin. Smooth
//! manufactured surfaces concentrate in a single class; organic surfaces spread out.

use image::GrayImage;
use imageproc::local_binary_patterns::{count_transitions, local_binary_pattern};

use super::TEXTURE_BINS;

const NON_UNIFORM_BIN: usize = TEXTURE_BINS - 1;

/// Rotation-invariant uniform class of an 8-bit pattern
pub fn uniform_class(code: u8) -> usize {
    if count_transitions(code) <= 2 {
        code.count_ones() as usize
    } else {
        NON_UNIFORM_BIN
    }
}

/// Normalized histogram of uniform LBP classes over the interior of the image.
///
/// Returns `None` when the image is too small to have an interior.
pub fn lbp_histogram(gray: &GrayImage) -> Option<[f64; TEXTURE_BINS]> {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return None;
    }

    let mut hist = [0.0; TEXTURE_BINS];
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            // imageproc sets a bit for each darker neighbour; count neighbours at least as bright
            if let Some(code) = local_binary_pattern(gray, x, y) {
                hist[uniform_class(!code)] += 1.0;
            }
        }
    }

    let total = ((width - 2) * (height - 2)) as f64;
    for v in hist.iter_mut() {
        *v /= total;
    }
    Some(hist)
}

/// Irregularity of a normalized descriptor in [0, 1].
///
/// A one-hot histogram has the largest possible variance, `(n - 1) / n^2`, and scores 0;
/// a perfectly flat histogram scores 1.
pub fn irregularity(descriptor: &[f64]) -> f64 {
    let n = descriptor.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let mean = descriptor.iter().sum::<f64>() / n_f;
    let variance = descriptor.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n_f;
    let max_variance = (n_f - 1.0) / (n_f * n_f);
    (1.0 - variance / max_variance).clamp(0.0, 1.0)
}
