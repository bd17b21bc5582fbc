//! Color analysis: HSV histograms, moments, dominant colors, organic color bands and entropy.

use image::RgbImage;

use super::preprocessing::Hsv;
use super::{DOMINANT_COLOR_COUNT, HUE_BINS, SATURATION_BINS, VALUE_BINS};

/// Upper bound on pixels fed into k-means
const MAX_CLUSTER_SAMPLES: usize = 4096;
const MAX_CLUSTER_ITERATIONS: usize = 10;
/// Levels per channel for the entropy histogram (8 x 8 x 8 colors)
const ENTROPY_LEVELS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct ColorHistogram {
    pub hue: [f64; HUE_BINS],
    pub saturation: [f64; SATURATION_BINS],
    pub value: [f64; VALUE_BINS],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMoments {
    pub hue_mean: f64,
    pub hue_std: f64,
    pub saturation_mean: f64,
    pub saturation_std: f64,
    pub value_mean: f64,
    pub value_std: f64,
}

/// Normalized hue/saturation/value histograms
pub fn histogram(hsv: &[Hsv]) -> ColorHistogram {
    let mut hist = ColorHistogram {
        hue: [0.0; HUE_BINS],
        saturation: [0.0; SATURATION_BINS],
        value: [0.0; VALUE_BINS],
    };
    if hsv.is_empty() {
        return hist;
    }

    for p in hsv {
        hist.hue[bin(p.h, 180.0, HUE_BINS)] += 1.0;
        hist.saturation[bin(p.s, 256.0, SATURATION_BINS)] += 1.0;
        hist.value[bin(p.v, 256.0, VALUE_BINS)] += 1.0;
    }

    let total = hsv.len() as f64;
    for v in hist
        .hue
        .iter_mut()
        .chain(hist.saturation.iter_mut())
        .chain(hist.value.iter_mut())
    {
        *v /= total;
    }
    hist
}

fn bin(value: f64, range: f64, bins: usize) -> usize {
    ((value / range * bins as f64) as usize).min(bins - 1)
}

pub fn moments(hsv: &[Hsv]) -> ColorMoments {
    let (hue_mean, hue_std) = mean_std(hsv.iter().map(|p| p.h));
    let (saturation_mean, saturation_std) = mean_std(hsv.iter().map(|p| p.s));
    let (value_mean, value_std) = mean_std(hsv.iter().map(|p| p.v));
    ColorMoments {
        hue_mean,
        hue_std,
        saturation_mean,
        saturation_std,
        value_mean,
        value_std,
    }
}

fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let count = values.clone().count();
    if count == 0 {
        return (0.0, 0.0);
    }
    let n = count as f64;
    let mean = values.clone().sum::<f64>() / n;
    let variance = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Dominant colors by k-means over strided samples, largest cluster first.
///
/// Centroids are seeded at luminance quantiles so the result is fully deterministic.
pub fn dominant_colors(img: &RgbImage) -> [[f64; 3]; DOMINANT_COLOR_COUNT] {
    let pixel_count = img.width() as usize * img.height() as usize;
    let stride = (pixel_count / MAX_CLUSTER_SAMPLES).max(1);
    let mut samples: Vec<[f64; 3]> = img
        .pixels()
        .step_by(stride)
        .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
        .collect();

    if samples.is_empty() {
        return [[0.0; 3]; DOMINANT_COLOR_COUNT];
    }

    samples.sort_by(|a, b| {
        luminance(a)
            .total_cmp(&luminance(b))
            .then_with(|| a[0].total_cmp(&b[0]))
            .then_with(|| a[1].total_cmp(&b[1]))
            .then_with(|| a[2].total_cmp(&b[2]))
    });

    let mut centroids = [[0.0; 3]; DOMINANT_COLOR_COUNT];
    for (i, centroid) in centroids.iter_mut().enumerate() {
        let q = (i as f64 + 0.5) / DOMINANT_COLOR_COUNT as f64;
        let idx = ((q * samples.len() as f64) as usize).min(samples.len() - 1);
        *centroid = samples[idx];
    }

    let mut assignment = vec![usize::MAX; samples.len()];
    let mut counts = [0usize; DOMINANT_COLOR_COUNT];

    for _ in 0..MAX_CLUSTER_ITERATIONS {
        let mut changed = false;
        for (sample, slot) in samples.iter().zip(assignment.iter_mut()) {
            let nearest = nearest_centroid(sample, &centroids);
            if *slot != nearest {
                *slot = nearest;
                changed = true;
            }
        }

        let mut sums = [[0.0; 3]; DOMINANT_COLOR_COUNT];
        counts = [0; DOMINANT_COLOR_COUNT];
        for (sample, &cluster) in samples.iter().zip(assignment.iter()) {
            for c in 0..3 {
                sums[cluster][c] += sample[c];
            }
            counts[cluster] += 1;
        }
        for k in 0..DOMINANT_COLOR_COUNT {
            // An empty cluster keeps its previous centroid
            if counts[k] > 0 {
                for c in 0..3 {
                    centroids[k][c] = sums[k][c] / counts[k] as f64;
                }
            }
        }

        if !changed {
            break;
        }
    }

    let mut order: Vec<usize> = (0..DOMINANT_COLOR_COUNT).collect();
    order.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));

    let mut ordered = [[0.0; 3]; DOMINANT_COLOR_COUNT];
    for (slot, &k) in ordered.iter_mut().zip(order.iter()) {
        *slot = centroids[k];
    }
    ordered
}

fn luminance(c: &[f64; 3]) -> f64 {
    0.299 * c[0] + 0.587 * c[1] + 0.114 * c[2]
}

fn nearest_centroid(sample: &[f64; 3], centroids: &[[f64; 3]; DOMINANT_COLOR_COUNT]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (k, centroid) in centroids.iter().enumerate() {
        let dist: f64 = (0..3).map(|c| (sample[c] - centroid[c]).powi(2)).sum();
        if dist < best_dist {
            best_dist = dist;
            best = k;
        }
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorBand {
    /// Greens, yellows, browns
    Organic,
    /// Blues, purples, grays, whites, metallics
    Synthetic,
    Neutral,
}

pub fn color_band(p: &Hsv) -> ColorBand {
    let chromatic = p.s >= 50.0 && p.v >= 40.0;

    if chromatic && (5.0..=90.0).contains(&p.h) {
        return ColorBand::Organic;
    }
    // Dark browns are only weakly saturated
    if p.s >= 30.0 && (20.0..100.0).contains(&p.v) && p.h <= 30.0 {
        return ColorBand::Organic;
    }
    if chromatic && p.h > 90.0 && p.h <= 150.0 {
        return ColorBand::Synthetic;
    }
    if p.s < 30.0 && p.v >= 40.0 {
        return ColorBand::Synthetic;
    }
    ColorBand::Neutral
}

/// Balance of organic against synthetic color bands, mapped into [0, 1].
/// An image with neither (or equal amounts of both) scores 0.5.
pub fn organic_color_score(hsv: &[Hsv]) -> f64 {
    if hsv.is_empty() {
        return 0.5;
    }

    let mut organic = 0usize;
    let mut synthetic = 0usize;
    for p in hsv {
        match color_band(p) {
            ColorBand::Organic => organic += 1,
            ColorBand::Synthetic => synthetic += 1,
            ColorBand::Neutral => {}
        }
    }

    let total = hsv.len() as f64;
    let balance = (organic as f64 - synthetic as f64) / total;
    ((balance + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Shannon entropy in bits of the quantized RGB histogram
pub fn color_entropy(img: &RgbImage) -> f64 {
    let step = 256 / ENTROPY_LEVELS;
    let mut counts = vec![0usize; ENTROPY_LEVELS * ENTROPY_LEVELS * ENTROPY_LEVELS];
    for p in img.pixels() {
        let r = p[0] as usize / step;
        let g = p[1] as usize / step;
        let b = p[2] as usize / step;
        counts[(r * ENTROPY_LEVELS + g) * ENTROPY_LEVELS + b] += 1;
    }

    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    // Accumulate p * log2(1 / p) from +0.0 so a single-bin image reports 0.0, not -0.0
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| c as f64 / total)
        .fold(0.0, |entropy, p| entropy + p * (1.0 / p).log2())
}
