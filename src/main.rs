use clap::Parser;
use futures::stream::{self, Stream, StreamExt};
use image::ImageReader;
use serde::Serialize;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use wastesort::{ClassificationResult, EngineConfig, FeatureVector, MaterialClassifier};

#[derive(Parser)]
#[command(name = "wastesort")]
#[command(about = "Classify waste item images as organic or non-organic")]
struct Cli {
    /// Paths to input image files
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// Trained model artifact (rule-based classification when omitted)
    #[arg(long, value_name = "FILE", env = "MODEL_PATH")]
    model: Option<PathBuf>,

    /// TOML engine configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print one JSON object per image
    #[arg(long)]
    json: bool,

    /// Include the extracted feature vector in the output
    #[arg(long)]
    features: bool,

    /// Maximum number of images decoded and classified at once
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Report {
    image: PathBuf,
    #[serde(flatten)]
    result: ClassificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<FeatureVector>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn classify_file(
    classifier: &MaterialClassifier,
    path: PathBuf,
    with_features: bool,
) -> anyhow::Result<Report> {
    let img = ImageReader::open(&path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image {}: {}", path.display(), e))?;
    debug!(image = %path.display(), width = img.width(), height = img.height(), "image loaded");

    let rgb = img.to_rgb8();
    let features = classifier.extractor().extract(&rgb)?;
    let result = classifier.classify_features(&features);

    Ok(Report {
        image: path,
        result,
        features: with_features.then(|| features.to_vector()),
    })
}

fn print_report(report: &Report, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    let r = &report.result;
    println!(
        "{}: {} (confidence {:.2}, method {}, organic {:.3} / non-organic {:.3})",
        report.image.display(),
        r.material,
        r.confidence,
        r.method,
        r.probabilities.organic,
        r.probabilities.non_organic
    );
    if let Some(features) = &report.features {
        let values: Vec<String> = features.as_slice().iter().map(|v| format!("{v:.4}")).collect();
        println!("  features: [{}]", values.join(", "));
    }
    Ok(())
}

fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Classify images on the blocking pool, at most `jobs` at a time, yielding reports in input order
fn classify_all(
    classifier: Arc<MaterialClassifier>,
    images: Vec<PathBuf>,
    with_features: bool,
    jobs: usize,
) -> impl Stream<Item = (PathBuf, anyhow::Result<Report>)> {
    stream::iter(images)
        .map(move |path| {
            let classifier = Arc::clone(&classifier);
            async move {
                // Decoding and extraction are CPU-bound; keep them off the async workers
                let task_path = path.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    classify_file(&classifier, task_path, with_features)
                })
                .await
                .map_err(anyhow::Error::from)
                .and_then(|report| report);
                (path, outcome)
            }
        })
        .buffered(jobs.max(1))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    }
    .with_model_path(args.model.clone());

    let classifier = Arc::new(MaterialClassifier::from_config(&config)?);

    let jobs = args.jobs.unwrap_or_else(default_jobs);
    let total = args.images.len();
    let mut reports = pin!(classify_all(classifier, args.images, args.features, jobs));

    let mut failures = 0usize;
    while let Some((path, outcome)) = reports.next().await {
        match outcome {
            Ok(report) => print_report(&report, args.json)?,
            Err(e) => {
                error!(image = %path.display(), error = %e, "classification failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} images could not be classified", failures, total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_images(dir: &std::path::Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("item-{i}.png"));
                let shade = (i * 40) as u8;
                RgbImage::from_pixel(16, 16, Rgb([shade, 120, 60])).save(&path).unwrap();
                path
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reports_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut images = write_images(dir.path(), 5);
        images.insert(2, dir.path().join("missing.png"));

        let classifier = Arc::new(MaterialClassifier::default());
        let results: Vec<_> =
            classify_all(Arc::clone(&classifier), images.clone(), false, 2).collect().await;

        assert_eq!(results.len(), images.len());
        for ((path, outcome), expected) in results.iter().zip(&images) {
            assert_eq!(path, expected);
            if path.ends_with("missing.png") {
                assert!(outcome.is_err());
            } else {
                let report = outcome.as_ref().unwrap();
                assert_eq!(&report.image, expected);
                assert!(report.features.is_none());
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_job_matches_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let images = write_images(dir.path(), 4);
        let classifier = Arc::new(MaterialClassifier::default());

        let serial: Vec<_> = classify_all(Arc::clone(&classifier), images.clone(), true, 1)
            .map(|(_, outcome)| outcome.unwrap())
            .collect()
            .await;
        let parallel: Vec<_> = classify_all(classifier, images, true, 3)
            .map(|(_, outcome)| outcome.unwrap())
            .collect()
            .await;

        for (a, b) in serial.iter().zip(&parallel) {
            assert_eq!(a.result, b.result);
            assert_eq!(a.features, b.features);
        }
        assert_eq!(serial.len(), 4);
    }
}
