//! SegFormer preprocessing command-line tool
//!
//! Loads images (and optionally their segmentation maps), runs them through the
//! feature extractor and reports the shapes and value ranges of the produced
//! batch.
//!
//! # Usage
//!
//! ```bash
//! segformer-preprocess [OPTIONS] <IMAGES>...
//! ```
//!
//! # Arguments
//!
//! * `-c, --config` - Feature extractor configuration (`.json` or `.toml`)
//! * `-l, --labels` - Segmentation maps, one per image, in the same order
//! * `--seed` - Seed for the random crop offsets
//! * `--print-config` - Print the effective configuration as JSON
//! * `<IMAGES>...` - Paths to input images
//!
//! # Example
//!
//! ```bash
//! RUST_LOG=info segformer-preprocess \
//!     -c preprocessor_config.json \
//!     -l labels/0001.png -l labels/0002.png \
//!     images/0001.jpg images/0002.jpg
//! ```

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use segformer_preprocess::core::IGNORE_LABEL;
use segformer_preprocess::prelude::*;
use segformer_preprocess::utils::init_tracing;
use tracing::{error, info};

/// Command-line arguments for the preprocessing tool
#[derive(Parser)]
#[command(name = "segformer-preprocess")]
#[command(about = "Preprocess images and segmentation maps for SegFormer-style models")]
struct Args {
    /// Feature extractor configuration file (.json or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Segmentation maps paired with the images, in the same order
    #[arg(short, long)]
    labels: Vec<PathBuf>,

    /// Seed for random cropping; uses the thread RNG when absent
    #[arg(long)]
    seed: Option<u64>,

    /// Print the effective configuration as JSON before processing
    #[arg(long)]
    print_config: bool,

    /// Paths to input images to process
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            FeatureExtractorConfig::from_path(path)?
        }
        None => FeatureExtractorConfig::default(),
    };

    if args.print_config {
        println!("{}", config.to_json_string()?);
    }

    if !args.labels.is_empty() && args.labels.len() != args.images.len() {
        error!(
            "Got {} images but {} segmentation maps",
            args.images.len(),
            args.labels.len()
        );
        return Err("every image needs exactly one segmentation map".into());
    }

    let extractor = SegformerFeatureExtractor::new(config)?;

    let mut images = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let image = load_image(path)?;
        info!(
            "Loaded image: {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        images.push(ImageInput::from(image));
    }

    let maps = if args.labels.is_empty() {
        None
    } else {
        let mut maps = Vec::with_capacity(args.labels.len());
        for path in &args.labels {
            maps.push(SegmentationMapInput::from(load_segmentation_map(path)?));
        }
        Some(SegmentationMaps::from(maps))
    };

    let start = Instant::now();
    let batch = match args.seed {
        Some(seed) => {
            extractor.preprocess_with_rng(images, maps, &mut StdRng::seed_from_u64(seed))?
        }
        None => extractor.preprocess(images, maps)?,
    };
    let elapsed = start.elapsed();

    info!(
        "Preprocessed {} images in {:.2}ms",
        batch.batch_size(),
        elapsed.as_secs_f64() * 1000.0
    );

    let (min, max) = batch
        .pixel_values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let mean = batch.pixel_values.mean().unwrap_or(0.0);
    info!(
        "pixel_values: shape {:?}, min {:.4}, max {:.4}, mean {:.4}",
        batch.pixel_values.shape(),
        min,
        max,
        mean
    );

    if let Some(labels) = &batch.labels {
        let padding = extractor.config().segmentation_padding_value;
        let ignored = labels
            .iter()
            .filter(|&&v| v == padding || v == IGNORE_LABEL)
            .count();
        info!(
            "labels: shape {:?}, {} ignored pixels",
            labels.shape(),
            ignored
        );
    }

    Ok(())
}
