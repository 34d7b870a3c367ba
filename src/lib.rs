//! # SegFormer Preprocess
//!
//! Image and segmentation map preprocessing for SegFormer-style semantic
//! segmentation models, and post-processing of their per-pixel class logits.
//!
//! ## Features
//!
//! - Aspect-ratio preserving or exact resizing, with divisor alignment
//! - Random cropping that keeps images and label maps in correspondence
//! - Zero-label reduction for datasets where 0 means background
//! - Per-channel normalization with configurable statistics
//! - Padding to a common batch size with separate image and label fill values
//! - Logits to class probabilities (bilinear upsampling + softmax) and class maps
//! - JSON/TOML configuration compatible with `preprocessor_config.json`
//!
//! ## Modules
//!
//! * [`core`] - Error handling, configuration validation, constants and batch types
//! * [`pipeline`] - Feature extractor configuration, inputs and orchestration
//! * [`processors`] - The individual preprocessing and post-processing stages
//! * [`utils`] - Image conversion, file loading, batch stacking and logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use segformer_preprocess::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FeatureExtractorConfig::from_path("preprocessor_config.json")?;
//! let extractor = SegformerFeatureExtractor::new(config)?;
//!
//! let image = load_image(Path::new("scene.png"))?;
//! let labels = load_segmentation_map(Path::new("scene_labels.png"))?;
//! let batch = extractor.preprocess(image, Some(labels.into()))?;
//!
//! println!("pixel_values: {:?}", batch.pixel_values.shape());
//! # Ok(())
//! # }
//! ```
//!
//! ### Post-processing
//!
//! ```rust
//! use segformer_preprocess::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Logits for 4 classes at 1/4 of a 64x64 input.
//! let logits = Tensor3D::zeros((4, 16, 16));
//! let probabilities = to_segmentation_probabilities(&[logits], &[[64usize, 64]])?;
//! assert_eq!(probabilities[0].dim(), (4, 64, 64));
//!
//! let class_maps = to_segmentation_maps(&probabilities);
//! assert_eq!(class_maps[0].dim(), (64, 64));
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod pipeline;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use segformer_preprocess::prelude::*;
/// ```
///
/// Included items cover the common path: configuring and running the feature
/// extractor, post-processing model outputs, loading files and handling
/// errors. Individual stages are available from [`processors`].
pub mod prelude {
    // Pipeline
    pub use crate::pipeline::{
        FeatureExtractorConfig, ImageInput, Images, SegformerFeatureExtractor,
        SegmentationMapInput, SegmentationMaps,
    };

    // Options
    pub use crate::processors::{ImageScale, Resample};

    // Post-processing
    pub use crate::processors::{
        post_process_semantic, to_segmentation_maps, to_segmentation_probabilities,
    };

    // Data types and error handling
    pub use crate::core::{
        BatchFeature, LabelMap, PreprocessError, PreprocessResult, Tensor3D, Tensor4D,
    };

    // Image loading
    pub use crate::utils::{load_image, load_segmentation_map};
}
