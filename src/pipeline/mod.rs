//! The preprocessing pipeline module.
//!
//! This module ties the individual processors together: it defines the
//! feature extractor configuration, the accepted input forms, and the
//! extractor that runs a batch through every enabled stage.

mod config;
pub mod extractor;
pub mod input;

pub use config::{ConfigFormat, ConfigLoader, FeatureExtractorConfig};
pub use extractor::SegformerFeatureExtractor;
pub use input::{ImageInput, Images, SegmentationMapInput, SegmentationMaps, validate_inputs};
