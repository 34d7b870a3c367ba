//! The core module of the preprocessing pipeline.
//!
//! This module contains the fundamental pieces shared by every stage:
//! - Tensor aliases and the batched output type
//! - Configuration validation
//! - Constants used throughout the pipeline
//! - Error handling

pub mod batch;
pub mod config;
pub mod constants;
pub mod errors;

pub use batch::{BatchFeature, LabelBatch, LabelMap, Tensor3D, Tensor4D};
pub use config::{ConfigError, ConfigValidator, ConfigValidatorExt};
pub use constants::*;
pub use errors::{PreprocessError, PreprocessResult, ProcessingStage};
