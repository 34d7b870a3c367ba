//! Error types for the preprocessing pipeline.
//!
//! This module defines the errors that can occur while preparing images and
//! segmentation maps for a segmentation model, along with helper constructors
//! that attach the failing stage and some context to the underlying error.

use thiserror::Error;

/// Enum representing the stages of the preprocessing pipeline.
///
/// Used to identify which stage a wrapped [`PreprocessError::Processing`]
/// error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred while stacking per-image arrays into a batch.
    BatchAssembly,
    /// Error occurred during tensor operations.
    TensorOperation,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::BatchAssembly => write!(f, "batch assembly"),
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
        }
    }
}

/// Errors produced by the preprocessing pipeline.
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// An argument or input had an unsupported type, shape or value.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// A message describing the invalid argument.
        message: String,
    },

    /// An operation produced a result that violates a pipeline invariant.
    #[error("invalid state: {message}")]
    InvalidState {
        /// A message describing the violated invariant.
        message: String,
    },

    /// The configuration is invalid.
    #[error("configuration: {message}")]
    Config {
        /// A message describing the configuration error.
        message: String,
    },

    /// A pipeline stage failed because of an underlying error.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error from ndarray shape manipulation.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// Error occurred while loading an image.
    #[error("image load")]
    ImageLoad(#[from] image::ImageError),

    /// Error while reading or writing configuration files.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// Error while (de)serializing configuration.
    #[error("serialization")]
    Serialization(#[from] serde_json::Error),
}

/// Convenient result alias for preprocessing operations.
pub type PreprocessResult<T> = Result<T, PreprocessError>;

impl PreprocessError {
    /// Creates an `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an `InvalidState` error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a configuration error naming the offending field and value.
    ///
    /// # Arguments
    ///
    /// * `field` - The field where the error occurred.
    /// * `value` - The value of the field.
    /// * `reason` - Why the value was rejected.
    pub fn config_error_with_context(field: &str, value: &str, reason: &str) -> Self {
        Self::Config {
            message: format!(
                "Configuration error in field '{}' with value '{}': {}",
                field, value, reason
            ),
        }
    }

    /// Creates an error wrapping the failure of a pipeline stage.
    ///
    /// # Arguments
    ///
    /// * `kind` - The stage where the error occurred.
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error.
    pub fn processing_error(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an error for a failed tensor reshape or stack, recording the
    /// expected and actual shapes in the context.
    ///
    /// # Arguments
    ///
    /// * `operation` - The operation that failed.
    /// * `expected_shape` - The shape the operation tried to produce.
    /// * `actual_shape` - The shape (or element count) that was available.
    /// * `context` - Free-form context.
    /// * `error` - The underlying error.
    pub fn tensor_operation_error(
        operation: &str,
        expected_shape: &[usize],
        actual_shape: &[usize],
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind: ProcessingStage::TensorOperation,
            context: format!(
                "{operation}: {context} (expected shape {expected_shape:?}, actual {actual_shape:?})"
            ),
            source: Box::new(error),
        }
    }

    /// Formats an error for one item of a batch, e.g. `"image 3 of 7"` or
    /// `"single image"`, so every validation message names its position the
    /// same way.
    pub fn batch_item_error(
        what: &str,
        index: usize,
        total: usize,
        batched: bool,
        reason: impl std::fmt::Display,
    ) -> Self {
        let position = if batched {
            format!("{what} {} of {total} (batch of examples)", index + 1)
        } else {
            format!("{what} (single example)")
        };
        Self::InvalidArgument {
            message: format!("{position}: {reason}"),
        }
    }
}

impl From<crate::core::config::ConfigError> for PreprocessError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::Config {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_error_display_names_stage() {
        let err = PreprocessError::processing_error(
            ProcessingStage::BatchAssembly,
            "failed to stack 2 images",
            std::io::Error::other("bad buffer"),
        );
        assert_eq!(err.to_string(), "batch assembly failed: failed to stack 2 images");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_batch_item_error_positions() {
        let batched = PreprocessError::batch_item_error("image", 2, 5, true, "has 4 channels");
        assert_eq!(
            batched.to_string(),
            "invalid argument: image 3 of 5 (batch of examples): has 4 channels"
        );

        let single = PreprocessError::batch_item_error("image", 0, 1, false, "has 4 channels");
        assert_eq!(
            single.to_string(),
            "invalid argument: image (single example): has 4 channels"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err: PreprocessError = crate::core::config::ConfigError::InvalidConfig {
            message: "size_divisor must be greater than 0".to_string(),
        }
        .into();
        assert!(matches!(err, PreprocessError::Config { .. }));
        assert!(err.to_string().contains("size_divisor"));
    }
}
