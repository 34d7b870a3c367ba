//! Image and segmentation map processors.
//!
//! Each stage of the preprocessing pipeline lives in its own module and works
//! on canonical `(channels, height, width)` images and `(height, width)` label
//! maps, so the stages can be used on their own as well as through
//! [`SegformerFeatureExtractor`](crate::pipeline::SegformerFeatureExtractor).
//!
//! # Modules
//!
//! * `crop` - Random crop sampling and application
//! * `labels` - Zero-label reduction
//! * `normalization` - Per-channel mean/std normalization
//! * `padding` - Right/bottom padding to a common batch size
//! * `postprocess` - Logits to class probabilities and class maps
//! * `resize` - Size computation and alignment-aware resizing
//! * `types` - Type definitions used across the processors module

pub mod crop;
pub mod labels;
mod normalization;
pub mod padding;
pub mod postprocess;
pub mod resize;
pub mod types;

pub use crop::{RandomCrop, crop_image, crop_segmentation_map, sample_crop_box};
pub use labels::reduce_zero_label;
pub use normalization::*;
pub use padding::{batch_pad_target, pad_image, pad_segmentation_map};
pub use postprocess::{
    argmax_classes, interpolate_bilinear, post_process_semantic, softmax_classes,
    to_segmentation_maps, to_segmentation_probabilities,
};
pub use resize::{
    SegResize, align_size, check_alignment, rescale_size, rescale_size_with_factor,
    resize_image, resize_segmentation_map, scale_size,
};
pub use types::*;
