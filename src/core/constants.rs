//! Constants used throughout the preprocessing pipeline.
//!
//! Default values for the feature extractor configuration, label sentinels and
//! tensor size limits.

/// The ImageNet per-channel mean (RGB), used when no mean is configured.
pub const IMAGENET_DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// The ImageNet per-channel standard deviation (RGB), used when no std is configured.
pub const IMAGENET_DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Number of channels every canonical image carries.
pub const NUM_CHANNELS: usize = 3;

/// The default resize bound `(max_long_edge, max_short_edge)`.
pub const DEFAULT_IMAGE_SCALE: (u32, u32) = (2048, 512);

/// The default divisor that aligned image sides must be a multiple of.
pub const DEFAULT_SIZE_DIVISOR: u32 = 32;

/// The default random crop size as `[width, height]`.
pub const DEFAULT_CROP_SIZE: [u32; 2] = [512, 512];

/// Label value marking pixels to ignore after label reduction.
pub const IGNORE_LABEL: i64 = 255;

/// The default fill value for padded segmentation map pixels.
///
/// Must match the `ignore_index` of the loss used during training.
pub const DEFAULT_SEGMENTATION_PADDING_VALUE: i64 = -100;

/// Scale applied to 8-bit pixel sources when converting to the canonical
/// floating point representation.
pub const PIXEL_RESCALE_FACTOR: f32 = 1.0 / 255.0;

/// The minimum batch size before per-image stages run on the rayon pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;

/// The maximum number of elements a stacked batch may contain.
pub const MAX_TENSOR_ELEMENTS: usize = 1_000_000_000;
