//! Utility functions for the preprocessing pipeline.
//!
//! This module provides image conversion and loading helpers, batch stacking,
//! and logging setup.

pub mod image;
pub mod tensor;

pub use image::{
    chw_to_rgb32f, chw_u8_to_chw, clamp_unit_range, dynamic_to_chw, dynamic_to_label_map,
    hwc_u8_to_chw, load_image, load_segmentation_map, rgb32f_to_chw,
};
pub use tensor::{stack_images, stack_label_maps};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
