//! Utility functions for image conversion and loading.
//!
//! Every pipeline stage works on a canonical `(channels, height, width)` `f32`
//! array. This module converts between that representation and the `image`
//! crate buffers used for resampling and file IO.

use std::path::Path;

use image::{DynamicImage, ImageBuffer, Rgb, Rgb32FImage};
use ndarray::{Array2, Array3};

use crate::core::constants::{NUM_CHANNELS, PIXEL_RESCALE_FACTOR};
use crate::core::{LabelMap, PreprocessError, PreprocessResult, Tensor3D};

/// Converts a canonical CHW tensor into an `Rgb32FImage`.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` if the tensor does not have
/// exactly three channels.
pub fn chw_to_rgb32f(image: &Tensor3D) -> PreprocessResult<Rgb32FImage> {
    let (channels, height, width) = image.dim();
    if channels != NUM_CHANNELS {
        return Err(PreprocessError::invalid_argument(format!(
            "expected {NUM_CHANNELS} channels, got {channels}"
        )));
    }

    // Iterating the permuted view walks the data in HWC order.
    let hwc: Vec<f32> = image.view().permuted_axes([1, 2, 0]).iter().copied().collect();
    let hwc_len = hwc.len();
    ImageBuffer::<Rgb<f32>, Vec<f32>>::from_raw(width as u32, height as u32, hwc).ok_or_else(|| {
        PreprocessError::invalid_state(format!(
            "buffer of {hwc_len} values does not fit a {width}x{height} RGB image"
        ))
    })
}

/// Converts an `Rgb32FImage` into a canonical CHW tensor.
pub fn rgb32f_to_chw(image: Rgb32FImage) -> PreprocessResult<Tensor3D> {
    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);
    let raw = image.into_raw();
    let raw_len = raw.len();
    let hwc = Array3::from_shape_vec((height, width, NUM_CHANNELS), raw).map_err(|e| {
        PreprocessError::tensor_operation_error(
            "rgb32f_to_chw",
            &[height, width, NUM_CHANNELS],
            &[raw_len],
            "failed to view image buffer as HWC",
            e,
        )
    })?;
    Ok(hwc.permuted_axes([2, 0, 1]).as_standard_layout().into_owned())
}

/// Converts any `DynamicImage` into a canonical CHW tensor with values in `[0, 1]`.
pub fn dynamic_to_chw(image: &DynamicImage) -> PreprocessResult<Tensor3D> {
    rgb32f_to_chw(image.to_rgb32f())
}

/// Converts an 8-bit `(height, width, channels)` array into a canonical CHW
/// tensor, rescaling values to `[0, 1]`.
pub fn hwc_u8_to_chw(pixels: &Array3<u8>) -> Tensor3D {
    pixels
        .view()
        .permuted_axes([2, 0, 1])
        .mapv(|v| v as f32 * PIXEL_RESCALE_FACTOR)
        .as_standard_layout()
        .into_owned()
}

/// Converts an 8-bit `(channels, height, width)` array into a canonical CHW
/// tensor, rescaling values to `[0, 1]`.
pub fn chw_u8_to_chw(pixels: &Array3<u8>) -> Tensor3D {
    pixels
        .as_standard_layout()
        .mapv(|v| v as f32 * PIXEL_RESCALE_FACTOR)
}

/// Copies a floating point CHW tensor into standard layout with every value
/// clamped to `[0, 1]`, the range resampling works in.
pub fn clamp_unit_range(tensor: &Tensor3D) -> Tensor3D {
    tensor.as_standard_layout().mapv(|v| v.clamp(0.0, 1.0))
}

/// Converts a single-channel `DynamicImage` into a label map.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` naming the colour type when the
/// image has more than one channel.
pub fn dynamic_to_label_map(image: &DynamicImage) -> PreprocessResult<LabelMap> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let values: Vec<i64> = match image {
        DynamicImage::ImageLuma8(buf) => buf.as_raw().iter().map(|&v| v as i64).collect(),
        DynamicImage::ImageLuma16(buf) => buf.as_raw().iter().map(|&v| v as i64).collect(),
        other => {
            return Err(PreprocessError::invalid_argument(format!(
                "unsupported segmentation map colour type {:?}, expected a single-channel image",
                other.color()
            )));
        }
    };
    Ok(Array2::from_shape_vec((height, width), values)?)
}

/// Loads an image from a file path.
///
/// # Errors
///
/// Returns `PreprocessError::ImageLoad` if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> PreprocessResult<DynamicImage> {
    Ok(image::open(path)?)
}

/// Loads a segmentation map from a single-channel image file.
///
/// # Errors
///
/// Returns an error if the file cannot be decoded or is not single-channel.
pub fn load_segmentation_map(path: &Path) -> PreprocessResult<LabelMap> {
    let image = load_image(path)?;
    dynamic_to_label_map(&image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};

    #[test]
    fn test_chw_round_trip_through_rgb32f() -> PreprocessResult<()> {
        let tensor = Tensor3D::from_shape_fn((3, 2, 4), |(c, y, x)| {
            (c * 100 + y * 10 + x) as f32 / 1000.0
        });
        let buffer = chw_to_rgb32f(&tensor)?;
        assert_eq!(buffer.dimensions(), (4, 2));
        assert_eq!(buffer.get_pixel(3, 1).0, [0.013, 0.113, 0.213]);
        assert_eq!(rgb32f_to_chw(buffer)?, tensor);
        Ok(())
    }

    #[test]
    fn test_chw_to_rgb32f_rejects_wrong_channel_count() {
        let tensor = Tensor3D::zeros((4, 2, 2));
        assert!(chw_to_rgb32f(&tensor).is_err());
    }

    #[test]
    fn test_dynamic_to_chw_rescales() -> PreprocessResult<()> {
        let mut rgb = RgbImage::new(2, 1);
        rgb.put_pixel(1, 0, Rgb([255, 0, 51]));
        let tensor = dynamic_to_chw(&DynamicImage::ImageRgb8(rgb))?;
        assert_eq!(tensor.dim(), (3, 1, 2));
        assert!((tensor[[0, 0, 1]] - 1.0).abs() < 1e-6);
        assert!((tensor[[2, 0, 1]] - 0.2).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_hwc_u8_to_chw_layout() {
        let pixels = Array3::from_shape_fn((2, 3, 3), |(y, x, c)| (y * 30 + x * 3 + c) as u8);
        let tensor = hwc_u8_to_chw(&pixels);
        assert_eq!(tensor.dim(), (3, 2, 3));
        assert!((tensor[[2, 1, 0]] - 32.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_label_map_from_gray_image() -> PreprocessResult<()> {
        let mut gray = GrayImage::new(3, 2);
        gray.put_pixel(2, 1, Luma([7]));
        let labels = dynamic_to_label_map(&DynamicImage::ImageLuma8(gray))?;
        assert_eq!(labels.dim(), (2, 3));
        assert_eq!(labels[[1, 2]], 7);
        assert_eq!(labels[[0, 0]], 0);
        Ok(())
    }

    #[test]
    fn test_label_map_rejects_rgb() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        let err = dynamic_to_label_map(&rgb).unwrap_err();
        assert!(err.to_string().contains("single-channel"));
    }
}
