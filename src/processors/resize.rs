//! Image and segmentation map resizing
//!
//! Two resize modes are supported:
//! - Ratio-preserving: the image is scaled by a factor, or as large as possible
//!   within a `(max_long_edge, max_short_edge)` bound, and optionally aligned so
//!   both sides are multiples of a divisor.
//! - Exact: the image is resized to a fixed `(width, height)` target, which
//!   must itself be divisor-aligned.
//!
//! Images are resampled with a configurable filter through the `image` crate.
//! Segmentation maps are always resampled nearest-neighbour so class ids are
//! never blended.

use image::imageops;
use tracing::debug;

use crate::core::{LabelMap, PreprocessError, PreprocessResult, Tensor3D};
use crate::processors::types::{ImageScale, Resample};
use crate::utils::image::{chw_to_rgb32f, rgb32f_to_chw};

/// Rescales a `(width, height)` size by `scale`, rounding half up.
///
/// Each side is at least one pixel.
pub fn scale_size(size: (u32, u32), scale: f64) -> (u32, u32) {
    let (w, h) = size;
    let scaled = |v: u32| ((v as f64 * scale + 0.5).floor() as u32).max(1);
    (scaled(w), scaled(h))
}

/// Computes the size an image should be rescaled to, preserving aspect ratio.
///
/// # Arguments
///
/// * `old_size` - The original `(width, height)`.
/// * `scale` - A scale factor, or a pair bounding the long and short edges.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` if the factor is not positive or
/// the original size has a zero side.
pub fn rescale_size(old_size: (u32, u32), scale: ImageScale) -> PreprocessResult<(u32, u32)> {
    rescale_size_with_factor(old_size, scale).map(|(size, _)| size)
}

/// Like [`rescale_size`], but also returns the scale factor that was applied.
pub fn rescale_size_with_factor(
    old_size: (u32, u32),
    scale: ImageScale,
) -> PreprocessResult<((u32, u32), f64)> {
    let (w, h) = old_size;
    if w == 0 || h == 0 {
        return Err(PreprocessError::invalid_argument(format!(
            "cannot rescale an image of size {w}x{h}"
        )));
    }

    let scale_factor = match scale {
        ImageScale::Factor(factor) => {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(PreprocessError::invalid_argument(format!(
                    "invalid scale {factor}, must be positive"
                )));
            }
            factor
        }
        ImageScale::Size(a, b) => {
            let (max_long_edge, max_short_edge) = (a.max(b) as f64, a.min(b) as f64);
            let long_edge = w.max(h) as f64;
            let short_edge = w.min(h) as f64;
            (max_long_edge / long_edge).min(max_short_edge / short_edge)
        }
    };

    Ok((scale_size((w, h), scale_factor), scale_factor))
}

/// Rounds both sides of a `(width, height)` size up to the next multiple of `divisor`.
pub fn align_size(size: (u32, u32), divisor: u32) -> (u32, u32) {
    if divisor == 0 {
        return size;
    }
    (size.0.div_ceil(divisor) * divisor, size.1.div_ceil(divisor) * divisor)
}

/// Checks that both sides of a `(width, height)` size are multiples of `divisor`.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidState` if a side is not aligned.
pub fn check_alignment(size: (u32, u32), divisor: u32) -> PreprocessResult<()> {
    let (w, h) = size;
    if divisor == 0 || w % divisor != 0 || h % divisor != 0 {
        return Err(PreprocessError::invalid_state(format!(
            "image size doesn't align. h:{h} w:{w} (size_divisor {divisor})"
        )));
    }
    Ok(())
}

/// Resize settings shared by images and their segmentation maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegResize {
    /// Scale factor, edge bounds, or exact target size.
    pub scale: ImageScale,
    /// Whether to preserve the aspect ratio.
    pub keep_ratio: bool,
    /// Whether to round aligned sides up to a multiple of `size_divisor`.
    pub align: bool,
    /// The divisor image sides must be multiples of.
    pub size_divisor: u32,
    /// Filter used for images.
    pub resample: Resample,
}

impl SegResize {
    /// Creates a new resizer.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessError::InvalidArgument` if the divisor is zero while
    /// it is needed, or if a scale factor is not positive.
    pub fn new(
        scale: ImageScale,
        keep_ratio: bool,
        align: bool,
        size_divisor: u32,
        resample: Resample,
    ) -> PreprocessResult<Self> {
        if size_divisor == 0 && (align || !keep_ratio) {
            return Err(PreprocessError::invalid_argument(
                "size_divisor must be greater than 0",
            ));
        }
        if let ImageScale::Factor(factor) = scale {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(PreprocessError::invalid_argument(format!(
                    "invalid scale {factor}, must be positive"
                )));
            }
        }
        Ok(Self {
            scale,
            keep_ratio,
            align,
            size_divisor,
            resample,
        })
    }

    /// The fixed target of an exact resize, if the target does not depend on
    /// the input size.
    pub fn fixed_target(&self) -> Option<(u32, u32)> {
        match (self.keep_ratio, self.scale) {
            (false, ImageScale::Size(w, h)) => Some((w, h)),
            _ => None,
        }
    }

    /// The intermediate size before alignment, for an input of `(width, height)`.
    fn unaligned_size(&self, size: (u32, u32)) -> PreprocessResult<(u32, u32)> {
        if self.keep_ratio {
            return rescale_size(size, self.scale);
        }
        match self.scale {
            ImageScale::Size(w, h) => Ok((w, h)),
            ImageScale::Factor(_) => rescale_size(size, self.scale),
        }
    }

    /// The size an input of `(width, height)` ends up with.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessError::InvalidState` for an exact resize whose target
    /// is not divisor-aligned.
    pub fn output_size(&self, size: (u32, u32)) -> PreprocessResult<(u32, u32)> {
        let new_size = self.unaligned_size(size)?;
        if self.keep_ratio {
            if self.align {
                return Ok(align_size(new_size, self.size_divisor));
            }
            return Ok(new_size);
        }
        check_alignment(new_size, self.size_divisor)?;
        Ok(new_size)
    }

    /// Resizes a canonical `(channels, height, width)` image.
    pub fn resize_image(&self, image: &Tensor3D) -> PreprocessResult<Tensor3D> {
        let (_, height, width) = image.dim();
        let size = (width as u32, height as u32);
        let new_size = self.unaligned_size(size)?;
        let mut resized = resample_image(image, new_size, self.resample)?;

        if self.keep_ratio {
            if self.align {
                let aligned = align_size(new_size, self.size_divisor);
                resized = resample_image(&resized, aligned, self.resample)?;
            }
        } else {
            let (_, h, w) = resized.dim();
            check_alignment((w as u32, h as u32), self.size_divisor)?;
        }

        debug!(
            from = ?size,
            to = ?(resized.dim().2, resized.dim().1),
            "resized image"
        );
        Ok(resized)
    }

    /// Resizes a segmentation map with nearest-neighbour sampling.
    pub fn resize_segmentation_map(&self, map: &LabelMap) -> PreprocessResult<LabelMap> {
        let (height, width) = map.dim();
        let size = (width as u32, height as u32);
        let new_size = self.unaligned_size(size)?;
        let mut resized = resize_nearest(map, new_size);

        if self.keep_ratio {
            if self.align {
                let aligned = align_size(new_size, self.size_divisor);
                resized = resize_nearest(&resized, aligned);
            }
        } else {
            let (h, w) = resized.dim();
            check_alignment((w as u32, h as u32), self.size_divisor)?;
        }
        Ok(resized)
    }
}

/// Resizes an image following the ratio-preserving or exact mode.
///
/// Convenience wrapper around [`SegResize`].
pub fn resize_image(
    image: &Tensor3D,
    scale: ImageScale,
    keep_ratio: bool,
    align: bool,
    size_divisor: u32,
    resample: Resample,
) -> PreprocessResult<Tensor3D> {
    SegResize::new(scale, keep_ratio, align, size_divisor, resample)?.resize_image(image)
}

/// Resizes a segmentation map the same way [`resize_image`] resizes its image,
/// always with nearest-neighbour sampling.
pub fn resize_segmentation_map(
    map: &LabelMap,
    scale: ImageScale,
    keep_ratio: bool,
    align: bool,
    size_divisor: u32,
) -> PreprocessResult<LabelMap> {
    SegResize::new(scale, keep_ratio, align, size_divisor, Resample::Nearest)?
        .resize_segmentation_map(map)
}

/// Resamples a canonical image to `(width, height)` with the given filter.
fn resample_image(
    image: &Tensor3D,
    size: (u32, u32),
    resample: Resample,
) -> PreprocessResult<Tensor3D> {
    let (_, height, width) = image.dim();
    if (width as u32, height as u32) == size {
        return Ok(image.clone());
    }
    let buffer = chw_to_rgb32f(image)?;
    let resized = imageops::resize(&buffer, size.0, size.1, resample.filter_type());
    rgb32f_to_chw(resized)
}

/// Nearest-neighbour resize of a label map to `(width, height)`.
///
/// Samples the source pixel whose centre is closest to each target pixel
/// centre, so values are copied and never interpolated.
fn resize_nearest(map: &LabelMap, size: (u32, u32)) -> LabelMap {
    let (src_h, src_w) = map.dim();
    let (dst_w, dst_h) = (size.0 as usize, size.1 as usize);
    if (src_w, src_h) == (dst_w, dst_h) || src_w == 0 || src_h == 0 {
        return map.clone();
    }
    let scale_y = src_h as f64 / dst_h as f64;
    let scale_x = src_w as f64 / dst_w as f64;

    LabelMap::from_shape_fn((dst_h, dst_w), |(y, x)| {
        let sy = (((y as f64 + 0.5) * scale_y) as usize).min(src_h - 1);
        let sx = (((x as f64 + 0.5) * scale_x) as usize).min(src_w - 1);
        map[[sy, sx]]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_size_with_edge_bounds() -> PreprocessResult<()> {
        // max_long = 2048, max_short = 1024; factor = min(2048/512, 1024/256) = 4
        let (size, factor) = rescale_size_with_factor((512, 256), ImageScale::Size(1024, 2048))?;
        assert_eq!(size, (2048, 1024));
        assert_eq!(factor, 4.0);

        // The bounds are order independent.
        let swapped = rescale_size((512, 256), ImageScale::Size(2048, 1024))?;
        assert_eq!(swapped, (2048, 1024));
        Ok(())
    }

    #[test]
    fn test_rescale_size_rounds_half_up() -> PreprocessResult<()> {
        // factor = min(1333/512, 800/288) = 1333/512
        assert_eq!(rescale_size((512, 288), ImageScale::Size(1333, 800))?, (1333, 750));
        assert_eq!(rescale_size((3, 5), ImageScale::Factor(0.5))?, (2, 3));
        Ok(())
    }

    #[test]
    fn test_rescale_size_rejects_non_positive_factor() {
        for factor in [0.0, -1.5, f64::NAN] {
            let err = rescale_size((10, 10), ImageScale::Factor(factor)).unwrap_err();
            assert!(matches!(err, PreprocessError::InvalidArgument { .. }));
        }
    }

    #[test]
    fn test_align_size_rounds_up() {
        assert_eq!(align_size((608, 512), 32), (608, 512));
        assert_eq!(align_size((609, 1), 32), (640, 32));
        assert_eq!(align_size((7, 9), 0), (7, 9));
    }

    #[test]
    fn test_aligned_resize_sizes() -> PreprocessResult<()> {
        let resizer = SegResize::new(
            ImageScale::Size(2048, 512),
            true,
            true,
            32,
            Resample::Bilinear,
        )?;
        assert_eq!(resizer.output_size((304, 256))?, (608, 512));

        let image = Tensor3D::from_elem((3, 256, 304), 0.5);
        let resized = resizer.resize_image(&image)?;
        assert_eq!(resized.dim(), (3, 512, 608));
        assert!(resized.iter().all(|&v| (v - 0.5).abs() < 1e-5));
        Ok(())
    }

    #[test]
    fn test_aligned_resize_is_divisible_and_keeps_ratio() -> PreprocessResult<()> {
        let divisor = 10;
        let resizer = SegResize::new(
            ImageScale::Size(100, 20),
            true,
            true,
            divisor,
            Resample::Bilinear,
        )?;
        for (w, h) in [(30, 400), (400, 30), (123, 77), (64, 64), (399, 31)] {
            let ((uw, uh), factor) =
                rescale_size_with_factor((w, h), ImageScale::Size(100, 20))?;
            let (ow, oh) = resizer.output_size((w, h))?;
            assert_eq!(ow % divisor, 0);
            assert_eq!(oh % divisor, 0);
            // Both sides share one factor; rounding moves each by at most one pixel.
            assert!((uw as f64 - w as f64 * factor).abs() <= 1.0);
            assert!((uh as f64 - h as f64 * factor).abs() <= 1.0);
        }
        Ok(())
    }

    #[test]
    fn test_exact_resize_ignores_aspect_ratio() -> PreprocessResult<()> {
        let image = Tensor3D::zeros((3, 288, 512));
        let resized = resize_image(
            &image,
            ImageScale::Size(1280, 800),
            false,
            false,
            32,
            Resample::Bilinear,
        )?;
        assert_eq!(resized.dim(), (3, 800, 1280));
        Ok(())
    }

    #[test]
    fn test_exact_resize_requires_aligned_target() {
        let resizer =
            SegResize::new(ImageScale::Size(100, 50), false, false, 32, Resample::Bilinear)
                .unwrap();
        let err = resizer.output_size((64, 64)).unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidState { .. }));

        let err = resizer.resize_image(&Tensor3D::zeros((3, 64, 64))).unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidState { .. }));
    }

    #[test]
    fn test_segmentation_map_resize_never_blends() -> PreprocessResult<()> {
        let resizer = SegResize::new(
            ImageScale::Factor(2.5),
            true,
            true,
            4,
            Resample::Bilinear,
        )?;
        let map = LabelMap::from_shape_fn((6, 5), |(y, x)| if (x + y) % 2 == 0 { 3 } else { 200 });
        let resized = resizer.resize_segmentation_map(&map)?;
        assert_eq!(resized.dim(), (16, 16));
        assert!(resized.iter().all(|&v| v == 3 || v == 200));
        Ok(())
    }

    #[test]
    fn test_resize_nearest_upscale_copies_blocks() {
        let map = LabelMap::from_shape_vec((2, 2), vec![1, 2, 3, 4]).unwrap();
        let resized = resize_nearest(&map, (4, 4));
        assert_eq!(resized.row(0).to_vec(), vec![1, 1, 2, 2]);
        assert_eq!(resized.row(3).to_vec(), vec![3, 3, 4, 4]);
    }

    #[test]
    fn test_resizer_rejects_zero_divisor() {
        assert!(
            SegResize::new(ImageScale::Size(64, 64), true, true, 0, Resample::Bilinear).is_err()
        );
        assert!(
            SegResize::new(ImageScale::Size(64, 64), true, false, 0, Resample::Bilinear).is_ok()
        );
    }
}
