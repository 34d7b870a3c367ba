//! Random cropping of images and their segmentation maps.
//!
//! A crop box is sampled once per image/map pair and then applied to both, so
//! pixels and labels keep their correspondence.

use ndarray::s;
use rand::Rng;
use tracing::warn;

use crate::core::{LabelMap, PreprocessError, PreprocessResult, Tensor3D};
use crate::processors::types::CropBox;

/// Samples a random crop window for an image of `height` x `width`.
///
/// # Arguments
///
/// * `height` - Height of the image to crop.
/// * `width` - Width of the image to crop.
/// * `crop_size` - The crop size as `[width, height]`.
/// * `rng` - Source of randomness for the offsets.
///
/// Offsets are drawn uniformly from `[0, margin]` where the margin is how much
/// the image exceeds the crop on that axis. An axis smaller than the crop keeps
/// its full extent.
pub fn sample_crop_box<R: Rng>(
    height: usize,
    width: usize,
    crop_size: [u32; 2],
    rng: &mut R,
) -> CropBox {
    let crop_w = crop_size[0] as usize;
    let crop_h = crop_size[1] as usize;

    let margin_h = height.saturating_sub(crop_h);
    let margin_w = width.saturating_sub(crop_w);
    let offset_h = rng.gen_range(0..=margin_h);
    let offset_w = rng.gen_range(0..=margin_w);

    CropBox {
        y1: offset_h,
        y2: offset_h + crop_h,
        x1: offset_w,
        x2: offset_w + crop_w,
    }
    .clip_to(height, width)
}

fn check_box(bbox: CropBox, height: usize, width: usize) -> PreprocessResult<()> {
    if bbox.y2 > height || bbox.x2 > width || bbox.height() == 0 || bbox.width() == 0 {
        return Err(PreprocessError::invalid_argument(format!(
            "crop box rows {}..{} cols {}..{} does not fit a {height}x{width} image",
            bbox.y1, bbox.y2, bbox.x1, bbox.x2
        )));
    }
    Ok(())
}

/// Crops a canonical `(channels, height, width)` image.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` if the box is empty or extends
/// past the image.
pub fn crop_image(image: &Tensor3D, bbox: CropBox) -> PreprocessResult<Tensor3D> {
    let (_, height, width) = image.dim();
    check_box(bbox, height, width)?;
    Ok(image
        .slice(s![.., bbox.y1..bbox.y2, bbox.x1..bbox.x2])
        .to_owned())
}

/// Crops a `(height, width)` segmentation map.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` if the box is empty or extends
/// past the map.
pub fn crop_segmentation_map(map: &LabelMap, bbox: CropBox) -> PreprocessResult<LabelMap> {
    let (height, width) = map.dim();
    check_box(bbox, height, width)?;
    Ok(map.slice(s![bbox.y1..bbox.y2, bbox.x1..bbox.x2]).to_owned())
}

/// Random crop stage with a fixed crop size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomCrop {
    /// The crop size as `[width, height]`.
    pub crop_size: [u32; 2],
}

impl RandomCrop {
    /// Creates a new random crop stage.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessError::InvalidArgument` if either side of the crop is zero.
    pub fn new(crop_size: [u32; 2]) -> PreprocessResult<Self> {
        if crop_size[0] == 0 || crop_size[1] == 0 {
            return Err(PreprocessError::invalid_argument(format!(
                "crop_size must be positive, got {}x{}",
                crop_size[0], crop_size[1]
            )));
        }
        Ok(Self { crop_size })
    }

    /// Samples a crop window for an image of the given `(height, width)`.
    pub fn sample<R: Rng>(&self, height: usize, width: usize, rng: &mut R) -> CropBox {
        let [crop_w, crop_h] = self.crop_size;
        if height < crop_h as usize || width < crop_w as usize {
            warn!(
                height,
                width,
                crop_h,
                crop_w,
                "image is smaller than the crop size, keeping the short side"
            );
        }
        sample_crop_box(height, width, self.crop_size, rng)
    }

    /// Crops an image and, if present, its segmentation map with one window.
    pub fn apply<R: Rng>(
        &self,
        image: &Tensor3D,
        map: Option<&LabelMap>,
        rng: &mut R,
    ) -> PreprocessResult<(Tensor3D, Option<LabelMap>)> {
        let (_, height, width) = image.dim();
        let bbox = self.sample(height, width, rng);
        let cropped = crop_image(image, bbox)?;
        let cropped_map = map
            .map(|m| crop_segmentation_map(m, bbox))
            .transpose()?;
        Ok((cropped, cropped_map))
    }
}
