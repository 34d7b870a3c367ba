//! Right/bottom padding of images and segmentation maps.
//!
//! Padding brings every example of a batch to one spatial size so the batch
//! can be stacked. Content stays anchored at the top-left corner.

use ndarray::{Array3, s};

use crate::core::{LabelMap, PreprocessError, PreprocessResult, Tensor3D};

fn check_target(
    height: usize,
    width: usize,
    target_height: usize,
    target_width: usize,
) -> PreprocessResult<()> {
    if target_height < height || target_width < width {
        return Err(PreprocessError::invalid_argument(format!(
            "cannot pad a {height}x{width} array to the smaller size {target_height}x{target_width}"
        )));
    }
    Ok(())
}

/// Pads a canonical `(channels, height, width)` image on the right and bottom.
///
/// # Arguments
///
/// * `image` - The image to pad.
/// * `target` - The padded size as `(height, width)`.
/// * `value` - Fill value for new pixels, in every channel.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` if the target is smaller than
/// the image on either axis.
pub fn pad_image(
    image: &Tensor3D,
    target: (usize, usize),
    value: f32,
) -> PreprocessResult<Tensor3D> {
    let (channels, height, width) = image.dim();
    let (target_height, target_width) = target;
    check_target(height, width, target_height, target_width)?;

    if (height, width) == target {
        return Ok(image.clone());
    }

    let mut padded = Array3::from_elem((channels, target_height, target_width), value);
    padded.slice_mut(s![.., ..height, ..width]).assign(image);
    Ok(padded)
}

/// Pads a `(height, width)` segmentation map on the right and bottom.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` if the target is smaller than
/// the map on either axis.
pub fn pad_segmentation_map(
    map: &LabelMap,
    target: (usize, usize),
    value: i64,
) -> PreprocessResult<LabelMap> {
    let (height, width) = map.dim();
    let (target_height, target_width) = target;
    check_target(height, width, target_height, target_width)?;

    if (height, width) == target {
        return Ok(map.clone());
    }

    let mut padded = LabelMap::from_elem(target, value);
    padded.slice_mut(s![..height, ..width]).assign(map);
    Ok(padded)
}

/// The `(height, width)` every example of a batch is padded to.
///
/// This is the elementwise maximum of the crop size (`[width, height]`) and
/// the largest example in the batch.
pub fn batch_pad_target<I>(sizes: I, crop_size: [u32; 2]) -> (usize, usize)
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let initial = (crop_size[1] as usize, crop_size[0] as usize);
    sizes
        .into_iter()
        .fold(initial, |(max_h, max_w), (h, w)| (max_h.max(h), max_w.max(w)))
}
