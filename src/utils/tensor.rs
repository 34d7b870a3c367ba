//! Tensor utility functions for assembling batches.
//!
//! Per-image arrays are stacked along a new leading batch axis. All shapes
//! must agree; the checks here produce errors that name the first offending
//! index instead of a bare ndarray shape error.

use ndarray::{Array, Axis, Dimension};

use crate::core::constants::{MAX_TENSOR_ELEMENTS, NUM_CHANNELS};
use crate::core::{
    LabelBatch, LabelMap, PreprocessError, PreprocessResult, ProcessingStage, Tensor3D, Tensor4D,
};

/// Checks that every array has the shape of the first one and that the stacked
/// result stays within [`MAX_TENSOR_ELEMENTS`].
fn validate_stackable<A, D: Dimension>(arrays: &[Array<A, D>], what: &str) -> PreprocessResult<()> {
    let Some(first) = arrays.first() else {
        return Ok(());
    };
    let first_shape = first.shape();

    for (i, array) in arrays.iter().enumerate().skip(1) {
        if array.shape() != first_shape {
            return Err(PreprocessError::invalid_argument(format!(
                "cannot stack {what}: element 0 has shape {:?} but element {} has shape {:?}; \
                 enable padding or random cropping to obtain a uniform size",
                first_shape,
                i,
                array.shape()
            )));
        }
    }

    let result_size = arrays
        .len()
        .checked_mul(first_shape.iter().product::<usize>())
        .ok_or_else(|| {
            PreprocessError::invalid_argument(format!(
                "stacking {} {what} of shape {:?} would overflow",
                arrays.len(),
                first_shape
            ))
        })?;
    if result_size > MAX_TENSOR_ELEMENTS {
        return Err(PreprocessError::invalid_argument(format!(
            "stacked {what} size {result_size} exceeds maximum allowed size {MAX_TENSOR_ELEMENTS}"
        )));
    }
    Ok(())
}

/// Stacks canonical images into a `(batch, channels, height, width)` tensor.
///
/// An empty slice yields a `(0, 3, 0, 0)` tensor.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` if the images differ in shape.
pub fn stack_images(images: &[Tensor3D]) -> PreprocessResult<Tensor4D> {
    if images.is_empty() {
        return Ok(Tensor4D::zeros((0, NUM_CHANNELS, 0, 0)));
    }
    validate_stackable(images, "images")?;
    let views: Vec<_> = images.iter().map(|t| t.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| {
        PreprocessError::processing_error(
            ProcessingStage::BatchAssembly,
            format!("failed to stack {} images", images.len()),
            e,
        )
    })
}

/// Stacks label maps into a `(batch, height, width)` array.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` if the maps differ in shape.
pub fn stack_label_maps(maps: &[LabelMap]) -> PreprocessResult<LabelBatch> {
    if maps.is_empty() {
        return Ok(LabelBatch::zeros((0, 0, 0)));
    }
    validate_stackable(maps, "segmentation maps")?;
    let views: Vec<_> = maps.iter().map(|m| m.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| {
        PreprocessError::processing_error(
            ProcessingStage::BatchAssembly,
            format!("failed to stack {} segmentation maps", maps.len()),
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_images() -> PreprocessResult<()> {
        let images = vec![Tensor3D::zeros((3, 4, 5)), Tensor3D::ones((3, 4, 5))];
        let batch = stack_images(&images)?;
        assert_eq!(batch.shape(), &[2, 3, 4, 5]);
        assert_eq!(batch[[1, 2, 3, 4]], 1.0);
        Ok(())
    }

    #[test]
    fn test_stack_images_shape_mismatch_names_index() {
        let images = vec![
            Tensor3D::zeros((3, 4, 5)),
            Tensor3D::zeros((3, 4, 5)),
            Tensor3D::zeros((3, 6, 5)),
        ];
        let err = stack_images(&images).unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidArgument { .. }));
        assert!(err.to_string().contains("element 2"));
    }

    #[test]
    fn test_stack_empty() -> PreprocessResult<()> {
        assert_eq!(stack_images(&[])?.shape(), &[0, 3, 0, 0]);
        assert_eq!(stack_label_maps(&[])?.shape(), &[0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_stack_label_maps() -> PreprocessResult<()> {
        let maps = vec![LabelMap::from_elem((2, 2), 3), LabelMap::from_elem((2, 2), -100)];
        let batch = stack_label_maps(&maps)?;
        assert_eq!(batch.shape(), &[2, 2, 2]);
        assert_eq!(batch[[1, 0, 1]], -100);
        Ok(())
    }
}
