//! Post-processing of semantic segmentation logits.
//!
//! Model outputs are `(num_classes, height, width)` logit maps at a reduced
//! resolution. They are resampled bilinearly to the requested output size
//! (half-pixel centres, no corner alignment) and turned into per-pixel class
//! probabilities with a softmax over the class axis.

use ndarray::{Array2, ArrayView3, Axis, Zip};
use rayon::prelude::*;
use tracing::debug;

use crate::core::{
    DEFAULT_PARALLEL_THRESHOLD, LabelMap, PreprocessError, PreprocessResult, Tensor3D, Tensor4D,
};

/// Source index pair and blend weight for one output coordinate.
#[derive(Debug, Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    weight: f32,
}

fn taps(in_len: usize, out_len: usize) -> Vec<Tap> {
    let scale = in_len as f32 / out_len as f32;
    (0..out_len)
        .map(|dst| {
            let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
            let lo = (src.floor() as usize).min(in_len - 1);
            let hi = (lo + 1).min(in_len - 1);
            Tap {
                lo,
                hi,
                weight: src - lo as f32,
            }
        })
        .collect()
}

/// Bilinearly resamples every channel of a `(channels, height, width)` array
/// to `(out_height, out_width)`.
///
/// Pixel centres sit at half-integer coordinates and edge pixels are
/// replicated, matching `interpolate(mode="bilinear", align_corners=False)`.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` if the input or the output has
/// a zero-sized spatial axis.
pub fn interpolate_bilinear(
    input: ArrayView3<'_, f32>,
    size: (usize, usize),
) -> PreprocessResult<Tensor3D> {
    let (channels, in_h, in_w) = input.dim();
    let (out_h, out_w) = size;
    if in_h == 0 || in_w == 0 || out_h == 0 || out_w == 0 {
        return Err(PreprocessError::invalid_argument(format!(
            "cannot interpolate {in_h}x{in_w} to {out_h}x{out_w}"
        )));
    }

    let rows = taps(in_h, out_h);
    let cols = taps(in_w, out_w);
    let mut output = Tensor3D::zeros((channels, out_h, out_w));

    for (src, mut dst) in input.outer_iter().zip(output.outer_iter_mut()) {
        for (y, row) in rows.iter().enumerate() {
            for (x, col) in cols.iter().enumerate() {
                let top = src[[row.lo, col.lo]] * (1.0 - col.weight)
                    + src[[row.lo, col.hi]] * col.weight;
                let bottom = src[[row.hi, col.lo]] * (1.0 - col.weight)
                    + src[[row.hi, col.hi]] * col.weight;
                dst[[y, x]] = top * (1.0 - row.weight) + bottom * row.weight;
            }
        }
    }
    Ok(output)
}

/// Applies a numerically stable softmax over the class axis (axis 0) in place.
pub fn softmax_classes(logits: &mut Tensor3D) {
    for mut lane in logits.lanes_mut(Axis(0)) {
        let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        lane.mapv_inplace(|v| (v - max).exp());
        let sum = lane.sum();
        if sum > 0.0 {
            lane.mapv_inplace(|v| v / sum);
        }
    }
}

fn parse_target_size(size: &[usize], index: usize) -> PreprocessResult<(usize, usize)> {
    match *size {
        [h, w] if h > 0 && w > 0 => Ok((h, w)),
        [h, w] => Err(PreprocessError::invalid_argument(format!(
            "target size {index} must be positive, got ({h}, {w})"
        ))),
        _ => Err(PreprocessError::invalid_argument(format!(
            "each element of target_sizes must contain the (height, width) of one image, \
             but element {index} has {} entries",
            size.len()
        ))),
    }
}

fn logits_to_probabilities(
    logits: ArrayView3<'_, f32>,
    size: (usize, usize),
) -> PreprocessResult<Tensor3D> {
    let mut resized = interpolate_bilinear(logits, size)?;
    softmax_classes(&mut resized);
    Ok(resized)
}

/// Converts per-image class logits into class probabilities at the requested
/// output sizes.
///
/// # Arguments
///
/// * `logits` - One `(num_classes, height, width)` logit map per image.
/// * `target_sizes` - One `(height, width)` pair per image, e.g. `[h, w]`.
///
/// # Returns
///
/// One `(num_classes, target_height, target_width)` array per image whose
/// values sum to 1 over the class axis at every pixel.
///
/// # Errors
///
/// Returns `PreprocessError::InvalidArgument` if the number of target sizes
/// differs from the number of logit maps, or a target size is not a pair of
/// positive integers.
pub fn to_segmentation_probabilities<S: AsRef<[usize]>>(
    logits: &[Tensor3D],
    target_sizes: &[S],
) -> PreprocessResult<Vec<Tensor3D>> {
    let views: Vec<_> = logits.iter().map(|l| l.view()).collect();
    probabilities_from_views(&views, target_sizes)
}

fn probabilities_from_views<S: AsRef<[usize]>>(
    logits: &[ArrayView3<'_, f32>],
    target_sizes: &[S],
) -> PreprocessResult<Vec<Tensor3D>> {
    if logits.len() != target_sizes.len() {
        return Err(PreprocessError::invalid_argument(format!(
            "make sure that you pass in as many target sizes as the batch dimension of the logits \
             ({} logit maps, {} target sizes)",
            logits.len(),
            target_sizes.len()
        )));
    }

    let sizes = target_sizes
        .iter()
        .enumerate()
        .map(|(i, size)| parse_target_size(size.as_ref(), i))
        .collect::<PreprocessResult<Vec<_>>>()?;

    debug!(batch = logits.len(), "post-processing segmentation logits");

    if logits.len() > DEFAULT_PARALLEL_THRESHOLD {
        logits
            .par_iter()
            .zip(sizes.par_iter())
            .map(|(l, &size)| logits_to_probabilities(l.view(), size))
            .collect()
    } else {
        logits
            .iter()
            .zip(&sizes)
            .map(|(l, &size)| logits_to_probabilities(l.view(), size))
            .collect()
    }
}

/// Like [`to_segmentation_probabilities`], for a batched
/// `(batch, num_classes, height, width)` logit tensor.
pub fn post_process_semantic<S: AsRef<[usize]>>(
    logits: &Tensor4D,
    target_sizes: &[S],
) -> PreprocessResult<Vec<Tensor3D>> {
    let views: Vec<_> = logits.outer_iter().collect();
    probabilities_from_views(&views, target_sizes)
}

/// Reduces `(num_classes, height, width)` scores to a class map holding the
/// index of the highest-scoring class at each pixel.
///
/// Ties resolve to the lowest class index.
pub fn argmax_classes(scores: &Tensor3D) -> LabelMap {
    let (_, height, width) = scores.dim();
    let mut best = Array2::<f32>::from_elem((height, width), f32::NEG_INFINITY);
    let mut classes = LabelMap::zeros((height, width));

    for (class, plane) in scores.outer_iter().enumerate() {
        Zip::from(&mut best)
            .and(&mut classes)
            .and(&plane)
            .for_each(|b, c, &v| {
                if v > *b {
                    *b = v;
                    *c = class as i64;
                }
            });
    }
    classes
}

/// Converts class probabilities (or logits) into per-pixel class maps.
pub fn to_segmentation_maps(probabilities: &[Tensor3D]) -> Vec<LabelMap> {
    probabilities.iter().map(argmax_classes).collect()
}
