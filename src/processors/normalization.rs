//! Per-channel image normalization.
//!
//! Images reaching this stage are canonical `(channels, height, width)` arrays
//! already rescaled to `[0, 1]`, so normalization is the affine map
//! `(x - mean[c]) / std[c]`, stored as `x * alpha[c] + beta[c]`.

use ndarray::Axis;
use rayon::prelude::*;

use crate::core::{
    IMAGENET_DEFAULT_MEAN, IMAGENET_DEFAULT_STD, NUM_CHANNELS, PreprocessError,
    PreprocessResult, Tensor3D,
};

/// Normalizes canonical images with a per-channel mean and standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeImage {
    /// Per-channel mean.
    pub mean: Vec<f32>,
    /// Per-channel standard deviation.
    pub std: Vec<f32>,
    /// Scaling factors for each channel (alpha = 1 / std)
    alpha: Vec<f32>,
    /// Offset values for each channel (beta = -mean / std)
    beta: Vec<f32>,
}

impl NormalizeImage {
    /// Creates a new NormalizeImage instance.
    ///
    /// # Arguments
    ///
    /// * `mean` - Optional mean values for each channel (defaults to the ImageNet mean)
    /// * `std` - Optional standard deviation values for each channel (defaults to the ImageNet std)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * Mean or std vectors don't have exactly 3 elements
    /// * Any value is not finite
    /// * Any standard deviation value is less than or equal to 0
    pub fn new(mean: Option<Vec<f32>>, std: Option<Vec<f32>>) -> PreprocessResult<Self> {
        let mean = mean.unwrap_or_else(|| IMAGENET_DEFAULT_MEAN.to_vec());
        let std = std.unwrap_or_else(|| IMAGENET_DEFAULT_STD.to_vec());

        if mean.len() != NUM_CHANNELS {
            return Err(PreprocessError::config_error(format!(
                "Mean must have exactly {NUM_CHANNELS} elements for RGB, got {}",
                mean.len()
            )));
        }
        if std.len() != NUM_CHANNELS {
            return Err(PreprocessError::config_error(format!(
                "Std must have exactly {NUM_CHANNELS} elements for RGB, got {}",
                std.len()
            )));
        }
        for (i, &m) in mean.iter().enumerate() {
            if !m.is_finite() {
                return Err(PreprocessError::config_error(format!(
                    "Mean value at index {i} is not finite: {m}"
                )));
            }
        }
        for (i, &s) in std.iter().enumerate() {
            if !s.is_finite() || s <= 0.0 {
                return Err(PreprocessError::config_error(format!(
                    "Standard deviation at index {i} must be greater than 0, got {s}"
                )));
            }
        }

        Ok(Self::from_stats(mean, std))
    }

    fn from_stats(mean: Vec<f32>, std: Vec<f32>) -> Self {
        let alpha: Vec<f32> = std.iter().map(|s| 1.0 / s).collect();
        let beta: Vec<f32> = mean.iter().zip(&std).map(|(m, s)| -m / s).collect();
        Self {
            mean,
            std,
            alpha,
            beta,
        }
    }

    fn check_channels(&self, image: &Tensor3D) -> PreprocessResult<()> {
        let channels = image.len_of(Axis(0));
        if channels != self.alpha.len() {
            return Err(PreprocessError::invalid_argument(format!(
                "cannot normalize an image with {channels} channels using {} channel statistics",
                self.alpha.len()
            )));
        }
        Ok(())
    }

    /// Normalizes one image, returning a new array.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessError::InvalidArgument` if the channel count does not
    /// match the statistics.
    pub fn apply(&self, image: &Tensor3D) -> PreprocessResult<Tensor3D> {
        let mut out = image.clone();
        self.apply_inplace(&mut out)?;
        Ok(out)
    }

    /// Normalizes one image in place.
    pub fn apply_inplace(&self, image: &mut Tensor3D) -> PreprocessResult<()> {
        self.check_channels(image)?;
        for (c, mut plane) in image.axis_iter_mut(Axis(0)).enumerate() {
            let (alpha, beta) = (self.alpha[c], self.beta[c]);
            plane.mapv_inplace(|v| v * alpha + beta);
        }
        Ok(())
    }

    /// Normalizes a batch of images, in parallel when the batch is large
    /// enough to amortise the rayon overhead.
    pub fn apply_batch(
        &self,
        images: &mut [Tensor3D],
        parallel_threshold: usize,
    ) -> PreprocessResult<()> {
        if images.len() > parallel_threshold {
            images
                .par_iter_mut()
                .try_for_each(|image| self.apply_inplace(image))
        } else {
            images
                .iter_mut()
                .try_for_each(|image| self.apply_inplace(image))
        }
    }

    /// Reverts [`apply`](Self::apply): `x * std[c] + mean[c]`.
    pub fn denormalize(&self, image: &Tensor3D) -> PreprocessResult<Tensor3D> {
        self.check_channels(image)?;
        let mut out = image.clone();
        for (c, mut plane) in out.axis_iter_mut(Axis(0)).enumerate() {
            let (std, mean) = (self.std[c], self.mean[c]);
            plane.mapv_inplace(|v| v * std + mean);
        }
        Ok(out)
    }
}

impl Default for NormalizeImage {
    fn default() -> Self {
        Self::from_stats(IMAGENET_DEFAULT_MEAN.to_vec(), IMAGENET_DEFAULT_STD.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_per_channel() -> PreprocessResult<()> {
        let normalizer =
            NormalizeImage::new(Some(vec![0.5, 0.5, 0.5]), Some(vec![0.5, 0.5, 0.5]))?;
        let image = Tensor3D::from_shape_fn((3, 2, 2), |(c, _, _)| c as f32 * 0.5);
        let out = normalizer.apply(&image)?;
        assert!((out[[0, 0, 0]] + 1.0).abs() < 1e-6);
        assert!(out[[1, 1, 1]].abs() < 1e-6);
        assert!((out[[2, 0, 1]] - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_normalize_round_trip() -> PreprocessResult<()> {
        let normalizer = NormalizeImage::new(None, None)?;
        let image = Tensor3D::from_shape_fn((3, 4, 5), |(c, y, x)| {
            ((c * 20 + y * 5 + x) % 17) as f32 / 16.0
        });
        let restored = normalizer.denormalize(&normalizer.apply(&image)?)?;
        for (a, b) in image.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_default_uses_imagenet_statistics() -> PreprocessResult<()> {
        assert_eq!(NormalizeImage::default(), NormalizeImage::new(None, None)?);
        assert_eq!(NormalizeImage::default().mean, IMAGENET_DEFAULT_MEAN.to_vec());
        Ok(())
    }

    #[test]
    fn test_invalid_statistics_rejected() {
        assert!(NormalizeImage::new(Some(vec![0.5, 0.5]), None).is_err());
        assert!(NormalizeImage::new(None, Some(vec![0.2, 0.0, 0.2])).is_err());
        assert!(NormalizeImage::new(None, Some(vec![0.2, -1.0, 0.2])).is_err());
    }

    #[test]
    fn test_wrong_channel_count_rejected() -> PreprocessResult<()> {
        let normalizer = NormalizeImage::new(None, None)?;
        assert!(normalizer.apply(&Tensor3D::zeros((1, 2, 2))).is_err());
        Ok(())
    }

    #[test]
    fn test_apply_batch_parallel_matches_sequential() -> PreprocessResult<()> {
        let normalizer = NormalizeImage::new(None, None)?;
        let images: Vec<Tensor3D> = (0..6)
            .map(|i| Tensor3D::from_elem((3, 3, 3), i as f32 / 6.0))
            .collect();

        let mut sequential = images.clone();
        normalizer.apply_batch(&mut sequential, usize::MAX)?;
        let mut parallel = images;
        normalizer.apply_batch(&mut parallel, 0)?;
        assert_eq!(sequential, parallel);
        Ok(())
    }
}
