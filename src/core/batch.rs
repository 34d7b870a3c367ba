//! Tensor aliases and the batched output of the feature extractor.

use ndarray::{Array2, Array3, Array4};

/// A 3-dimensional tensor of f32 values, `(channels, height, width)` for images.
pub type Tensor3D = Array3<f32>;

/// A 4-dimensional tensor of f32 values, `(batch, channels, height, width)`.
pub type Tensor4D = Array4<f32>;

/// A single segmentation label map, `(height, width)`.
pub type LabelMap = Array2<i64>;

/// A batch of segmentation label maps, `(batch, height, width)`.
pub type LabelBatch = Array3<i64>;

/// Output of one feature extractor call.
///
/// Mirrors a `{"pixel_values": ..., "labels": ...}` mapping; `labels` is only
/// present when segmentation maps were supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFeature {
    /// Stacked images, shape `(batch, channels, height, width)`.
    pub pixel_values: Tensor4D,
    /// Stacked label maps, shape `(batch, height, width)`.
    pub labels: Option<LabelBatch>,
}

impl BatchFeature {
    /// Number of examples in the batch.
    pub fn batch_size(&self) -> usize {
        self.pixel_values.shape()[0]
    }

    /// Returns true if the batch holds no examples.
    pub fn is_empty(&self) -> bool {
        self.batch_size() == 0
    }

    /// The keys present in this feature, in output order.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = vec!["pixel_values"];
        if self.labels.is_some() {
            keys.push("labels");
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_follow_labels_presence() {
        let feature = BatchFeature {
            pixel_values: Tensor4D::zeros((2, 3, 4, 4)),
            labels: None,
        };
        assert_eq!(feature.keys(), vec!["pixel_values"]);
        assert_eq!(feature.batch_size(), 2);

        let with_labels = BatchFeature {
            labels: Some(LabelBatch::zeros((2, 4, 4))),
            ..feature
        };
        assert_eq!(with_labels.keys(), vec!["pixel_values", "labels"]);
    }
}
