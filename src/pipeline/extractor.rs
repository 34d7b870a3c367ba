//! The SegFormer feature extractor.
//!
//! Runs a batch of images (and optionally their segmentation maps) through
//! label reduction, resizing, random cropping, normalization and padding, and
//! stacks the result into a [`BatchFeature`].

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info_span};

use super::config::FeatureExtractorConfig;
use super::input::{Images, SegmentationMapInput, SegmentationMaps, validate_inputs};
use crate::core::config::ConfigValidatorExt;
use crate::core::{BatchFeature, LabelMap, PreprocessError, PreprocessResult, Tensor3D};
use crate::processors::{
    CropBox, NormalizeImage, RandomCrop, SegResize, batch_pad_target, crop_image,
    crop_segmentation_map, pad_image, pad_segmentation_map, reduce_zero_label,
};
use crate::utils::tensor::{stack_images, stack_label_maps};

/// One image and its optional segmentation map, kept together through every
/// stage that changes the spatial size.
type Example = (Tensor3D, Option<LabelMap>);

/// Prepares images and segmentation maps for a SegFormer-style model.
///
/// The configuration is validated once at construction and never changes
/// afterwards.
#[derive(Debug, Clone)]
pub struct SegformerFeatureExtractor {
    config: FeatureExtractorConfig,
    resize: Option<SegResize>,
    crop: Option<RandomCrop>,
    normalize: Option<NormalizeImage>,
}

impl SegformerFeatureExtractor {
    /// Creates a feature extractor from a configuration.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessError::Config` if the configuration is invalid.
    pub fn new(config: FeatureExtractorConfig) -> PreprocessResult<Self> {
        let config = config.validate_and_wrap()?;

        let resize = if config.do_resize {
            Some(SegResize::new(
                config.image_scale,
                config.keep_ratio,
                config.align,
                config.size_divisor,
                config.resample,
            )?)
        } else {
            None
        };
        let crop = if config.do_random_crop {
            Some(RandomCrop::new(config.crop_size)?)
        } else {
            None
        };
        let normalize = if config.do_normalize {
            Some(NormalizeImage::new(
                Some(config.image_mean.clone()),
                Some(config.image_std.clone()),
            )?)
        } else {
            None
        };

        Ok(Self {
            config,
            resize,
            crop,
            normalize,
        })
    }

    /// The configuration this extractor was built from.
    pub fn config(&self) -> &FeatureExtractorConfig {
        &self.config
    }

    /// Preprocesses images and optional segmentation maps, drawing crop
    /// offsets from the thread-local RNG.
    ///
    /// See [`preprocess_with_rng`](Self::preprocess_with_rng).
    pub fn preprocess(
        &self,
        images: impl Into<Images>,
        segmentation_maps: Option<SegmentationMaps>,
    ) -> PreprocessResult<BatchFeature> {
        self.preprocess_with_rng(images, segmentation_maps, &mut rand::thread_rng())
    }

    /// Preprocesses images and optional segmentation maps.
    ///
    /// The whole batch is validated before any work is done. A single image
    /// produces a batch of one. When maps are given, each goes through the
    /// same geometric transforms as its image and the result carries
    /// `labels`.
    ///
    /// # Arguments
    ///
    /// * `images` - A single image or a batch of images.
    /// * `segmentation_maps` - Maps paired with the images, in the same form.
    /// * `rng` - Source of randomness for crop offsets.
    ///
    /// # Errors
    ///
    /// * `PreprocessError::InvalidArgument` for unsupported or mismatched
    ///   inputs, naming the offending position, or for a batch whose examples
    ///   end up with different sizes while padding is disabled.
    /// * `PreprocessError::InvalidState` if an exact resize target is not a
    ///   multiple of `size_divisor`.
    pub fn preprocess_with_rng<R: Rng>(
        &self,
        images: impl Into<Images>,
        segmentation_maps: Option<SegmentationMaps>,
        rng: &mut R,
    ) -> PreprocessResult<BatchFeature> {
        let images = images.into();
        let sizes = validate_inputs(&images, segmentation_maps.as_ref())?;
        if let Some(resize) = &self.resize {
            self.config.check_fixed_target()?;
            check_resize_outputs(resize, &sizes, images.is_batch())?;
        }

        let batch_size = sizes.len();
        let has_maps = segmentation_maps.is_some();
        let _span = info_span!("preprocess", batch_size, has_maps).entered();

        let maps: Vec<Option<SegmentationMapInput>> = match segmentation_maps {
            Some(maps) => maps.into_vec().into_iter().map(Some).collect(),
            None => vec![None; batch_size],
        };
        let inputs: Vec<_> = images.into_vec().into_iter().zip(maps).collect();

        let mut examples = self.map_examples(inputs, |(image, map)| {
            let image = image.to_canonical()?;
            let map = map.map(|m| m.to_label_map()).transpose()?;
            Ok((image, map))
        })?;

        if self.config.reduce_zero_label && has_maps {
            examples = self.map_examples(examples, |(image, map)| {
                Ok((image, map.as_ref().map(reduce_zero_label)))
            })?;
        }

        if let Some(resize) = &self.resize {
            examples = self.map_examples(examples, |(image, map)| {
                let image = resize.resize_image(&image)?;
                let map = map
                    .map(|m| resize.resize_segmentation_map(&m))
                    .transpose()?;
                Ok((image, map))
            })?;
            debug!(sizes = ?spatial_sizes(&examples), "resized batch");
        }

        if let Some(crop) = &self.crop {
            // Boxes are drawn in order before any parallel work so a seeded
            // RNG gives the same crops regardless of the thread count.
            let boxes: Vec<CropBox> = examples
                .iter()
                .map(|(image, _)| {
                    let (_, height, width) = image.dim();
                    crop.sample(height, width, rng)
                })
                .collect();
            let pairs: Vec<_> = examples.into_iter().zip(boxes).collect();
            examples = self.map_examples(pairs, |((image, map), bbox)| {
                let image = crop_image(&image, bbox)?;
                let map = map
                    .map(|m| crop_segmentation_map(&m, bbox))
                    .transpose()?;
                Ok((image, map))
            })?;
            debug!(sizes = ?spatial_sizes(&examples), "cropped batch");
        }

        let (mut images, maps): (Vec<Tensor3D>, Vec<Option<LabelMap>>) =
            examples.into_iter().unzip();

        if let Some(normalize) = &self.normalize {
            normalize.apply_batch(&mut images, self.config.parallel_threshold)?;
        }

        let mut examples: Vec<Example> = images.into_iter().zip(maps).collect();

        if self.config.do_pad {
            let target = batch_pad_target(spatial_sizes(&examples), self.config.crop_size);
            let image_value = self.config.padding_value;
            let map_value = self.config.segmentation_padding_value;
            examples = self.map_examples(examples, |(image, map)| {
                let image = pad_image(&image, target, image_value)?;
                let map = map
                    .map(|m| pad_segmentation_map(&m, target, map_value))
                    .transpose()?;
                Ok((image, map))
            })?;
            debug!(?target, "padded batch");
        }

        let (images, maps): (Vec<Tensor3D>, Vec<Option<LabelMap>>) =
            examples.into_iter().unzip();
        let pixel_values = stack_images(&images)?;
        let labels = if has_maps {
            let maps: Vec<LabelMap> = maps.into_iter().flatten().collect();
            Some(stack_label_maps(&maps)?)
        } else {
            None
        };

        debug!(shape = ?pixel_values.shape(), "assembled batch");
        Ok(BatchFeature {
            pixel_values,
            labels,
        })
    }

    /// Applies `f` to every item, on the rayon pool once the batch exceeds the
    /// configured parallel threshold. Order is preserved and the first error
    /// aborts the batch.
    fn map_examples<T, F>(&self, items: Vec<T>, f: F) -> PreprocessResult<Vec<Example>>
    where
        T: Send,
        F: Fn(T) -> PreprocessResult<Example> + Sync + Send,
    {
        if items.len() > self.config.parallel_threshold {
            items.into_par_iter().map(f).collect()
        } else {
            items.into_iter().map(f).collect()
        }
    }
}

/// Computes every image's resize output up front so an unaligned exact resize
/// fails before any image is transformed.
fn check_resize_outputs(
    resize: &SegResize,
    sizes: &[(usize, usize)],
    batched: bool,
) -> PreprocessResult<()> {
    let total = sizes.len();
    for (i, &(height, width)) in sizes.iter().enumerate() {
        resize
            .output_size((width as u32, height as u32))
            .map_err(|e| match e {
                PreprocessError::InvalidState { message } => {
                    let position = if batched {
                        format!("image {} of {total}", i + 1)
                    } else {
                        "image".to_string()
                    };
                    PreprocessError::invalid_state(format!("{position}: {message}"))
                }
                other => other,
            })?;
    }
    Ok(())
}

fn spatial_sizes(examples: &[Example]) -> Vec<(usize, usize)> {
    examples
        .iter()
        .map(|(image, _)| {
            let (_, h, w) = image.dim();
            (h, w)
        })
        .collect()
}
