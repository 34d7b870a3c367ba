//! Inputs accepted by the feature extractor.
//!
//! Images and segmentation maps arrive in one of a few concrete forms. They
//! are validated and converted to the canonical representation once, when a
//! batch enters the pipeline; no stage ever looks at the original form.

use image::{ColorType, DynamicImage};
use ndarray::{Array2, Array3, Axis};

use crate::core::{LabelMap, NUM_CHANNELS, PreprocessError, PreprocessResult, Tensor3D};
use crate::utils::image::{
    chw_u8_to_chw, clamp_unit_range, dynamic_to_chw, dynamic_to_label_map, hwc_u8_to_chw,
};

/// One input image.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// A decoded image. Any colour type is converted to RGB, 8/16-bit values
    /// are rescaled to `[0, 1]`.
    Image(DynamicImage),
    /// 8-bit pixels, rescaled by `1/255`.
    ///
    /// The layout is `(height, width, channels)`, or `(channels, height, width)`
    /// when the first axis has 3 entries and the last does not.
    PixelArray(Array3<u8>),
    /// Floating point pixels in `(channels, height, width)` layout, clamped
    /// to `[0, 1]`.
    PixelTensor(Array3<f32>),
}

/// Whether a pixel array is laid out `(channels, height, width)`.
fn is_channels_first(pixels: &Array3<u8>) -> bool {
    pixels.len_of(Axis(0)) == NUM_CHANNELS && pixels.len_of(Axis(2)) != NUM_CHANNELS
}

impl ImageInput {
    /// Short description of the input kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ImageInput::Image(_) => "decoded image",
            ImageInput::PixelArray(pixels) if is_channels_first(pixels) => "CHW u8 pixel array",
            ImageInput::PixelArray(_) => "HWC u8 pixel array",
            ImageInput::PixelTensor(_) => "CHW f32 pixel tensor",
        }
    }

    /// The number of channels the input carries as given.
    pub fn channels(&self) -> usize {
        match self {
            ImageInput::Image(img) => img.color().channel_count() as usize,
            ImageInput::PixelArray(pixels) if is_channels_first(pixels) => pixels.len_of(Axis(0)),
            ImageInput::PixelArray(pixels) => pixels.len_of(Axis(2)),
            ImageInput::PixelTensor(tensor) => tensor.len_of(Axis(0)),
        }
    }

    /// Spatial size as `(height, width)`.
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            ImageInput::Image(img) => (img.height() as usize, img.width() as usize),
            ImageInput::PixelArray(pixels) if is_channels_first(pixels) => {
                let (_, h, w) = pixels.dim();
                (h, w)
            }
            ImageInput::PixelArray(pixels) => {
                let (h, w, _) = pixels.dim();
                (h, w)
            }
            ImageInput::PixelTensor(tensor) => {
                let (_, h, w) = tensor.dim();
                (h, w)
            }
        }
    }

    /// Checks that the input can be converted, returning its `(height, width)`.
    ///
    /// The error message says what was wrong; callers attach the position.
    pub fn check(&self) -> Result<(usize, usize), String> {
        let (height, width) = self.dimensions();
        if height == 0 || width == 0 {
            return Err(format!("{} has empty size {height}x{width}", self.kind()));
        }
        // Decoded images of any colour type are converted to RGB.
        if !matches!(self, ImageInput::Image(_)) && self.channels() != NUM_CHANNELS {
            return Err(format!(
                "unsupported {} with {} channels, expected {NUM_CHANNELS}",
                self.kind(),
                self.channels()
            ));
        }
        Ok((height, width))
    }

    /// Converts the input into a canonical `(3, height, width)` tensor.
    pub fn to_canonical(&self) -> PreprocessResult<Tensor3D> {
        match self {
            ImageInput::Image(img) => dynamic_to_chw(img),
            ImageInput::PixelArray(pixels) if is_channels_first(pixels) => {
                Ok(chw_u8_to_chw(pixels))
            }
            ImageInput::PixelArray(pixels) => Ok(hwc_u8_to_chw(pixels)),
            ImageInput::PixelTensor(tensor) => Ok(clamp_unit_range(tensor)),
        }
    }
}

impl From<DynamicImage> for ImageInput {
    fn from(image: DynamicImage) -> Self {
        ImageInput::Image(image)
    }
}

impl From<Array3<u8>> for ImageInput {
    fn from(pixels: Array3<u8>) -> Self {
        ImageInput::PixelArray(pixels)
    }
}

impl From<Array3<f32>> for ImageInput {
    fn from(tensor: Array3<f32>) -> Self {
        ImageInput::PixelTensor(tensor)
    }
}

/// One input segmentation map.
#[derive(Debug, Clone)]
pub enum SegmentationMapInput {
    /// A single-channel (8 or 16-bit luma) image whose values are class ids.
    Image(DynamicImage),
    /// Class ids in `(height, width)` layout.
    Array(Array2<i64>),
}

impl SegmentationMapInput {
    /// Spatial size as `(height, width)`.
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            SegmentationMapInput::Image(img) => (img.height() as usize, img.width() as usize),
            SegmentationMapInput::Array(map) => map.dim(),
        }
    }

    /// Checks that the map can be converted, returning its `(height, width)`.
    pub fn check(&self) -> Result<(usize, usize), String> {
        if let SegmentationMapInput::Image(img) = self {
            let color = img.color();
            if !matches!(color, ColorType::L8 | ColorType::L16) {
                return Err(format!(
                    "unsupported segmentation map image of colour type {color:?}, \
                     expected a single-channel image"
                ));
            }
        }
        Ok(self.dimensions())
    }

    /// Converts the map into a canonical label map.
    pub fn to_label_map(&self) -> PreprocessResult<LabelMap> {
        match self {
            SegmentationMapInput::Image(img) => dynamic_to_label_map(img),
            SegmentationMapInput::Array(map) => Ok(map.clone()),
        }
    }
}

impl From<DynamicImage> for SegmentationMapInput {
    fn from(image: DynamicImage) -> Self {
        SegmentationMapInput::Image(image)
    }
}

impl From<Array2<i64>> for SegmentationMapInput {
    fn from(map: Array2<i64>) -> Self {
        SegmentationMapInput::Array(map)
    }
}

/// A single image or a batch of images.
#[derive(Debug, Clone)]
pub enum Images {
    /// One example; the output still has a batch axis of length 1.
    Single(ImageInput),
    /// A batch of examples.
    Batch(Vec<ImageInput>),
}

impl Images {
    /// Whether the input was given as a batch.
    pub fn is_batch(&self) -> bool {
        matches!(self, Images::Batch(_))
    }

    /// The inputs as a list, a single example becoming a list of one.
    pub fn into_vec(self) -> Vec<ImageInput> {
        match self {
            Images::Single(image) => vec![image],
            Images::Batch(images) => images,
        }
    }

    /// Borrowed view of the inputs as a slice.
    pub fn as_slice(&self) -> &[ImageInput] {
        match self {
            Images::Single(image) => std::slice::from_ref(image),
            Images::Batch(images) => images,
        }
    }
}

/// Implements `From<$t>` (single example) and `From<Vec<$t>>` (batch) for a
/// batch enum whose variants wrap `$item`.
macro_rules! impl_batch_from {
    ($batch:ident, $item:ty, [$($t:ty),* $(,)?]) => {
        $(
            impl From<$t> for $batch {
                fn from(value: $t) -> Self {
                    $batch::Single(<$item>::from(value))
                }
            }

            impl From<Vec<$t>> for $batch {
                fn from(values: Vec<$t>) -> Self {
                    $batch::Batch(values.into_iter().map(<$item>::from).collect())
                }
            }
        )*
    };
}

impl From<ImageInput> for Images {
    fn from(image: ImageInput) -> Self {
        Images::Single(image)
    }
}

impl From<Vec<ImageInput>> for Images {
    fn from(images: Vec<ImageInput>) -> Self {
        Images::Batch(images)
    }
}

impl_batch_from!(Images, ImageInput, [DynamicImage, Array3<u8>, Array3<f32>]);

/// A single segmentation map or a batch of them.
#[derive(Debug, Clone)]
pub enum SegmentationMaps {
    /// One map, paired with a single image.
    Single(SegmentationMapInput),
    /// A batch of maps, paired with a batch of images.
    Batch(Vec<SegmentationMapInput>),
}

impl SegmentationMaps {
    /// Whether the maps were given as a batch.
    pub fn is_batch(&self) -> bool {
        matches!(self, SegmentationMaps::Batch(_))
    }

    /// The maps as a list, a single map becoming a list of one.
    pub fn into_vec(self) -> Vec<SegmentationMapInput> {
        match self {
            SegmentationMaps::Single(map) => vec![map],
            SegmentationMaps::Batch(maps) => maps,
        }
    }

    /// Borrowed view of the maps as a slice.
    pub fn as_slice(&self) -> &[SegmentationMapInput] {
        match self {
            SegmentationMaps::Single(map) => std::slice::from_ref(map),
            SegmentationMaps::Batch(maps) => maps,
        }
    }
}

impl From<SegmentationMapInput> for SegmentationMaps {
    fn from(map: SegmentationMapInput) -> Self {
        SegmentationMaps::Single(map)
    }
}

impl From<Vec<SegmentationMapInput>> for SegmentationMaps {
    fn from(maps: Vec<SegmentationMapInput>) -> Self {
        SegmentationMaps::Batch(maps)
    }
}

impl_batch_from!(SegmentationMaps, SegmentationMapInput, [DynamicImage, Array2<i64>]);

/// Validates a whole batch descriptor before any processing, returning the
/// `(height, width)` of every image.
///
/// Errors name the offending position and whether a single example or a batch
/// was given.
pub fn validate_inputs(
    images: &Images,
    segmentation_maps: Option<&SegmentationMaps>,
) -> PreprocessResult<Vec<(usize, usize)>> {
    let batched = images.is_batch();
    let items = images.as_slice();
    let total = items.len();

    let sizes = items
        .iter()
        .enumerate()
        .map(|(i, image)| {
            image.check().map_err(|reason| {
                PreprocessError::batch_item_error("image", i, total, batched, reason)
            })
        })
        .collect::<PreprocessResult<Vec<_>>>()?;

    let Some(maps) = segmentation_maps else {
        return Ok(sizes);
    };

    if maps.is_batch() != batched {
        let (expected, got) = if batched {
            ("a batch of segmentation maps", "a single map")
        } else {
            ("a single segmentation map", "a batch of maps")
        };
        return Err(PreprocessError::invalid_argument(format!(
            "images were given as {}, so segmentation maps must be {expected}, got {got}",
            if batched { "a batch of examples" } else { "a single example" }
        )));
    }

    let map_items = maps.as_slice();
    if map_items.len() != total {
        return Err(PreprocessError::invalid_argument(format!(
            "got {total} images but {} segmentation maps",
            map_items.len()
        )));
    }

    for (i, (map, &(height, width))) in map_items.iter().zip(&sizes).enumerate() {
        let (map_h, map_w) = map.check().map_err(|reason| {
            PreprocessError::batch_item_error("segmentation map", i, total, batched, reason)
        })?;
        if (map_h, map_w) != (height, width) {
            return Err(PreprocessError::batch_item_error(
                "segmentation map",
                i,
                total,
                batched,
                format!("size {map_h}x{map_w} differs from its image size {height}x{width}"),
            ));
        }
    }

    Ok(sizes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage, RgbaImage};

    #[test]
    fn test_image_input_dimensions() {
        let img: ImageInput = DynamicImage::ImageRgb8(RgbImage::new(30, 20)).into();
        assert_eq!(img.dimensions(), (20, 30));
        let pixels: ImageInput = Array3::<u8>::zeros((20, 30, 3)).into();
        assert_eq!(pixels.dimensions(), (20, 30));
        let tensor: ImageInput = Array3::<f32>::zeros((3, 20, 30)).into();
        assert_eq!(tensor.dimensions(), (20, 30));
    }

    #[test]
    fn test_canonical_forms_agree() -> PreprocessResult<()> {
        let mut rgb = RgbImage::new(2, 2);
        rgb.put_pixel(1, 0, image::Rgb([255, 51, 0]));
        let from_image = ImageInput::from(DynamicImage::ImageRgb8(rgb.clone())).to_canonical()?;

        let hwc = Array3::from_shape_vec((2, 2, 3), rgb.into_raw())?;
        let from_pixels = ImageInput::from(hwc).to_canonical()?;

        for (a, b) in from_image.iter().zip(from_pixels.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        assert!((from_pixels[[1, 0, 1]] - 0.2).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_channels_first_pixels_match_channels_last() -> PreprocessResult<()> {
        let hwc = Array3::from_shape_fn((2, 5, 3), |(y, x, c)| (y * 50 + x * 10 + c) as u8);
        let chw = hwc.view().permuted_axes([2, 0, 1]).as_standard_layout().into_owned();

        let input = ImageInput::from(chw);
        assert_eq!(input.check(), Ok((2, 5)));
        assert_eq!(input.channels(), 3);
        assert_eq!(input.kind(), "CHW u8 pixel array");
        assert_eq!(input.to_canonical()?, ImageInput::from(hwc).to_canonical()?);
        Ok(())
    }

    #[test]
    fn test_three_by_three_trailing_axis_stays_channels_last() {
        // Ambiguous (3, w, 3) arrays are read as HWC.
        let input = ImageInput::from(Array3::<u8>::zeros((3, 7, 3)));
        assert_eq!(input.dimensions(), (3, 7));
        assert_eq!(input.kind(), "HWC u8 pixel array");
    }

    #[test]
    fn test_pixel_tensor_clamped_to_unit_range() -> PreprocessResult<()> {
        let tensor = Array3::from_shape_vec((3, 1, 2), vec![-0.5, 0.25, 1.5, 1.0, 0.0, 2.0])?;
        let canonical = ImageInput::from(tensor).to_canonical()?;
        let values: Vec<f32> = canonical.iter().copied().collect();
        assert_eq!(values, vec![0.0, 0.25, 1.0, 1.0, 0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_rgba_image_is_accepted() {
        let img = ImageInput::from(DynamicImage::ImageRgba8(RgbaImage::new(4, 4)));
        assert_eq!(img.check(), Ok((4, 4)));
    }

    #[test]
    fn test_wrong_channel_count_names_index() {
        let images = Images::from(vec![
            Array3::<f32>::zeros((3, 8, 8)),
            Array3::<f32>::zeros((4, 8, 8)),
        ]);
        let err = validate_inputs(&images, None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("image 2 of 2"));
        assert!(message.contains("4 channels"));
        assert!(message.contains("batch of examples"));
    }

    #[test]
    fn test_empty_image_rejected() {
        let images = Images::from(Array3::<u8>::zeros((0, 8, 3)));
        let err = validate_inputs(&images, None).unwrap_err();
        assert!(err.to_string().contains("single example"));
    }

    #[test]
    fn test_single_and_batch_forms_must_agree() {
        let images = Images::from(vec![Array3::<f32>::zeros((3, 8, 8))]);
        let maps = SegmentationMaps::from(LabelMap::zeros((8, 8)));
        assert!(validate_inputs(&images, Some(&maps)).is_err());
    }

    #[test]
    fn test_map_count_and_size_checked() {
        let images = Images::from(vec![
            Array3::<f32>::zeros((3, 8, 8)),
            Array3::<f32>::zeros((3, 8, 6)),
        ]);
        let maps = SegmentationMaps::from(vec![LabelMap::zeros((8, 8))]);
        assert!(validate_inputs(&images, Some(&maps)).is_err());

        let maps = SegmentationMaps::from(vec![LabelMap::zeros((8, 8)), LabelMap::zeros((8, 8))]);
        let err = validate_inputs(&images, Some(&maps)).unwrap_err();
        assert!(err.to_string().contains("segmentation map 2 of 2"));
    }

    #[test]
    fn test_rgb_segmentation_map_rejected() {
        let images = Images::from(Array3::<f32>::zeros((3, 4, 4)));
        let maps = SegmentationMaps::from(DynamicImage::ImageRgb8(RgbImage::new(4, 4)));
        let err = validate_inputs(&images, Some(&maps)).unwrap_err();
        assert!(err.to_string().contains("single-channel"));

        let maps = SegmentationMaps::from(DynamicImage::ImageLuma8(GrayImage::new(4, 4)));
        assert_eq!(validate_inputs(&images, Some(&maps)).unwrap(), vec![(4, 4)]);
    }
}
