//! Feature extractor configuration and its file loading utilities.
//!
//! Field names follow the `preprocessor_config.json` files shipped with
//! SegFormer checkpoints, so those files load directly; keys this crate does
//! not use are ignored.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::config::{ConfigError, ConfigValidator};
use crate::core::{
    DEFAULT_CROP_SIZE, DEFAULT_IMAGE_SCALE, DEFAULT_PARALLEL_THRESHOLD,
    DEFAULT_SEGMENTATION_PADDING_VALUE, DEFAULT_SIZE_DIVISOR, IMAGENET_DEFAULT_MEAN,
    IMAGENET_DEFAULT_STD, NUM_CHANNELS, PreprocessError, PreprocessResult,
};
use crate::processors::{ImageScale, Resample, check_alignment};

fn default_true() -> bool {
    true
}

fn default_image_scale() -> ImageScale {
    ImageScale::Size(DEFAULT_IMAGE_SCALE.0, DEFAULT_IMAGE_SCALE.1)
}

fn default_size_divisor() -> u32 {
    DEFAULT_SIZE_DIVISOR
}

fn default_crop_size() -> [u32; 2] {
    DEFAULT_CROP_SIZE
}

fn default_image_mean() -> Vec<f32> {
    IMAGENET_DEFAULT_MEAN.to_vec()
}

fn default_image_std() -> Vec<f32> {
    IMAGENET_DEFAULT_STD.to_vec()
}

fn default_segmentation_padding_value() -> i64 {
    DEFAULT_SEGMENTATION_PADDING_VALUE
}

fn default_parallel_threshold() -> usize {
    DEFAULT_PARALLEL_THRESHOLD
}

/// Configuration of [`SegformerFeatureExtractor`](super::SegformerFeatureExtractor).
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureExtractorConfig {
    /// Whether to resize images and segmentation maps.
    #[serde(default = "default_true")]
    pub do_resize: bool,
    /// Whether to preserve the aspect ratio when resizing.
    #[serde(default = "default_true")]
    pub keep_ratio: bool,
    /// Resize factor, `(max_long_edge, max_short_edge)` bound, or exact
    /// `(width, height)` target when `keep_ratio` is false.
    #[serde(default = "default_image_scale")]
    pub image_scale: ImageScale,
    /// Whether to round resized sides up to a multiple of `size_divisor`.
    #[serde(default = "default_true")]
    pub align: bool,
    /// The divisor resized sides must be multiples of.
    #[serde(default = "default_size_divisor")]
    pub size_divisor: u32,
    /// Resampling filter for images.
    #[serde(default)]
    pub resample: Resample,
    /// Whether to randomly crop images and segmentation maps.
    #[serde(default = "default_true")]
    pub do_random_crop: bool,
    /// The crop (and minimum padded) size as `[width, height]`.
    #[serde(default = "default_crop_size")]
    pub crop_size: [u32; 2],
    /// Whether to normalize images with `image_mean` and `image_std`.
    #[serde(default = "default_true")]
    pub do_normalize: bool,
    /// Per-channel mean used for normalization.
    #[serde(default = "default_image_mean")]
    pub image_mean: Vec<f32>,
    /// Per-channel standard deviation used for normalization.
    #[serde(default = "default_image_std")]
    pub image_std: Vec<f32>,
    /// Whether to pad images and segmentation maps to a common size.
    #[serde(default = "default_true")]
    pub do_pad: bool,
    /// Fill value for padded image pixels.
    #[serde(default)]
    pub padding_value: f32,
    /// Fill value for padded segmentation map pixels.
    #[serde(default = "default_segmentation_padding_value")]
    pub segmentation_padding_value: i64,
    /// Whether to shift labels down by one and mark background as ignored.
    #[serde(default)]
    pub reduce_zero_label: bool,
    /// Batch size above which per-image stages run in parallel.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

impl Default for FeatureExtractorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            keep_ratio: true,
            image_scale: default_image_scale(),
            align: true,
            size_divisor: DEFAULT_SIZE_DIVISOR,
            resample: Resample::default(),
            do_random_crop: true,
            crop_size: DEFAULT_CROP_SIZE,
            do_normalize: true,
            image_mean: default_image_mean(),
            image_std: default_image_std(),
            do_pad: true,
            padding_value: 0.0,
            segmentation_padding_value: DEFAULT_SEGMENTATION_PADDING_VALUE,
            reduce_zero_label: false,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl FeatureExtractorConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether images are resized.
    pub fn with_do_resize(mut self, do_resize: bool) -> Self {
        self.do_resize = do_resize;
        self
    }

    /// Sets whether resizing preserves the aspect ratio.
    pub fn with_keep_ratio(mut self, keep_ratio: bool) -> Self {
        self.keep_ratio = keep_ratio;
        self
    }

    /// Sets the resize scale.
    pub fn with_image_scale(mut self, image_scale: ImageScale) -> Self {
        self.image_scale = image_scale;
        self
    }

    /// Sets whether resized sides are aligned to `size_divisor`.
    pub fn with_align(mut self, align: bool) -> Self {
        self.align = align;
        self
    }

    /// Sets the alignment divisor.
    pub fn with_size_divisor(mut self, size_divisor: u32) -> Self {
        self.size_divisor = size_divisor;
        self
    }

    /// Sets the image resampling filter.
    pub fn with_resample(mut self, resample: Resample) -> Self {
        self.resample = resample;
        self
    }

    /// Sets whether images are randomly cropped.
    pub fn with_do_random_crop(mut self, do_random_crop: bool) -> Self {
        self.do_random_crop = do_random_crop;
        self
    }

    /// Sets the crop size as `[width, height]`.
    pub fn with_crop_size(mut self, crop_size: [u32; 2]) -> Self {
        self.crop_size = crop_size;
        self
    }

    /// Sets whether images are normalized.
    pub fn with_do_normalize(mut self, do_normalize: bool) -> Self {
        self.do_normalize = do_normalize;
        self
    }

    /// Sets the normalization mean and standard deviation.
    pub fn with_normalization(mut self, mean: Vec<f32>, std: Vec<f32>) -> Self {
        self.image_mean = mean;
        self.image_std = std;
        self
    }

    /// Sets whether the batch is padded.
    pub fn with_do_pad(mut self, do_pad: bool) -> Self {
        self.do_pad = do_pad;
        self
    }

    /// Sets the image and segmentation map padding values.
    pub fn with_padding_values(mut self, padding_value: f32, segmentation: i64) -> Self {
        self.padding_value = padding_value;
        self.segmentation_padding_value = segmentation;
        self
    }

    /// Sets whether zero labels are reduced.
    pub fn with_reduce_zero_label(mut self, reduce_zero_label: bool) -> Self {
        self.reduce_zero_label = reduce_zero_label;
        self
    }

    /// Sets the batch size above which stages run in parallel.
    pub fn with_parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }

    /// Loads a configuration file, detecting the format from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> PreprocessResult<Self> {
        ConfigLoader::load_from_file(path.as_ref())
    }

    /// Parses a JSON configuration.
    pub fn from_json_str(content: &str) -> PreprocessResult<Self> {
        ConfigLoader::load_from_json(content)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> PreprocessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the configuration to a file, choosing the format from its extension.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> PreprocessResult<()> {
        ConfigLoader::save_to_file(self, path.as_ref())
    }
}

impl ConfigValidator for FeatureExtractorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.do_resize {
            match self.image_scale {
                ImageScale::Factor(factor) => {
                    self.validate_positive_f64(factor, "image_scale")?;
                }
                ImageScale::Size(a, b) => {
                    self.validate_image_dimensions(a, b, "image_scale")?;
                }
            }
            if self.align || !self.keep_ratio {
                self.validate_positive_u32(self.size_divisor, "size_divisor")?;
            }
        }

        if self.do_random_crop || self.do_pad {
            self.validate_image_dimensions(self.crop_size[0], self.crop_size[1], "crop_size")?;
        }

        if self.do_normalize {
            self.validate_channel_stats(&self.image_mean, NUM_CHANNELS, false, "image_mean")?;
            self.validate_channel_stats(&self.image_std, NUM_CHANNELS, true, "image_std")?;
        }

        if !self.padding_value.is_finite() {
            return Err(ConfigError::InvalidConfig {
                message: format!("padding_value must be finite, got {}", self.padding_value),
            });
        }

        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

impl FeatureExtractorConfig {
    /// Checks settings that can only fail once a batch is processed.
    ///
    /// An exact resize (`keep_ratio` false) to a fixed target that is not a
    /// multiple of `size_divisor` would fail for every image, so it is
    /// reported as `InvalidState` before any work is done.
    pub fn check_fixed_target(&self) -> PreprocessResult<()> {
        if let (true, false, ImageScale::Size(w, h)) =
            (self.do_resize, self.keep_ratio, self.image_scale)
        {
            check_alignment((w, h), self.size_divisor)?;
        }
        Ok(())
    }
}

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Loads and saves [`FeatureExtractorConfig`] files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file, auto-detecting the format from the extension
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use segformer_preprocess::pipeline::ConfigLoader;
    /// use std::path::Path;
    ///
    /// let config = ConfigLoader::load_from_file(Path::new("preprocessor_config.json"))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_from_file(path: &Path) -> PreprocessResult<FeatureExtractorConfig> {
        let format = Self::format_for(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            PreprocessError::config_error(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::load_from_string(&content, format)
    }

    /// Load configuration from a string with specified format
    pub fn load_from_string(
        content: &str,
        format: ConfigFormat,
    ) -> PreprocessResult<FeatureExtractorConfig> {
        match format {
            ConfigFormat::Toml => Self::load_from_toml(content),
            ConfigFormat::Json => Self::load_from_json(content),
        }
    }

    /// Load configuration from TOML string
    pub fn load_from_toml(content: &str) -> PreprocessResult<FeatureExtractorConfig> {
        toml::from_str(content).map_err(|e| {
            PreprocessError::config_error(format!("Failed to parse TOML config: {e}"))
        })
    }

    /// Load configuration from JSON string
    pub fn load_from_json(content: &str) -> PreprocessResult<FeatureExtractorConfig> {
        serde_json::from_str(content).map_err(|e| {
            PreprocessError::config_error(format!("Failed to parse JSON config: {e}"))
        })
    }

    /// Save configuration to a file, auto-detecting the format from the extension
    pub fn save_to_file(config: &FeatureExtractorConfig, path: &Path) -> PreprocessResult<()> {
        let format = Self::format_for(path)?;
        let content = Self::save_to_string(config, format)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save configuration to string with specified format
    pub fn save_to_string(
        config: &FeatureExtractorConfig,
        format: ConfigFormat,
    ) -> PreprocessResult<String> {
        match format {
            ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| {
                PreprocessError::config_error(format!("Failed to serialize config to TOML: {e}"))
            }),
            ConfigFormat::Json => config.to_json_string(),
        }
    }

    fn format_for(path: &Path) -> PreprocessResult<ConfigFormat> {
        ConfigFormat::from_extension(path).ok_or_else(|| {
            PreprocessError::config_error(format!(
                "Unsupported config file extension: {:?}",
                path.extension()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigValidatorExt;

    #[test]
    fn test_defaults_match_checkpoint_defaults() {
        let config = FeatureExtractorConfig::get_defaults();
        assert_eq!(config, FeatureExtractorConfig::default());
        assert_eq!(config.image_scale, ImageScale::Size(2048, 512));
        assert_eq!(config.size_divisor, 32);
        assert_eq!(config.crop_size, [512, 512]);
        assert_eq!(config.segmentation_padding_value, -100);
        assert!(config.do_pad);
        assert!(!config.reduce_zero_label);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_uses_defaults() -> PreprocessResult<()> {
        let config = FeatureExtractorConfig::from_json_str("{}")?;
        assert_eq!(config, FeatureExtractorConfig::default());
        Ok(())
    }

    #[test]
    fn test_preprocessor_config_json() -> PreprocessResult<()> {
        let content = r#"{
            "feature_extractor_type": "SegformerFeatureExtractor",
            "image_scale": [100, 20],
            "size_divisor": 10,
            "crop_size": [20, 20],
            "image_mean": [0.5, 0.5, 0.5],
            "image_std": [0.5, 0.5, 0.5],
            "resample": 2,
            "reduce_zero_label": true
        }"#;
        let config = FeatureExtractorConfig::from_json_str(content)?;
        assert_eq!(config.image_scale, ImageScale::Size(100, 20));
        assert_eq!(config.size_divisor, 10);
        assert_eq!(config.resample, Resample::Bilinear);
        assert!(config.reduce_zero_label);
        assert!(config.do_random_crop);
        Ok(())
    }

    #[test]
    fn test_invalid_statistics_rejected() {
        let config =
            FeatureExtractorConfig::new().with_normalization(vec![0.5; 3], vec![0.5, 0.0, 0.5]);
        let err = config.validate_and_wrap().unwrap_err();
        assert!(matches!(err, PreprocessError::Config { .. }));

        let config = FeatureExtractorConfig::new().with_normalization(vec![0.5; 4], vec![0.5; 3]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_divisor_rejected_only_when_needed() {
        let config = FeatureExtractorConfig::new().with_size_divisor(0);
        assert!(config.validate().is_err());
        let config = config.with_align(false);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fixed_target_alignment() {
        let config = FeatureExtractorConfig::new()
            .with_keep_ratio(false)
            .with_image_scale(ImageScale::Size(100, 50));
        assert!(matches!(
            config.check_fixed_target(),
            Err(PreprocessError::InvalidState { .. })
        ));
        let config = config.with_image_scale(ImageScale::Size(128, 64));
        assert!(config.check_fixed_target().is_ok());
    }

    #[test]
    fn test_config_format_detection() {
        assert_eq!(
            ConfigFormat::from_extension(Path::new("config.toml")),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension(Path::new("preprocessor_config.json")),
            Some(ConfigFormat::Json)
        );
        assert!(ConfigFormat::from_extension(Path::new("config.txt")).is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() -> PreprocessResult<()> {
        let dir = tempfile::tempdir()?;
        let config = FeatureExtractorConfig::new()
            .with_image_scale(ImageScale::Factor(0.5))
            .with_resample(Resample::Bicubic)
            .with_crop_size([64, 32]);

        for name in ["config.json", "config.toml"] {
            let path = dir.path().join(name);
            config.save_to_path(&path)?;
            assert_eq!(FeatureExtractorConfig::from_path(&path)?, config);
        }
        Ok(())
    }

    #[test]
    fn test_unsupported_extension() {
        let err = FeatureExtractorConfig::from_path("config.yaml").unwrap_err();
        assert!(err.to_string().contains("Unsupported config file extension"));
    }
}
