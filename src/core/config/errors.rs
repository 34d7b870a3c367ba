//! Configuration error types and validation traits.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error indicating that a configuration value is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Error indicating that per-channel statistics are malformed.
    #[error("invalid channel statistics for {field}: {message}")]
    InvalidChannelStats { field: String, message: String },
}

/// A trait for validating configuration parameters.
///
/// Implementors provide [`validate`](ConfigValidator::validate) and
/// [`get_defaults`](ConfigValidator::get_defaults); the remaining methods are
/// reusable checks for the parameter kinds that show up in image
/// preprocessing configurations.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Validates image dimensions.
    ///
    /// # Arguments
    ///
    /// * `width` - The width to validate.
    /// * `height` - The height to validate.
    /// * `field_name` - The name of the field being validated.
    fn validate_image_dimensions(
        &self,
        width: u32,
        height: u32,
        field_name: &str,
    ) -> Result<(), ConfigError> {
        if width == 0 || height == 0 {
            Err(ConfigError::InvalidConfig {
                message: format!(
                    "{} dimensions must be positive, got {}x{}",
                    field_name, width, height
                ),
            })
        } else {
            Ok(())
        }
    }

    /// Validates a float value is positive and finite.
    fn validate_positive_f64(&self, value: f64, field_name: &str) -> Result<(), ConfigError> {
        if !value.is_finite() || value <= 0.0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{} must be greater than 0, got {}", field_name, value),
            })
        } else {
            Ok(())
        }
    }

    /// Validates an integer value is positive.
    fn validate_positive_u32(&self, value: u32, field_name: &str) -> Result<(), ConfigError> {
        if value == 0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{} must be greater than 0, got {}", field_name, value),
            })
        } else {
            Ok(())
        }
    }

    /// Validates per-channel statistics such as a normalization mean or std.
    ///
    /// # Arguments
    ///
    /// * `values` - One value per channel.
    /// * `channels` - The expected number of channels.
    /// * `strictly_positive` - Whether every value must be greater than 0.
    /// * `field_name` - The name of the field being validated.
    fn validate_channel_stats(
        &self,
        values: &[f32],
        channels: usize,
        strictly_positive: bool,
        field_name: &str,
    ) -> Result<(), ConfigError> {
        if values.len() != channels {
            return Err(ConfigError::InvalidChannelStats {
                field: field_name.to_string(),
                message: format!("expected {} values, got {}", channels, values.len()),
            });
        }
        for (i, &v) in values.iter().enumerate() {
            if !v.is_finite() {
                return Err(ConfigError::InvalidChannelStats {
                    field: field_name.to_string(),
                    message: format!("value at index {i} is not finite: {v}"),
                });
            }
            if strictly_positive && v <= 0.0 {
                return Err(ConfigError::InvalidChannelStats {
                    field: field_name.to_string(),
                    message: format!("value at index {i} must be greater than 0, got {v}"),
                });
            }
        }
        Ok(())
    }
}

/// Extension trait that wraps validation errors into the crate error type.
pub trait ConfigValidatorExt: ConfigValidator {
    /// Validates configuration and wraps any errors into
    /// [`PreprocessError::Config`](crate::core::PreprocessError::Config).
    fn validate_and_wrap(self) -> Result<Self, crate::core::errors::PreprocessError>
    where
        Self: Sized,
    {
        self.validate()?;
        Ok(self)
    }
}

impl<T: ConfigValidator> ConfigValidatorExt for T {}

impl From<ConfigError> for String {
    fn from(error: ConfigError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestValidator;
    impl ConfigValidator for TestValidator {
        fn validate(&self) -> Result<(), ConfigError> {
            Ok(())
        }

        fn get_defaults() -> Self {
            TestValidator
        }
    }

    #[test]
    fn test_validate_image_dimensions() {
        let validator = TestValidator;
        assert!(validator.validate_image_dimensions(512, 512, "crop_size").is_ok());
        assert!(validator.validate_image_dimensions(0, 512, "crop_size").is_err());
        assert!(validator.validate_image_dimensions(512, 0, "crop_size").is_err());
    }

    #[test]
    fn test_validate_positive_values() {
        let validator = TestValidator;
        assert!(validator.validate_positive_f64(0.5, "image_scale").is_ok());
        assert!(validator.validate_positive_f64(0.0, "image_scale").is_err());
        assert!(validator.validate_positive_f64(f64::NAN, "image_scale").is_err());
        assert!(validator.validate_positive_u32(32, "size_divisor").is_ok());
        assert!(validator.validate_positive_u32(0, "size_divisor").is_err());
    }

    #[test]
    fn test_validate_channel_stats() {
        let validator = TestValidator;
        assert!(
            validator
                .validate_channel_stats(&[0.229, 0.224, 0.225], 3, true, "image_std")
                .is_ok()
        );
        assert!(
            validator
                .validate_channel_stats(&[0.5, 0.5], 3, false, "image_mean")
                .is_err()
        );
        assert!(
            validator
                .validate_channel_stats(&[0.5, 0.0, 0.5], 3, true, "image_std")
                .is_err()
        );
        // Zero is a legal mean.
        assert!(
            validator
                .validate_channel_stats(&[0.0, 0.0, 0.0], 3, false, "image_mean")
                .is_ok()
        );
    }

    #[test]
    fn test_config_error_to_string() {
        let error = ConfigError::InvalidConfig {
            message: "crop_size must be positive".to_string(),
        };
        let error_string: String = error.into();
        assert_eq!(
            error_string,
            "invalid configuration: crop_size must be positive"
        );
    }
}
