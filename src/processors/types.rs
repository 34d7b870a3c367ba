//! Types used in image processing operations
//!
//! This module defines the options shared by the resize and crop stages.

use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::core::PreprocessError;

/// How the resize stage scales an image.
///
/// Deserializes from either a number (`2.0`) or a pair (`[2048, 512]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageScale {
    /// Uniform scale factor applied to both sides.
    Factor(f64),
    /// A pair of sizes.
    ///
    /// With `keep_ratio` the larger entry bounds the long edge and the smaller
    /// one bounds the short edge; without it the pair is the exact target
    /// `(width, height)`.
    Size(u32, u32),
}

impl fmt::Display for ImageScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageScale::Factor(s) => write!(f, "x{s}"),
            ImageScale::Size(a, b) => write!(f, "({a}, {b})"),
        }
    }
}

/// Resampling filter used when resizing images.
///
/// Serialized as the PIL integer constant so configuration files written by
/// other tooling load unchanged; names such as `"bilinear"` are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ResampleRepr", into = "u32")]
pub enum Resample {
    /// Nearest neighbour (PIL 0).
    Nearest,
    /// Lanczos (PIL 1).
    Lanczos,
    /// Bilinear (PIL 2).
    #[default]
    Bilinear,
    /// Bicubic (PIL 3).
    Bicubic,
    /// Box (PIL 4).
    Box,
    /// Hamming (PIL 5).
    Hamming,
}

impl Resample {
    /// Converts a PIL resampling constant.
    pub fn from_pil(code: u32) -> Option<Self> {
        match code {
            0 => Some(Resample::Nearest),
            1 => Some(Resample::Lanczos),
            2 => Some(Resample::Bilinear),
            3 => Some(Resample::Bicubic),
            4 => Some(Resample::Box),
            5 => Some(Resample::Hamming),
            _ => None,
        }
    }

    /// Returns the PIL resampling constant.
    pub fn pil_code(self) -> u32 {
        match self {
            Resample::Nearest => 0,
            Resample::Lanczos => 1,
            Resample::Bilinear => 2,
            Resample::Bicubic => 3,
            Resample::Box => 4,
            Resample::Hamming => 5,
        }
    }

    /// Maps to the closest `image` crate filter.
    ///
    /// Box has no direct equivalent and maps to Triangle; Hamming maps to
    /// CatmullRom.
    pub fn filter_type(self) -> FilterType {
        match self {
            Resample::Nearest => FilterType::Nearest,
            Resample::Lanczos => FilterType::Lanczos3,
            Resample::Bilinear | Resample::Box => FilterType::Triangle,
            Resample::Bicubic | Resample::Hamming => FilterType::CatmullRom,
        }
    }
}

impl From<Resample> for u32 {
    fn from(resample: Resample) -> Self {
        resample.pil_code()
    }
}

impl TryFrom<u32> for Resample {
    type Error = PreprocessError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Resample::from_pil(code).ok_or_else(|| {
            PreprocessError::config_error_with_context(
                "resample",
                &code.to_string(),
                "expected a PIL resampling constant in 0..=5",
            )
        })
    }
}

impl FromStr for Resample {
    type Err = PreprocessError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Resample::Nearest),
            "lanczos" => Ok(Resample::Lanczos),
            "bilinear" | "linear" => Ok(Resample::Bilinear),
            "bicubic" | "cubic" => Ok(Resample::Bicubic),
            "box" => Ok(Resample::Box),
            "hamming" => Ok(Resample::Hamming),
            _ => Err(PreprocessError::config_error_with_context(
                "resample",
                name,
                "unknown resampling filter",
            )),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResampleRepr {
    Code(u32),
    Name(String),
}

impl TryFrom<ResampleRepr> for Resample {
    type Error = PreprocessError;

    fn try_from(repr: ResampleRepr) -> Result<Self, Self::Error> {
        match repr {
            ResampleRepr::Code(code) => Resample::try_from(code),
            ResampleRepr::Name(name) => name.parse(),
        }
    }
}

/// A crop window in pixel coordinates, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    /// First row (inclusive).
    pub y1: usize,
    /// Last row (exclusive).
    pub y2: usize,
    /// First column (inclusive).
    pub x1: usize,
    /// Last column (exclusive).
    pub x2: usize,
}

impl CropBox {
    /// Height of the window.
    pub fn height(&self) -> usize {
        self.y2.saturating_sub(self.y1)
    }

    /// Width of the window.
    pub fn width(&self) -> usize {
        self.x2.saturating_sub(self.x1)
    }

    /// Clips the window to an image of the given size.
    pub fn clip_to(self, height: usize, width: usize) -> Self {
        Self {
            y1: self.y1.min(height),
            y2: self.y2.min(height),
            x1: self.x1.min(width),
            x2: self.x2.min(width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_scale_deserializes_both_forms() {
        let size: ImageScale = serde_json::from_str("[2048, 512]").unwrap();
        assert_eq!(size, ImageScale::Size(2048, 512));

        let factor: ImageScale = serde_json::from_str("0.5").unwrap();
        assert_eq!(factor, ImageScale::Factor(0.5));
    }

    #[test]
    fn test_resample_from_code_and_name() {
        let from_code: Resample = serde_json::from_str("0").unwrap();
        assert_eq!(from_code, Resample::Nearest);
        let from_name: Resample = serde_json::from_str("\"bicubic\"").unwrap();
        assert_eq!(from_name, Resample::Bicubic);
        assert!(serde_json::from_str::<Resample>("9").is_err());
        assert_eq!(serde_json::to_string(&Resample::Bilinear).unwrap(), "2");
    }

    #[test]
    fn test_resample_filter_mapping() {
        assert_eq!(Resample::Nearest.filter_type(), FilterType::Nearest);
        assert_eq!(Resample::Bilinear.filter_type(), FilterType::Triangle);
        assert_eq!(Resample::Hamming.filter_type(), FilterType::CatmullRom);
    }

    #[test]
    fn test_crop_box_clip() {
        let bbox = CropBox {
            y1: 0,
            y2: 20,
            x1: 5,
            x2: 25,
        }
        .clip_to(12, 30);
        assert_eq!(bbox.height(), 12);
        assert_eq!(bbox.width(), 20);
    }
}
