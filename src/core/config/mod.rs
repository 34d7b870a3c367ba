//! Configuration validation for the preprocessing pipeline.
//!
//! The concrete configuration type lives in
//! [`pipeline::config`](crate::pipeline::config); this module holds the error
//! type and the validation traits it implements.

pub mod errors;

pub use errors::{ConfigError, ConfigValidator, ConfigValidatorExt};
