//! CapEx Common - Shared configuration, errors, and logging for the CapEx planner.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup, request context, and run metrics
//! - Formatting helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    ArtifactsConfig, AuthConfig, Config, DataConfig, ObservabilityConfig, ServiceConfig,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};
