//! Core module - shared infrastructure for Kinesis
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the application.

pub mod config;
pub mod error;
pub mod types;

pub use config::{BrowserConfig, Config, PixelConfig, StateConfig, TranslatorConfig};
pub use error::{KinesisError, Result};
pub use types::*;
