//! # bibrec Common Library
//!
//! Shared code for the bibrec engine and its front ends:
//! - Error types
//! - Bootstrap configuration loading (TOML, environment, platform defaults)
//! - Logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
