//! Error types for bibrec-core
//!
//! Configuration problems are the only fatal errors and surface when the engine is
//! constructed. Malformed-but-present input data never produces an error; it flows through
//! scoring and validation as empty values.

use crate::types::ExtractionError;
use thiserror::Error;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid engine configuration (thresholds, weights, budgets)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required field class has no comparison rule
    #[error("No rule configured for required field class '{class}'")]
    MissingRule { class: String },

    /// A rule in the rule table is malformed
    #[error("Invalid rule '{id}': {reason}")]
    InvalidRule { id: String, reason: String },

    /// External extraction call failed after retries
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// bibrec-common error
    #[error("Common error: {0}")]
    Common(#[from] bibrec_common::Error),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
