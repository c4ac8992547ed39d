//! bibrec-core library interface
//!
//! Reconciles per-chunk candidate records into canonical entities and validates generated
//! output against them.

pub mod config;
pub mod error;
pub mod fusion; // Tier 2: aggregation and deduplication
pub mod record;
pub mod rules;
pub mod similarity;
pub mod types;
pub mod utils;
pub mod validators; // Tier 3: completeness and output fidelity
pub mod workflow;

pub use crate::config::BibrecConfig;
pub use crate::error::{EngineError, EngineResult};
pub use crate::record::FieldRecord;
pub use crate::rules::RuleTable;
pub use crate::types::{
    AggregatedEntity, CandidateEntity, CanonicalEntity, DetectionMethod, FieldMismatch, Severity, ValidationReport,
};
