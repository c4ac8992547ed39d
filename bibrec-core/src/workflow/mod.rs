//! Workflow orchestration
//!
//! Drives the three tiers for one document:
//! - **Tier 1**: external `CandidateSource`s run per chunk (concurrent, timed out, retried)
//! - **Tier 2**: aggregation and deduplication
//! - **Tier 3**: completeness checks, then output validation through `OutputGate`
//!
//! Progress is reported as `PipelineEvent`s over an optional mpsc channel.

pub mod pipeline;
pub mod reconciler;

pub use pipeline::{ExtractionOutcome, FailedChunk, GateOutcome, OutputGate, Pipeline};
pub use reconciler::{Reconciler, Reconciliation};

use crate::record::FieldRecord;
use crate::types::{CandidateEntity, DetectionMethod, ExtractionError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One page window of a document, as handed to candidate sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub first_page: u32,
    pub last_page: u32,
}

/// Producer of raw candidates for one chunk (one detection strategy per source)
///
/// Implementations wrap an external text or vision backend. The pipeline stamps the chunk
/// index and detection method on returned candidates.
#[async_trait::async_trait]
pub trait CandidateSource: Send + Sync {
    /// Source name for logs and failure reports
    fn name(&self) -> &'static str;

    fn detection_method(&self) -> DetectionMethod;

    async fn candidates(&self, chunk: &ChunkRef) -> Result<Vec<CandidateEntity>, ExtractionError>;
}

/// Reads a generated artifact back into a flattened field record
#[async_trait::async_trait]
pub trait StructureExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, artifact: &[u8]) -> Result<FieldRecord, ExtractionError>;
}

/// Pipeline progress events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Document processing started
    DocumentStarted {
        document_id: Uuid,
        total_chunks: usize,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },

    /// One source finished one chunk
    ChunkExtracted {
        chunk_index: usize,
        source: String,
        candidates: usize,
    },

    /// One source gave up on one chunk
    ChunkFailed {
        chunk_index: usize,
        source: String,
        message: String,
    },

    AggregationCompleted {
        candidates: usize,
        aggregated: usize,
    },

    DeduplicationCompleted {
        canonical: usize,
    },

    CompletenessChecked {
        found: usize,
        generation_blocked: bool,
        suspected_gaps: usize,
    },

    ValidationCompleted {
        report_id: Uuid,
        errors: usize,
        warnings: usize,
        infos: usize,
        generation_blocked: bool,
    },

    /// Document processing completed
    DocumentCompleted {
        document_id: Uuid,
        entities: usize,
        failed_chunks: usize,
        timestamp: i64,
    },
}
