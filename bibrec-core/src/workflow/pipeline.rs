//! Pipeline Orchestrator
//!
//! Runs every candidate source over every chunk of a document, then reconciles the complete
//! candidate set. `OutputGate` checks a generated artifact against the reconciled entities.
//!
//! # Concurrency
//! - Source calls run through `futures::stream::buffer_unordered(max_concurrency)`
//! - Each call is wrapped in `tokio::time::timeout` and retried on transient failure
//! - Results are re-sorted by (chunk, source) before aggregation, so completion order never
//!   changes the outcome
//!
//! # Error Handling
//! - Per-chunk isolation: a source failing on one chunk is recorded in `failed_chunks`, the
//!   rest of the document still processes
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::new(&config, tables, sources).with_events(tx);
//! let outcome = pipeline.process_document(document_id, &chunks, Some(2), &hints).await;
//! ```

use super::{CandidateSource, ChunkRef, PipelineEvent, Reconciler, StructureExtractor};
use crate::config::{BibrecConfig, PipelineConfig};
use crate::error::EngineResult;
use crate::rules::tables::NormalizationTables;
use crate::types::{CandidateEntity, CanonicalEntity, ExtractionError, ValidationReport};
use crate::utils::{retry_transient, RetryPolicy};
use crate::validators::{release_decision, CompletenessReport, CountValidationResult, OutputValidator, PageRelationshipHints, ReleaseDecision};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A chunk one source could not process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedChunk {
    pub chunk_index: usize,
    pub source: String,
    pub error: String,
}

/// Everything the pipeline learned about one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionOutcome {
    pub document_id: Uuid,
    pub candidates: usize,
    pub aggregated: usize,
    pub entities: Vec<CanonicalEntity>,
    pub completeness: CompletenessReport,
    pub failed_chunks: Vec<FailedChunk>,
}

/// Pipeline orchestrator for extraction and reconciliation
pub struct Pipeline {
    config: PipelineConfig,
    sources: Vec<Arc<dyn CandidateSource>>,
    reconciler: Reconciler,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl Pipeline {
    pub fn new(config: &BibrecConfig, tables: Arc<NormalizationTables>, sources: Vec<Arc<dyn CandidateSource>>) -> Self {
        Self {
            config: config.pipeline.clone(),
            sources,
            reconciler: Reconciler::new(config, tables),
            event_tx: None,
        }
    }

    /// Report progress on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Extract candidates from all chunks, then reconcile them
    pub async fn process_document(
        &self,
        document_id: Uuid,
        chunks: &[ChunkRef],
        expected_count: Option<usize>,
        hints: &PageRelationshipHints,
    ) -> ExtractionOutcome {
        info!(%document_id, chunks = chunks.len(), sources = self.sources.len(), "Pipeline processing document");

        emit(
            &self.event_tx,
            PipelineEvent::DocumentStarted {
                document_id,
                total_chunks: chunks.len(),
                timestamp: chrono::Utc::now().timestamp(),
            },
        )
        .await;

        let (candidates, failed_chunks) = self.extract_all(chunks).await;

        let reconciliation = self.reconciler.reconcile(&candidates, expected_count, hints);

        emit(
            &self.event_tx,
            PipelineEvent::AggregationCompleted {
                candidates: reconciliation.candidates,
                aggregated: reconciliation.aggregated,
            },
        )
        .await;
        emit(
            &self.event_tx,
            PipelineEvent::DeduplicationCompleted {
                canonical: reconciliation.entities.len(),
            },
        )
        .await;
        emit(
            &self.event_tx,
            PipelineEvent::CompletenessChecked {
                found: reconciliation.completeness.count.found(),
                generation_blocked: reconciliation.completeness.generation_blocked,
                suspected_gaps: reconciliation.completeness.indicators.len(),
            },
        )
        .await;

        info!(
            %document_id,
            candidates = reconciliation.candidates,
            entities = reconciliation.entities.len(),
            failed_chunks = failed_chunks.len(),
            "Document processing complete"
        );

        emit(
            &self.event_tx,
            PipelineEvent::DocumentCompleted {
                document_id,
                entities: reconciliation.entities.len(),
                failed_chunks: failed_chunks.len(),
                timestamp: chrono::Utc::now().timestamp(),
            },
        )
        .await;

        ExtractionOutcome {
            document_id,
            candidates: reconciliation.candidates,
            aggregated: reconciliation.aggregated,
            entities: reconciliation.entities,
            completeness: reconciliation.completeness,
            failed_chunks,
        }
    }

    /// Run every (chunk, source) pair with bounded concurrency
    async fn extract_all(&self, chunks: &[ChunkRef]) -> (Vec<CandidateEntity>, Vec<FailedChunk>) {
        let jobs: Vec<(usize, usize)> = (0..chunks.len())
            .flat_map(|c| (0..self.sources.len()).map(move |s| (c, s)))
            .collect();

        let policy = self.retry_policy();
        let timeout_ms = self.config.call_timeout_ms;

        let mut results: Vec<((usize, usize), Result<Vec<CandidateEntity>, ExtractionError>)> =
            stream::iter(jobs)
                .map(|(c, s)| {
                    let chunk = chunks[c].clone();
                    let source = Arc::clone(&self.sources[s]);
                    async move {
                        let result = call_source(source, chunk, timeout_ms, policy).await;
                        ((c, s), result)
                    }
                })
                .buffer_unordered(self.config.max_concurrency.max(1))
                .collect()
                .await;

        results.sort_by_key(|(key, _)| *key);

        let mut candidates = Vec::new();
        let mut failed_chunks = Vec::new();

        for ((c, s), result) in results {
            let chunk_index = chunks[c].chunk_index;
            let source_name = self.sources[s].name();
            match result {
                Ok(found) => {
                    debug!(chunk_index, source = source_name, candidates = found.len(), "Chunk extracted");
                    emit(
                        &self.event_tx,
                        PipelineEvent::ChunkExtracted {
                            chunk_index,
                            source: source_name.to_string(),
                            candidates: found.len(),
                        },
                    )
                    .await;
                    candidates.extend(found);
                }
                Err(e) => {
                    warn!(chunk_index, source = source_name, error = %e, "Chunk extraction failed");
                    emit(
                        &self.event_tx,
                        PipelineEvent::ChunkFailed {
                            chunk_index,
                            source: source_name.to_string(),
                            message: e.to_string(),
                        },
                    )
                    .await;
                    failed_chunks.push(FailedChunk {
                        chunk_index,
                        source: source_name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        (candidates, failed_chunks)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.max_retries,
            initial_backoff_ms: self.config.initial_backoff_ms,
            max_backoff_ms: self.config.max_backoff_ms,
        }
    }
}

/// One source on one chunk, with timeout and retry; stamps provenance on the results
async fn call_source(
    source: Arc<dyn CandidateSource>,
    chunk: ChunkRef,
    timeout_ms: u64,
    policy: RetryPolicy,
) -> Result<Vec<CandidateEntity>, ExtractionError> {
    let operation = format!("{} chunk {}", source.name(), chunk.chunk_index);

    let mut found = retry_transient(&operation, policy, || {
        let source = Arc::clone(&source);
        let chunk = chunk.clone();
        async move {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), source.candidates(&chunk)).await {
                Ok(result) => result,
                Err(_) => Err(ExtractionError::Timeout(timeout_ms)),
            }
        }
    })
    .await?;

    let method = source.detection_method();
    for candidate in &mut found {
        candidate.source_chunk_index = chunk.chunk_index;
        candidate.detection_method = method;
    }
    Ok(found)
}

/// Result of checking one generated artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateOutcome {
    pub report: ValidationReport,
    pub decision: ReleaseDecision,
}

/// Final gate between the document generator and release
pub struct OutputGate {
    extractor: Arc<dyn StructureExtractor>,
    validator: OutputValidator,
    config: PipelineConfig,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl OutputGate {
    pub fn new(extractor: Arc<dyn StructureExtractor>, validator: OutputValidator, config: PipelineConfig) -> Self {
        Self {
            extractor,
            validator,
            config,
            event_tx: None,
        }
    }

    pub fn with_events(mut self, event_tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Read the artifact back, validate it against `entities` and decide on release
    ///
    /// Fails only when the artifact cannot be read after retries; callers must treat that
    /// as blocked.
    pub async fn check(
        &self,
        entities: &[CanonicalEntity],
        artifact: &[u8],
        count: &CountValidationResult,
    ) -> EngineResult<GateOutcome> {
        let policy = RetryPolicy {
            max_retries: self.config.max_retries,
            initial_backoff_ms: self.config.initial_backoff_ms,
            max_backoff_ms: self.config.max_backoff_ms,
        };
        let timeout_ms = self.config.call_timeout_ms;

        let generated = retry_transient(self.extractor.name(), policy, || {
            let extractor = Arc::clone(&self.extractor);
            async move {
                match tokio::time::timeout(Duration::from_millis(timeout_ms), extractor.extract(artifact)).await {
                    Ok(result) => result,
                    Err(_) => Err(ExtractionError::Timeout(timeout_ms)),
                }
            }
        })
        .await?;

        let report = self.validator.validate_entities(entities, &generated);
        let decision = release_decision(count, &report);

        emit(
            &self.event_tx,
            PipelineEvent::ValidationCompleted {
                report_id: report.report_id,
                errors: report.counts.errors,
                warnings: report.counts.warnings,
                infos: report.counts.infos,
                generation_blocked: report.generation_blocked,
            },
        )
        .await;

        if !decision.is_release() {
            warn!(report_id = %report.report_id, "Generated output blocked from release");
        }

        Ok(GateOutcome { report, decision })
    }
}

async fn emit(event_tx: &Option<mpsc::Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = event_tx {
        if let Err(e) = tx.send(event).await {
            debug!("Pipeline event dropped (receiver closed): {}", e);
        }
    }
}
