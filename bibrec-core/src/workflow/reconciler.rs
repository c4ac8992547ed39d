//! Synchronous Tier 2/3 pass over a complete candidate set
//!
//! Aggregation → deduplication → completeness, strictly in that order. Shared by the async
//! pipeline and the `reconcile` CLI command.

use crate::config::BibrecConfig;
use crate::fusion::{CandidateAggregator, Deduplicator};
use crate::rules::tables::NormalizationTables;
use crate::similarity::SimilarityScorer;
use crate::types::{CandidateEntity, CanonicalEntity};
use crate::validators::{CompletenessReport, CompletenessValidator, PageRelationshipHints};
use serde::Serialize;
use std::sync::Arc;

/// Result of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub candidates: usize,
    pub aggregated: usize,
    pub entities: Vec<CanonicalEntity>,
    pub completeness: CompletenessReport,
}

pub struct Reconciler {
    aggregator: CandidateAggregator,
    deduplicator: Deduplicator,
    completeness: CompletenessValidator,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(&BibrecConfig::default(), Arc::new(NormalizationTables::builtin()))
    }
}

impl Reconciler {
    pub fn new(config: &BibrecConfig, tables: Arc<NormalizationTables>) -> Self {
        let scorer = SimilarityScorer::new(config.similarity, tables);
        Self {
            aggregator: CandidateAggregator::new(scorer.clone(), config.aggregation.clone()),
            deduplicator: Deduplicator::new(scorer, config.deduplication.clone()),
            completeness: CompletenessValidator::new(config.completeness.required_fields.clone()),
        }
    }

    /// Replace the configured required fields (e.g. from a CLI flag)
    pub fn with_required_fields(mut self, required_fields: Vec<String>) -> Self {
        self.completeness = CompletenessValidator::new(required_fields);
        self
    }

    pub fn reconcile(
        &self,
        candidates: &[CandidateEntity],
        expected_count: Option<usize>,
        hints: &PageRelationshipHints,
    ) -> Reconciliation {
        let aggregated = self.aggregator.aggregate(candidates);
        let entities = self.deduplicator.deduplicate(&aggregated);
        let completeness = self.completeness.validate(&entities, expected_count, hints);

        Reconciliation {
            candidates: candidates.len(),
            aggregated: aggregated.len(),
            entities,
            completeness,
        }
    }
}
