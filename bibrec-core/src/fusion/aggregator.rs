//! Candidate Aggregator (local merge)
//!
//! Merges raw per-chunk candidates into aggregated entities. A candidate may only join a group
//! whose latest member sits within `chunk_window` chunks, so an inventor split across a page
//! boundary is reunited while look-alikes far apart are left for the global deduplicator.
//!
//! # Algorithm
//! 1. Stable sort by `(source_chunk_index, sequence_hint ?? source_page)`
//! 2. Score the candidate against every open group (best score against any member)
//! 3. Join the highest-scoring group at or above `join_threshold`; ties go to the earliest group
//! 4. Otherwise start a new group
//! 5. Per group: pick the primary, collect conflicting fields, derive aggregate confidence

use crate::config::AggregationConfig;
use crate::similarity::SimilarityScorer;
use crate::types::{AggregatedEntity, CandidateEntity};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub struct CandidateAggregator {
    scorer: SimilarityScorer,
    config: AggregationConfig,
}

impl Default for CandidateAggregator {
    fn default() -> Self {
        Self::new(SimilarityScorer::default(), AggregationConfig::default())
    }
}

/// Group under construction
struct Group {
    members: Vec<CandidateEntity>,
    last_chunk: usize,
}

impl CandidateAggregator {
    pub fn new(scorer: SimilarityScorer, config: AggregationConfig) -> Self {
        Self { scorer, config }
    }

    /// Aggregate candidates; every input lands in exactly one output entity
    pub fn aggregate(&self, candidates: &[CandidateEntity]) -> Vec<AggregatedEntity> {
        let mut ordered: Vec<&CandidateEntity> = candidates.iter().collect();
        ordered.sort_by_key(|c| (c.source_chunk_index, c.sequence_hint.unwrap_or(c.source_page)));

        let mut groups: Vec<Group> = Vec::new();

        for candidate in ordered {
            match self.best_group(&groups, candidate) {
                Some((index, score)) => {
                    debug!(
                        chunk = candidate.source_chunk_index,
                        group = index,
                        score,
                        "Candidate joined group"
                    );
                    let group = &mut groups[index];
                    group.last_chunk = group.last_chunk.max(candidate.source_chunk_index);
                    group.members.push(candidate.clone());
                }
                None => {
                    debug!(
                        chunk = candidate.source_chunk_index,
                        group = groups.len(),
                        "Candidate started new group"
                    );
                    groups.push(Group {
                        members: vec![candidate.clone()],
                        last_chunk: candidate.source_chunk_index,
                    });
                }
            }
        }

        let aggregated: Vec<AggregatedEntity> = groups
            .into_iter()
            .map(|group| self.finish_group(group.members))
            .collect();

        info!(
            candidates = candidates.len(),
            entities = aggregated.len(),
            conflicted = aggregated.iter().filter(|e| !e.conflicts.is_empty()).count(),
            "Candidates aggregated"
        );

        aggregated
    }

    /// Highest-scoring group within the window at or above the join threshold
    fn best_group(&self, groups: &[Group], candidate: &CandidateEntity) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for (index, group) in groups.iter().enumerate() {
            if candidate.source_chunk_index.abs_diff(group.last_chunk) > self.config.chunk_window {
                continue;
            }

            let score = group
                .members
                .iter()
                .map(|member| self.scorer.score(candidate, member))
                .fold(0.0_f64, f64::max);

            if score < self.config.join_threshold {
                continue;
            }
            // Strictly greater keeps the earliest group on ties
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }
        best
    }

    fn finish_group(&self, members: Vec<CandidateEntity>) -> AggregatedEntity {
        let mut primary_index = 0;
        for (index, member) in members.iter().enumerate() {
            if member.strength() > members[primary_index].strength() {
                primary_index = index;
            }
        }

        let best_strength = members[primary_index].strength();
        let boost = self.config.corroboration_boost * (members.len() - 1) as f64;
        let aggregate_confidence = (best_strength + boost).min(1.0);

        AggregatedEntity {
            primary: members[primary_index].clone(),
            conflicts: self.detect_conflicts(&members),
            aggregate_confidence,
            members,
        }
    }

    /// Fields where two members carry different normalized values
    fn detect_conflicts(&self, members: &[CandidateEntity]) -> BTreeSet<String> {
        let mut values: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for member in members {
            for (field, value) in member.populated_fields() {
                values
                    .entry(field)
                    .or_default()
                    .insert(self.scorer.normalized_field(field, value));
            }
        }

        values
            .into_iter()
            .filter(|(_, distinct)| distinct.len() > 1)
            .map(|(field, _)| field.to_string())
            .collect()
    }
}
