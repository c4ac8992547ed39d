//! Deduplicator (global merge)
//!
//! Clusters aggregated entities that describe the same real-world entity anywhere in the
//! document, then resolves each cluster into one canonical entity.
//!
//! # Algorithm
//! 1. Pairwise similarity over aggregated primaries
//! 2. Single-linkage clustering (union-find) at `cluster_threshold`; merges are transitive,
//!    except that two clusters whose printed names disagree are never joined, even through a
//!    nameless address-only fragment
//! 3. Per field, pick the member value with the highest confidence × completeness;
//!    ties → longer value → earliest chunk
//! 4. `quality_score` = mean aggregate confidence − `conflict_penalty` per unresolved field
//! 5. Order output by the smallest (chunk, sequence hint) among members

use super::union_find::UnionFind;
use crate::config::DeduplicationConfig;
use crate::similarity::{name_similarity, SimilarityScorer};
use crate::types::{AggregatedEntity, CandidateEntity, CanonicalEntity};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub struct Deduplicator {
    scorer: SimilarityScorer,
    config: DeduplicationConfig,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(SimilarityScorer::default(), DeduplicationConfig::default())
    }
}

/// One observed value of a field
struct Observation<'a> {
    value: &'a str,
    strength: f64,
    chunk: usize,
}

/// Outcome of resolving one field
struct Resolution {
    value: String,
    chunk: usize,
    note: Option<String>,
    unresolved: bool,
}

impl Deduplicator {
    pub fn new(scorer: SimilarityScorer, config: DeduplicationConfig) -> Self {
        Self { scorer, config }
    }

    pub fn deduplicate(&self, aggregated: &[AggregatedEntity]) -> Vec<CanonicalEntity> {
        let mut uf = UnionFind::new(aggregated.len());
        // Names carried by each cluster, indexed by its current root
        let mut names: Vec<Vec<String>> = aggregated
            .iter()
            .map(|entity| entity.primary.display_name().into_iter().collect())
            .collect();

        for i in 0..aggregated.len() {
            for j in (i + 1)..aggregated.len() {
                let score = self.scorer.score(&aggregated[i].primary, &aggregated[j].primary);
                if score < self.config.cluster_threshold {
                    continue;
                }

                let (root_i, root_j) = (uf.find(i), uf.find(j));
                if root_i == root_j {
                    continue;
                }
                if self.names_disagree(&names[root_i], &names[root_j]) {
                    debug!(left = i, right = j, score, "Clusters kept apart: names disagree");
                    continue;
                }

                uf.union(i, j);
                let root = uf.find(i);
                let absorbed = if root == root_i { root_j } else { root_i };
                let moved = std::mem::take(&mut names[absorbed]);
                names[root].extend(moved);
                debug!(left = i, right = j, score, "Entities clustered");
            }
        }

        let mut clusters: Vec<Vec<&AggregatedEntity>> = uf
            .groups()
            .into_iter()
            .map(|indices| indices.into_iter().map(|i| &aggregated[i]).collect())
            .collect();

        // Stable: equal keys keep first-appearance order
        clusters.sort_by_key(|cluster| {
            cluster
                .iter()
                .map(|entity| entity.order_key())
                .min()
                .unwrap_or((usize::MAX, u32::MAX))
        });

        let canonical: Vec<CanonicalEntity> = clusters.iter().map(|cluster| self.merge_cluster(cluster)).collect();

        info!(
            aggregated = aggregated.len(),
            canonical = canonical.len(),
            "Entities deduplicated"
        );

        canonical
    }

    /// Any name in one cluster too far from any name in the other
    fn names_disagree(&self, left: &[String], right: &[String]) -> bool {
        left.iter()
            .any(|a| right.iter().any(|b| name_similarity(a, b) < self.config.cluster_threshold))
    }

    fn merge_cluster(&self, cluster: &[&AggregatedEntity]) -> CanonicalEntity {
        let members: Vec<&CandidateEntity> = cluster.iter().flat_map(|entity| entity.members.iter()).collect();

        let mut observations: BTreeMap<&str, Vec<Observation>> = BTreeMap::new();
        let mut field_order: Vec<&str> = Vec::new();
        for member in &members {
            for (field, value) in member.populated_fields() {
                let entry = observations.entry(field).or_default();
                if entry.is_empty() {
                    field_order.push(field);
                }
                entry.push(Observation {
                    value,
                    strength: member.strength(),
                    chunk: member.source_chunk_index,
                });
            }
        }

        let mut canonical = CanonicalEntity::default();
        let mut unresolved = 0usize;

        for field in field_order {
            let Some(observed) = observations.get(field) else {
                continue;
            };
            let resolution = self.resolve_field(field, observed);
            if resolution.unresolved {
                unresolved += 1;
            }
            if let Some(note) = resolution.note {
                debug!(field, note = %note, "Field conflict resolved");
                canonical.resolution_notes.push(note);
            }
            canonical.fields.insert(field.to_string(), resolution.value);
            canonical.provenance.insert(field.to_string(), resolution.chunk);
        }

        let mean_confidence =
            cluster.iter().map(|entity| entity.aggregate_confidence).sum::<f64>() / cluster.len().max(1) as f64;
        canonical.quality_score =
            (mean_confidence - self.config.conflict_penalty * unresolved as f64).clamp(0.0, 1.0);

        canonical.sequence_hint = members.iter().filter_map(|m| m.sequence_hint).min();
        canonical.source_chunks = members
            .iter()
            .map(|m| m.source_chunk_index)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        canonical
    }

    /// Pick the winning value for one field and explain the choice when members disagreed
    fn resolve_field(&self, field: &str, observed: &[Observation]) -> Resolution {
        let mut winner = &observed[0];
        for candidate in &observed[1..] {
            if outranks(candidate, winner) {
                winner = candidate;
            }
        }

        let winner_key = self.scorer.normalized_field(field, winner.value);
        let losers: Vec<&Observation> = observed
            .iter()
            .filter(|o| self.scorer.normalized_field(field, o.value) != winner_key)
            .collect();

        if losers.is_empty() {
            return Resolution {
                value: winner.value.to_string(),
                chunk: winner.chunk,
                note: None,
                unresolved: false,
            };
        }

        // A disagreeing value with equal strength means evidence did not decide
        let unresolved = losers.iter().any(|o| o.strength == winner.strength);
        let basis = if !unresolved {
            "higher confidence"
        } else if losers.iter().any(|o| o.value.chars().count() != winner.value.chars().count()) {
            "tie-break: longer value"
        } else {
            "tie-break: earliest chunk"
        };

        let rejected: Vec<String> = losers
            .iter()
            .map(|o| format!("'{}' (chunk {}, strength {:.2})", o.value, o.chunk, o.strength))
            .collect();

        Resolution {
            value: winner.value.to_string(),
            chunk: winner.chunk,
            note: Some(format!(
                "{}: chose '{}' (chunk {}, strength {:.2}) over {} [{}]",
                field,
                winner.value,
                winner.chunk,
                winner.strength,
                rejected.join(", "),
                basis
            )),
            unresolved,
        }
    }
}

/// Ranking for field winners: strength, then longer value, then earlier chunk
fn outranks(candidate: &Observation, current: &Observation) -> bool {
    if candidate.strength != current.strength {
        return candidate.strength > current.strength;
    }
    let (len_candidate, len_current) = (candidate.value.chars().count(), current.value.chars().count());
    if len_candidate != len_current {
        return len_candidate > len_current;
    }
    candidate.chunk < current.chunk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::CandidateAggregator;
    use crate::types::DetectionMethod;

    fn candidate(chunk: usize) -> CandidateEntity {
        CandidateEntity::new(chunk, chunk as u32 + 1, DetectionMethod::Table)
    }

    fn single(member: CandidateEntity) -> AggregatedEntity {
        AggregatedEntity {
            primary: member.clone(),
            aggregate_confidence: member.strength(),
            members: vec![member],
            conflicts: BTreeSet::new(),
        }
    }

    #[test]
    fn test_repeated_inventor_is_merged() {
        let dedup = Deduplicator::default();
        let entities = vec![
            single(candidate(0).with_full_name("Jane Doe").with_sequence_hint(1)),
            single(candidate(1).with_full_name("Akira Tanaka").with_sequence_hint(2)),
            single(candidate(5).with_full_name("JANE DOE").with_address("city", "Austin")),
        ];

        let canonical = dedup.deduplicate(&entities);

        assert_eq!(canonical.len(), 2);
        assert_eq!(canonical[0].field("city"), Some("Austin"));
        assert_eq!(canonical[0].source_chunks, vec![0, 5]);
        assert_eq!(canonical[1].field("full_name"), Some("Akira Tanaka"));
    }

    #[test]
    fn test_single_member_passes_through() {
        let dedup = Deduplicator::default();
        let member = candidate(2)
            .with_given_name("Mary")
            .with_family_name("Major")
            .with_scores(0.8, 1.0);

        let canonical = dedup.deduplicate(&[single(member)]);

        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical[0].field("given_name"), Some("Mary"));
        assert_eq!(canonical[0].provenance.get("family_name"), Some(&2));
        assert!((canonical[0].quality_score - 0.8).abs() < 1e-9);
        assert!(canonical[0].resolution_notes.is_empty());
    }

    #[test]
    fn test_stronger_value_wins() {
        let dedup = Deduplicator::default();
        let aggregated = CandidateAggregator::default().aggregate(&[
            candidate(0).with_full_name("John Smith").with_address("postal_code", "02139").with_address("city", "Cambridge").with_scores(0.9, 1.0),
            candidate(1).with_full_name("John Smith").with_address("postal_code", "02139").with_address("city", "Boston").with_scores(0.5, 1.0),
        ]);

        let canonical = dedup.deduplicate(&aggregated);

        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical[0].field("city"), Some("Cambridge"));
        assert_eq!(canonical[0].resolution_notes.len(), 1);
        assert!(canonical[0].resolution_notes[0].contains("higher confidence"));
    }

    #[test]
    fn test_tied_conflict_is_penalized() {
        let dedup = Deduplicator::default();
        let aggregated = CandidateAggregator::default().aggregate(&[
            candidate(0).with_full_name("John Smith").with_address("postal_code", "02139").with_address("city", "Cambridge"),
            candidate(1).with_full_name("John Smith").with_address("postal_code", "02139").with_address("city", "Boston"),
        ]);

        let canonical = dedup.deduplicate(&aggregated);

        assert_eq!(canonical.len(), 1);
        // Equal strength: longer value wins
        assert_eq!(canonical[0].field("city"), Some("Cambridge"));
        assert!(canonical[0].resolution_notes[0].contains("tie-break"));
        // aggregate 1.0 (1.0 + 0.05 boost, capped) minus one unresolved conflict
        assert!((canonical[0].quality_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_equal_values_fall_back_to_earliest_chunk() {
        let dedup = Deduplicator::default();
        // Later chunk listed first so the winner must move
        let entities = vec![
            single(
                candidate(5)
                    .with_full_name("Jane Doe")
                    .with_address("postal_code", "6000")
                    .with_address("city", "Perth")
                    .with_sequence_hint(1),
            ),
            single(
                candidate(0)
                    .with_full_name("Jane Doe")
                    .with_address("postal_code", "6000")
                    .with_address("city", "Paris")
                    .with_sequence_hint(1),
            ),
        ];

        let canonical = dedup.deduplicate(&entities);

        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical[0].field("city"), Some("Paris"));
        assert_eq!(canonical[0].provenance.get("city"), Some(&0));
        assert!(canonical[0].resolution_notes[0].contains("tie-break: earliest chunk"));
        assert!((canonical[0].quality_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_clustering_is_transitive() {
        let scorer = SimilarityScorer::default();
        let a = candidate(0).with_full_name("Jane Doe").with_sequence_hint(1);
        let b = candidate(3).with_full_name("Jane Doe").with_address("city", "Austin");
        let c = candidate(6).with_full_name("Jane Doe").with_address("city", "Austin").with_sequence_hint(2);
        assert!(scorer.score(&a, &b) >= 0.85);
        assert!(scorer.score(&b, &c) >= 0.85);
        assert!(scorer.score(&a, &c) < 0.85);

        let canonical = Deduplicator::default().deduplicate(&[single(a), single(b), single(c)]);

        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical[0].source_chunks, vec![0, 3, 6]);
        assert_eq!(canonical[0].sequence_hint, Some(1));
    }

    #[test]
    fn test_shared_address_does_not_chain_different_people() {
        let dedup = Deduplicator::default();
        let office = |c: CandidateEntity| c.with_address("postal_code", "02139").with_address("city", "Cambridge");
        let entities = vec![
            single(office(candidate(0).with_full_name("John Smith"))),
            single(office(candidate(3))),
            single(office(candidate(6).with_full_name("Mary Major"))),
        ];

        let canonical = dedup.deduplicate(&entities);

        let names: Vec<&str> = canonical.iter().filter_map(|e| e.field("full_name")).collect();
        assert_eq!(names, vec!["John Smith", "Mary Major"]);
        assert_eq!(canonical[0].source_chunks, vec![0, 3]);
    }

    #[test]
    fn test_output_ordered_by_chunk_and_sequence() {
        let dedup = Deduplicator::default();
        let entities = vec![
            single(candidate(3).with_full_name("Carol Chen")),
            single(candidate(0).with_full_name("Bob Brown").with_sequence_hint(2)),
            single(candidate(0).with_full_name("Alice Adams").with_sequence_hint(1)),
        ];

        let names: Vec<String> = dedup
            .deduplicate(&entities)
            .iter()
            .filter_map(|e| e.field("full_name").map(str::to_string))
            .collect();

        assert_eq!(names, vec!["Alice Adams", "Bob Brown", "Carol Chen"]);
    }
}
