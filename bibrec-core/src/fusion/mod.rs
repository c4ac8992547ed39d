//! Tier 2: entity fusion
//!
//! - `CandidateAggregator`: local merge of per-chunk candidates
//! - `Deduplicator`: global clustering and field-level conflict resolution

pub mod aggregator;
pub mod deduplicator;
mod union_find;

pub use aggregator::CandidateAggregator;
pub use deduplicator::Deduplicator;

use crate::types::CanonicalEntity;

/// Drop diagnostic resolution notes before records leave the engine
///
/// Notes are kept only when the caller asked for audit retention.
pub fn strip_resolution_notes(entities: &mut [CanonicalEntity]) {
    for entity in entities {
        entity.resolution_notes.clear();
    }
}
