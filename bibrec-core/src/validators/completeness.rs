// Tier 3: Completeness Validator
//
// Concept: Decide whether the deduplicated entity set is plausible before generation
// Synchronization: Accepts canonical entities, outputs a CompletenessReport
//
// Checks:
// 1. Count gate: found vs. caller-supplied expected count (hard gate)
// 2. Required fields per entity (a name is always required)
// 3. Sequence gaps: printed positions 1, 2, 4 suggest a missed #3 (advisory)

use crate::types::CanonicalEntity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Name of the always-required field class in reports
pub const NAME_REQUIREMENT: &str = "name";

/// Missing positions listed one by one before the remainder is summarized
const MAX_LISTED_POSITIONS: usize = 50;

/// Outcome of the count gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CountValidationResult {
    Ok { found: usize },
    Mismatch { expected: usize, found: usize },
}

impl CountValidationResult {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, CountValidationResult::Mismatch { .. })
    }

    pub fn found(&self) -> usize {
        match self {
            CountValidationResult::Ok { found } | CountValidationResult::Mismatch { found, .. } => *found,
        }
    }
}

/// Required fields one entity lacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingRequiredFields {
    /// Position in the canonical list
    pub entity_index: usize,
    pub missing: Vec<String>,
}

/// What the document says about how many entities to expect and where numbering starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRelationshipHints {
    pub first_sequence: u32,
    /// Total printed in the document ("Inventors: 4"), if any
    pub declared_total: Option<u32>,
}

impl Default for PageRelationshipHints {
    fn default() -> Self {
        Self {
            first_sequence: 1,
            declared_total: None,
        }
    }
}

/// Advisory signal that an entity may have been missed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingInventorIndicator {
    pub suspected_position: u32,
    pub reason: String,
}

/// All completeness findings for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub count: CountValidationResult,
    pub missing_fields: Vec<MissingRequiredFields>,
    pub indicators: Vec<MissingInventorIndicator>,
    /// Count mismatch; missing fields and indicators never block on their own
    pub generation_blocked: bool,
}

/// Completeness validator (Tier 3)
#[derive(Debug, Clone, Default)]
pub struct CompletenessValidator {
    /// Required fields beyond the name
    required_fields: Vec<String>,
}

impl CompletenessValidator {
    pub fn new(required_fields: Vec<String>) -> Self {
        Self { required_fields }
    }

    /// Compare the number of entities found to the expected count
    pub fn validate_count(&self, entities: &[CanonicalEntity], expected_count: Option<usize>) -> CountValidationResult {
        let found = entities.len();
        match expected_count {
            Some(expected) if expected != found => {
                warn!(expected, found, "Entity count mismatch");
                CountValidationResult::Mismatch { expected, found }
            }
            _ => CountValidationResult::Ok { found },
        }
    }

    /// Missing required fields per entity; entities with everything present are omitted
    pub fn validate_field_completeness(
        &self,
        entities: &[CanonicalEntity],
        required: &[String],
    ) -> Vec<MissingRequiredFields> {
        entities
            .iter()
            .enumerate()
            .filter_map(|(entity_index, entity)| {
                let mut missing = Vec::new();
                if !entity.has_name() {
                    missing.push(NAME_REQUIREMENT.to_string());
                }
                for field in required {
                    if field != NAME_REQUIREMENT && entity.field(field).is_none() {
                        missing.push(field.clone());
                    }
                }
                if missing.is_empty() {
                    None
                } else {
                    Some(MissingRequiredFields { entity_index, missing })
                }
            })
            .collect()
    }

    /// Positions missing from the printed sequence
    ///
    /// Without any sequence hint there is nothing to infer, unless a declared total exceeds
    /// the number of entities found. At most `MAX_LISTED_POSITIONS` positions are listed; the
    /// rest are summarized in one final indicator.
    pub fn identify_missing_indicators(
        &self,
        entities: &[CanonicalEntity],
        hints: &PageRelationshipHints,
    ) -> Vec<MissingInventorIndicator> {
        let seen: BTreeSet<u32> = entities.iter().filter_map(|e| e.sequence_hint).collect();
        let found = u32::try_from(entities.len()).unwrap_or(u32::MAX);

        let Some(&max_seen) = seen.iter().next_back() else {
            return match hints.declared_total {
                Some(total) if total > found => missing_positions(&seen, found + 1, total, |_| {
                    format!("document declares {} but {} found", total, found)
                }),
                _ => Vec::new(),
            };
        };

        let first = hints.first_sequence;
        let last_expected = hints
            .declared_total
            .map(|total| first.saturating_add(total).saturating_sub(1))
            .unwrap_or(max_seen)
            .max(max_seen);

        missing_positions(&seen, first, last_expected, |position| {
            if position > max_seen {
                format!("declared total reaches position {} but highest printed is {}", last_expected, max_seen)
            } else {
                "gap in printed sequence".to_string()
            }
        })
    }

    /// Run all completeness checks
    pub fn validate(
        &self,
        entities: &[CanonicalEntity],
        expected_count: Option<usize>,
        hints: &PageRelationshipHints,
    ) -> CompletenessReport {
        let count = self.validate_count(entities, expected_count);
        let missing_fields = self.validate_field_completeness(entities, &self.required_fields);
        let indicators = self.identify_missing_indicators(entities, hints);

        info!(
            found = count.found(),
            count_mismatch = count.is_mismatch(),
            incomplete_entities = missing_fields.len(),
            suspected_gaps = indicators.len(),
            "Completeness validated"
        );

        CompletenessReport {
            generation_blocked: count.is_mismatch(),
            count,
            missing_fields,
            indicators,
        }
    }
}

/// Positions in `first..=last` not in `seen`, capped at `MAX_LISTED_POSITIONS` plus one summary
///
/// Scans at most `seen.len() + MAX_LISTED_POSITIONS + 1` positions however wide the range is.
fn missing_positions(
    seen: &BTreeSet<u32>,
    first: u32,
    last: u32,
    reason: impl Fn(u32) -> String,
) -> Vec<MissingInventorIndicator> {
    if first > last {
        return Vec::new();
    }

    let mut missing = (first..=last).filter(|position| !seen.contains(position));
    let mut indicators: Vec<MissingInventorIndicator> = missing
        .by_ref()
        .take(MAX_LISTED_POSITIONS)
        .map(|position| MissingInventorIndicator {
            suspected_position: position,
            reason: reason(position),
        })
        .collect();

    if let Some(next) = missing.next() {
        let span = u64::from(last) - u64::from(first) + 1;
        let present = seen.range(first..=last).count() as u64;
        let remaining = span - present - indicators.len() as u64;
        warn!(first, last, remaining, "Too many missing positions to list individually");
        indicators.push(MissingInventorIndicator {
            suspected_position: next,
            reason: format!("{} more position(s) through {} not listed individually", remaining, last),
        });
    }
    indicators
}
