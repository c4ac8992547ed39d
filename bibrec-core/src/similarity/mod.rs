//! Similarity Scorer
//!
//! Pure, deterministic similarity between two candidate entities. Three signals:
//! - **Name**: token overlap coefficient blended with normalized Levenshtein (strsim)
//! - **Address**: weighted agreement of postal code, city and country
//! - **Sequence**: printed position hints agree
//!
//! The combined score only weighs signals both candidates carry, so a candidate without an
//! address is judged on its name instead of being penalized for the gap.

pub mod normalize;

use crate::rules::tables::NormalizationTables;
use crate::types::{fields, CandidateEntity};
use normalize::{fold_text, name_tokens, normalize_postal};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Weight of token overlap vs edit ratio inside `name_similarity`
const TOKEN_OVERLAP_WEIGHT: f64 = 0.6;
const EDIT_RATIO_WEIGHT: f64 = 0.4;

/// Edit distance above this fraction of the longer name means "unrelated" when no token matches
const UNRELATED_EDIT_FRACTION: f64 = 0.5;

/// Address component weights (postal code dominates)
const POSTAL_WEIGHT: f64 = 0.5;
const CITY_WEIGHT: f64 = 0.3;
const COUNTRY_WEIGHT: f64 = 0.2;

/// Weights of the three signals in the combined score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub name: f64,
    pub address: f64,
    pub sequence: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            name: 0.5,
            address: 0.3,
            sequence: 0.2,
        }
    }
}

/// Similarity between two candidates, using the configured weights and country table
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    weights: SignalWeights,
    tables: Arc<NormalizationTables>,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(SignalWeights::default(), Arc::new(NormalizationTables::builtin()))
    }
}

impl SimilarityScorer {
    pub fn new(weights: SignalWeights, tables: Arc<NormalizationTables>) -> Self {
        Self { weights, tables }
    }

    /// Combined similarity of two candidates, renormalized over available signals
    pub fn score(&self, a: &CandidateEntity, b: &CandidateEntity) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        if let (Some(name_a), Some(name_b)) = (a.display_name(), b.display_name()) {
            weighted += self.weights.name * name_similarity(&name_a, &name_b);
            total_weight += self.weights.name;
        }

        if let Some(address) = self.compare_addresses(a, b) {
            weighted += self.weights.address * address;
            total_weight += self.weights.address;
        }

        if let Some(sequence) = compare_sequence(a.sequence_hint, b.sequence_hint) {
            weighted += self.weights.sequence * sequence;
            total_weight += self.weights.sequence;
        }

        if total_weight <= 0.0 {
            return 0.0;
        }
        (weighted / total_weight).clamp(0.0, 1.0)
    }

    /// Address agreement in 0.0-1.0; 0.0 when no component is comparable
    pub fn address_similarity(&self, a: &CandidateEntity, b: &CandidateEntity) -> f64 {
        self.compare_addresses(a, b).unwrap_or(0.0)
    }

    /// Address agreement over components both sides carry, or `None` if there are none
    fn compare_addresses(&self, a: &CandidateEntity, b: &CandidateEntity) -> Option<f64> {
        let mut agreement = 0.0;
        let mut denominator = 0.0;

        if let (Some(pa), Some(pb)) = (a.field_value(fields::POSTAL_CODE), b.field_value(fields::POSTAL_CODE)) {
            denominator += POSTAL_WEIGHT;
            if normalize_postal(pa) == normalize_postal(pb) {
                agreement += POSTAL_WEIGHT;
            }
        }

        if let (Some(ca), Some(cb)) = (a.field_value(fields::CITY), b.field_value(fields::CITY)) {
            denominator += CITY_WEIGHT;
            if fold_text(ca) == fold_text(cb) {
                agreement += CITY_WEIGHT;
            }
        }

        if let (Some(ka), Some(kb)) = (a.field_value(fields::COUNTRY), b.field_value(fields::COUNTRY)) {
            denominator += COUNTRY_WEIGHT;
            if self.country_key(ka) == self.country_key(kb) {
                agreement += COUNTRY_WEIGHT;
            }
        }

        if denominator > 0.0 {
            Some(agreement / denominator)
        } else {
            None
        }
    }

    fn country_key(&self, value: &str) -> String {
        self.tables
            .canonical_country(value)
            .map(str::to_string)
            .unwrap_or_else(|| fold_text(value))
    }

    /// Normalized form of a field value, used to decide whether two members disagree
    pub fn normalized_field(&self, field: &str, value: &str) -> String {
        match field {
            fields::GIVEN_NAME | fields::FAMILY_NAME | fields::FULL_NAME => {
                let tokens = name_tokens(value);
                if tokens.is_empty() {
                    fold_text(value)
                } else {
                    sorted_join(&tokens)
                }
            }
            fields::POSTAL_CODE => normalize_postal(value),
            fields::COUNTRY => self.country_key(value),
            fields::STATE => self
                .tables
                .canonical_state(value)
                .map(str::to_string)
                .unwrap_or_else(|| fold_text(value)),
            _ => fold_text(value),
        }
    }
}

/// Name similarity in 0.0-1.0
///
/// Case, diacritics, punctuation, initials and token order are ignored, so "SMITH, John" and
/// "John Smith" are the same name. Names with no shared token whose edit distance exceeds half
/// the longer name score 0.0.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = name_tokens(a);
    let tokens_b = name_tokens(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let norm_a = tokens_a.join(" ");
    let norm_b = tokens_b.join(" ");
    let sorted_a = sorted_join(&tokens_a);
    let sorted_b = sorted_join(&tokens_b);
    if sorted_a == sorted_b {
        return 1.0;
    }

    let set_a: HashSet<&str> = tokens_a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = tokens_b.iter().map(String::as_str).collect();
    let shared = set_a.intersection(&set_b).count();
    let overlap = shared as f64 / set_a.len().min(set_b.len()) as f64;

    // Best of printed order and token-sorted order
    let distance = strsim::levenshtein(&norm_a, &norm_b).min(strsim::levenshtein(&sorted_a, &sorted_b));
    let longest = norm_a.chars().count().max(norm_b.chars().count());

    if shared == 0 && distance as f64 > UNRELATED_EDIT_FRACTION * longest as f64 {
        return 0.0;
    }

    let edit_ratio = 1.0 - distance as f64 / longest as f64;
    (TOKEN_OVERLAP_WEIGHT * overlap + EDIT_RATIO_WEIGHT * edit_ratio).clamp(0.0, 1.0)
}

fn sorted_join(tokens: &[String]) -> String {
    let mut sorted: Vec<&str> = tokens.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(" ")
}

/// 1.0 if both hints are present and equal, 0.0 otherwise
pub fn sequence_similarity(hint_a: Option<u32>, hint_b: Option<u32>) -> f64 {
    compare_sequence(hint_a, hint_b).unwrap_or(0.0)
}

/// Sequence signal, available only when both hints are present
fn compare_sequence(hint_a: Option<u32>, hint_b: Option<u32>) -> Option<f64> {
    match (hint_a, hint_b) {
        (Some(a), Some(b)) => Some(if a == b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
