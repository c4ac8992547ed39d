//! Field Comparator
//!
//! Compares one source value with one generated value under one rule, in two stages:
//!
//! 1. Trim and collapse whitespace. Equal → no mismatch.
//! 2. Case-fold and apply the rule's canonical mapping. Equal → normalization-only
//!    difference, reported with the rule's `cosmetic_severity`.
//!
//! Anything else is a substantive mismatch with the rule's `severity`.

use crate::rules::tables::NormalizationTables;
use crate::rules::{FieldRule, NormalizationFn};
use crate::similarity::normalize::{collapse_whitespace, fold_text, normalize_postal};
use crate::types::FieldMismatch;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FieldComparator {
    tables: Arc<NormalizationTables>,
}

impl Default for FieldComparator {
    fn default() -> Self {
        Self::new(Arc::new(NormalizationTables::builtin()))
    }
}

impl FieldComparator {
    pub fn new(tables: Arc<NormalizationTables>) -> Self {
        Self { tables }
    }

    /// Compare `expected` (source) with `actual` (generated); `None` when they agree
    pub fn compare(&self, field_path: &str, expected: &str, actual: &str, rule: &FieldRule) -> Option<FieldMismatch> {
        let expected_clean = collapse_whitespace(expected);
        let actual_clean = collapse_whitespace(actual);
        if expected_clean == actual_clean {
            return None;
        }

        let auto_corrected = rule.normalization.has_canonical_mapping()
            && self
                .canonical_mapping(rule.normalization, &expected_clean)
                .map_or(false, |canonical| canonical == actual_clean);

        let expected_norm = self.normalize(rule.normalization, &expected_clean);
        let actual_norm = self.normalize(rule.normalization, &actual_clean);

        let (severity, description) = if !actual_clean.is_empty() && expected_norm == actual_norm {
            (
                rule.cosmetic_severity,
                format!("Values differ only in {} form", describe(rule.normalization)),
            )
        } else if actual_clean.is_empty() {
            (rule.severity, "Field missing from generated output".to_string())
        } else if expected_clean.is_empty() {
            (rule.severity, "Generated output has a value the source does not".to_string())
        } else {
            (rule.severity, "Values differ after normalization".to_string())
        };

        Some(FieldMismatch {
            field_path: field_path.to_string(),
            expected_value: expected.to_string(),
            actual_value: actual.to_string(),
            severity,
            rule_id: rule.id.clone(),
            auto_corrected,
            description,
        })
    }

    /// Stage 2 comparison key
    fn normalize(&self, normalization: NormalizationFn, value: &str) -> String {
        match normalization {
            NormalizationFn::Exact => value.to_string(),
            NormalizationFn::Text | NormalizationFn::Name => fold_text(value),
            NormalizationFn::PostalCode => normalize_postal(value),
            NormalizationFn::Country | NormalizationFn::UsState | NormalizationFn::EntityStatus => self
                .canonical_mapping(normalization, value)
                .unwrap_or_else(|| fold_text(value)),
        }
    }

    /// Canonical form under a table-backed rule, if the value is known
    fn canonical_mapping(&self, normalization: NormalizationFn, value: &str) -> Option<String> {
        let canonical = match normalization {
            NormalizationFn::Country => self.tables.canonical_country(value),
            NormalizationFn::UsState => self.tables.canonical_state(value),
            NormalizationFn::EntityStatus => self.tables.canonical_entity_status(value),
            _ => None,
        };
        canonical.map(str::to_string)
    }
}

fn describe(normalization: NormalizationFn) -> &'static str {
    match normalization {
        NormalizationFn::Exact => "whitespace",
        NormalizationFn::Text => "case or punctuation",
        NormalizationFn::Name => "name casing or diacritic",
        NormalizationFn::Country => "country name vs. ISO code",
        NormalizationFn::UsState => "state name vs. postal code",
        NormalizationFn::EntityStatus => "entity status wording",
        NormalizationFn::PostalCode => "postal code formatting",
    }
}
