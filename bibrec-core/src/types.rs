//! Core Types for the Reconciliation Engine
//!
//! Defines the data contracts between the tiers:
//! - **Tier 1 output:** `CandidateEntity` (one detection in one chunk)
//! - **Tier 2 output:** `AggregatedEntity` (local merge) and `CanonicalEntity` (global merge)
//! - **Tier 3 output:** `FieldMismatch` and `ValidationReport` (output fidelity)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use uuid::Uuid;

/// Confidence score (0.0-1.0)
pub type Confidence = f64;

/// Logical field names shared by candidates and canonical entities
pub mod fields {
    pub const GIVEN_NAME: &str = "given_name";
    pub const FAMILY_NAME: &str = "family_name";
    pub const FULL_NAME: &str = "full_name";
    pub const CITY: &str = "city";
    pub const STATE: &str = "state";
    pub const POSTAL_CODE: &str = "postal_code";
    pub const COUNTRY: &str = "country";

    /// Name fields in the order they are reported
    pub const NAME_FIELDS: [&str; 3] = [FULL_NAME, GIVEN_NAME, FAMILY_NAME];
}

/// Rule id carried by mismatches the validator emits about itself (truncation)
pub const SYSTEM_RULE_ID: &str = "SYSTEM";

/// Field path used for system entries
pub const SYSTEM_FIELD_PATH: &str = "<system>";

// ============================================================================
// Tier 1: Candidates
// ============================================================================

/// Strategy that produced a candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Table,
    FormField,
    #[default]
    TextPattern,
    Layout,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMethod::Table => write!(f, "table"),
            DetectionMethod::FormField => write!(f, "form_field"),
            DetectionMethod::TextPattern => write!(f, "text_pattern"),
            DetectionMethod::Layout => write!(f, "layout"),
        }
    }
}

/// One detection of a person or organization in one chunk
///
/// Missing keys in input JSON deserialize to empty values rather than failing, so a
/// malformed candidate still flows through scoring and shows up in validation. Unscored
/// candidates count as fully confident and complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateEntity {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub full_name: Option<String>,
    #[serde(alias = "address")]
    pub address_components: BTreeMap<String, String>,
    #[serde(alias = "chunk")]
    pub source_chunk_index: usize,
    #[serde(alias = "page")]
    pub source_page: u32,
    /// Printed position (e.g. "inventor #2"), when the document shows one
    pub sequence_hint: Option<u32>,
    pub detection_method: DetectionMethod,
    pub confidence: Confidence,
    /// Fraction of expected fields present
    pub completeness: f64,
}

impl Default for CandidateEntity {
    fn default() -> Self {
        Self {
            given_name: None,
            family_name: None,
            full_name: None,
            address_components: BTreeMap::new(),
            source_chunk_index: 0,
            source_page: 0,
            sequence_hint: None,
            detection_method: DetectionMethod::default(),
            confidence: 1.0,
            completeness: 1.0,
        }
    }
}

impl CandidateEntity {
    pub fn new(source_chunk_index: usize, source_page: u32, detection_method: DetectionMethod) -> Self {
        Self {
            source_chunk_index,
            source_page,
            detection_method,
            ..Default::default()
        }
    }

    pub fn with_given_name(mut self, value: impl Into<String>) -> Self {
        self.given_name = Some(value.into());
        self
    }

    pub fn with_family_name(mut self, value: impl Into<String>) -> Self {
        self.family_name = Some(value.into());
        self
    }

    pub fn with_full_name(mut self, value: impl Into<String>) -> Self {
        self.full_name = Some(value.into());
        self
    }

    pub fn with_address(mut self, component: impl Into<String>, value: impl Into<String>) -> Self {
        self.address_components.insert(component.into(), value.into());
        self
    }

    pub fn with_sequence_hint(mut self, hint: u32) -> Self {
        self.sequence_hint = Some(hint);
        self
    }

    /// Set confidence and completeness, clamped to 0.0-1.0
    pub fn with_scores(mut self, confidence: Confidence, completeness: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self.completeness = completeness.clamp(0.0, 1.0);
        self
    }

    /// confidence × completeness, the ranking key used for primaries and field winners
    pub fn strength(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0) * self.completeness.clamp(0.0, 1.0)
    }

    /// Non-empty, trimmed value of a logical field (name field or address component)
    pub fn field_value(&self, field: &str) -> Option<&str> {
        let raw = match field {
            fields::GIVEN_NAME => self.given_name.as_deref(),
            fields::FAMILY_NAME => self.family_name.as_deref(),
            fields::FULL_NAME => self.full_name.as_deref(),
            component => self.address_components.get(component).map(String::as_str),
        };
        raw.map(str::trim).filter(|v| !v.is_empty())
    }

    /// All populated fields: name fields first, then address components in key order
    pub fn populated_fields(&self) -> Vec<(&str, &str)> {
        let mut populated: Vec<(&str, &str)> = fields::NAME_FIELDS
            .iter()
            .filter_map(|name| self.field_value(name).map(|v| (*name, v)))
            .collect();

        for key in self.address_components.keys() {
            if let Some(value) = self.field_value(key) {
                populated.push((key.as_str(), value));
            }
        }
        populated
    }

    /// Full name if printed, otherwise given and family names joined
    pub fn display_name(&self) -> Option<String> {
        if let Some(full) = self.field_value(fields::FULL_NAME) {
            return Some(full.to_string());
        }
        let parts: Vec<&str> = [fields::GIVEN_NAME, fields::FAMILY_NAME]
            .iter()
            .filter_map(|f| self.field_value(f))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

// ============================================================================
// Tier 2: Aggregated and Canonical Entities
// ============================================================================

/// Candidates believed to describe one appearance of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEntity {
    /// Member with the highest confidence × completeness
    pub primary: CandidateEntity,
    /// Non-empty, contains `primary`
    pub members: Vec<CandidateEntity>,
    pub aggregate_confidence: Confidence,
    /// Fields where members disagree
    pub conflicts: BTreeSet<String>,
}

impl AggregatedEntity {
    /// Smallest (chunk, sequence hint) among members; approximates document order
    pub fn order_key(&self) -> (usize, u32) {
        self.members
            .iter()
            .map(|m| (m.source_chunk_index, m.sequence_hint.unwrap_or(u32::MAX)))
            .min()
            .unwrap_or((self.primary.source_chunk_index, u32::MAX))
    }
}

/// Final answer for one real-world inventor or applicant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    /// Resolved values, one winner per field
    pub fields: BTreeMap<String, String>,
    /// Chunk index the winning value came from
    pub provenance: BTreeMap<String, usize>,
    pub quality_score: f64,
    /// Smallest printed sequence hint among members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_hint: Option<u32>,
    /// Distinct chunk indices of all members, ascending
    #[serde(default)]
    pub source_chunks: Vec<usize>,
    /// Diagnostic explanation of conflict resolutions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolution_notes: Vec<String>,
}

impl CanonicalEntity {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// A name is present when either a full name or a family name was resolved
    pub fn has_name(&self) -> bool {
        self.field(fields::FULL_NAME).is_some() || self.field(fields::FAMILY_NAME).is_some()
    }
}

// ============================================================================
// Tier 3: Output Fidelity
// ============================================================================

/// Mismatch severity, assigned by the rule that detected it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[serde(alias = "error")]
    Error,
    #[serde(alias = "warning")]
    Warning,
    #[serde(alias = "info")]
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// One field-level discrepancy between source and generated output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMismatch {
    pub field_path: String,
    pub expected_value: String,
    pub actual_value: String,
    pub severity: Severity,
    pub rule_id: String,
    pub auto_corrected: bool,
    pub description: String,
}

/// Mismatch counts by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchCounts {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl MismatchCounts {
    pub fn from_mismatches(mismatches: &[FieldMismatch]) -> Self {
        let mut counts = Self::default();
        for mismatch in mismatches {
            match mismatch.severity {
                Severity::Error => counts.errors += 1,
                Severity::Warning => counts.warnings += 1,
                Severity::Info => counts.infos += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.infos
    }
}

/// Result of one comparison run; immutable once returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// True iff there are no ERROR mismatches
    pub is_valid: bool,
    /// True iff at least one mismatch is an ERROR
    pub generation_blocked: bool,
    pub mismatches: Vec<FieldMismatch>,
    pub counts: MismatchCounts,
    pub fields_checked: usize,
    pub processing_time_ms: u64,
    /// Size or time guard stopped the run early
    pub truncated: bool,
    pub rule_table_version: String,
}

impl ValidationReport {
    /// Build a report, deriving counts and the blocking decision from the mismatches
    pub fn new(
        mismatches: Vec<FieldMismatch>,
        fields_checked: usize,
        processing_time_ms: u64,
        truncated: bool,
        rule_table_version: impl Into<String>,
    ) -> Self {
        let counts = MismatchCounts::from_mismatches(&mismatches);
        let generation_blocked = counts.errors > 0;
        Self {
            report_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            is_valid: !generation_blocked,
            generation_blocked,
            mismatches,
            counts,
            fields_checked,
            processing_time_ms,
            truncated,
            rule_table_version: rule_table_version.into(),
        }
    }

    pub fn mismatches_with(&self, severity: Severity) -> impl Iterator<Item = &FieldMismatch> {
        self.mismatches.iter().filter(move |m| m.severity == severity)
    }

    /// One-line summary for logs and CLI output
    pub fn summary_message(&self) -> String {
        let partial = if self.truncated { " (partial)" } else { "" };
        if self.generation_blocked {
            format!(
                "Validation failed{}: {} error(s), {} warning(s), {} info(s) across {} field(s)",
                partial, self.counts.errors, self.counts.warnings, self.counts.infos, self.fields_checked
            )
        } else if self.counts.total() > 0 {
            format!(
                "Validation passed{} with {} warning(s), {} info(s) across {} field(s)",
                partial, self.counts.warnings, self.counts.infos, self.fields_checked
            )
        } else {
            format!("Validation passed{}: {} field(s) checked", partial, self.fields_checked)
        }
    }
}

// ============================================================================
// External Calls
// ============================================================================

/// Error from an external collaborator (candidate backend, structure extractor)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    /// Call exceeded its time budget
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Backend reported a failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Backend answered with something unparseable
    #[error("Parse error: {0}")]
    Parse(String),

    /// Backend is not configured or reachable
    #[error("Source not available: {0}")]
    NotAvailable(String),
}

impl ExtractionError {
    /// Whether retrying the same call can plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractionError::Timeout(_) | ExtractionError::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_field_values_are_trimmed() {
        let candidate = CandidateEntity::new(0, 1, DetectionMethod::Table)
            .with_given_name("  John ")
            .with_family_name("")
            .with_address("city", " Boston");

        assert_eq!(candidate.field_value("given_name"), Some("John"));
        assert_eq!(candidate.field_value("family_name"), None);
        assert_eq!(candidate.field_value("city"), Some("Boston"));
        assert_eq!(candidate.display_name().as_deref(), Some("John"));
    }

    #[test]
    fn test_missing_json_keys_default_to_empty() {
        let candidate: CandidateEntity =
            serde_json::from_str(r#"{"family_name": "SMITH", "chunk": 3}"#).unwrap();
        assert_eq!(candidate.family_name.as_deref(), Some("SMITH"));
        assert_eq!(candidate.source_chunk_index, 3);
        assert!(candidate.address_components.is_empty());
        assert_eq!(candidate.detection_method, DetectionMethod::TextPattern);
        assert_eq!(candidate.strength(), 1.0);
        assert_eq!(candidate.strength(), CandidateEntity::new(0, 0, DetectionMethod::Table).strength());
    }

    #[test]
    fn test_scores_are_clamped() {
        let candidate = CandidateEntity::new(0, 1, DetectionMethod::Layout).with_scores(1.4, -0.2);
        assert_eq!(candidate.confidence, 1.0);
        assert_eq!(candidate.completeness, 0.0);
        assert_eq!(candidate.strength(), 0.0);
    }

    #[test]
    fn test_report_blocks_only_on_errors() {
        let warning = FieldMismatch {
            field_path: "inventors[0].country".into(),
            expected_value: "United States".into(),
            actual_value: "US".into(),
            severity: Severity::Warning,
            rule_id: "country".into(),
            auto_corrected: true,
            description: String::new(),
        };
        let report = ValidationReport::new(vec![warning.clone()], 1, 0, false, "test");
        assert!(report.is_valid);
        assert!(!report.generation_blocked);

        let error = FieldMismatch {
            severity: Severity::Error,
            ..warning
        };
        let report = ValidationReport::new(vec![error], 1, 0, false, "test");
        assert!(!report.is_valid);
        assert!(report.generation_blocked);
        assert_eq!(report.counts.errors, 1);
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"WARNING\"");
        let parsed: Severity = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(parsed, Severity::Error);
    }
}
