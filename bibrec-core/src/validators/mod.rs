//! Tier 3: Validation
//!
//! - **completeness**: count gate, required fields, sequence gaps
//! - **field_comparator**: one source value vs. one generated value under one rule
//! - **output_validator**: whole-record comparison and the validation report
//!
//! `release_decision` combines the count gate and the validation report into the final
//! allow/block answer.

pub mod completeness;
pub mod field_comparator;
pub mod output_validator;

pub use completeness::{
    CompletenessReport, CompletenessValidator, CountValidationResult, MissingInventorIndicator,
    MissingRequiredFields, PageRelationshipHints,
};
pub use field_comparator::FieldComparator;
pub use output_validator::OutputValidator;

use crate::types::{Severity, ValidationReport};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Whether the generated document may be released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReleaseDecision {
    /// `partial` is set when the report was truncated, so not every field was compared
    Release { partial: bool },
    Blocked { reasons: Vec<String> },
}

impl ReleaseDecision {
    pub fn is_release(&self) -> bool {
        matches!(self, ReleaseDecision::Release { .. })
    }

    /// Released on a truncated report
    pub fn is_partial(&self) -> bool {
        matches!(self, ReleaseDecision::Release { partial: true })
    }
}

/// Combine the count gate and the validation report
///
/// A count mismatch blocks even when the report itself is valid. A truncated report never
/// blocks on its own but marks the release as partial.
pub fn release_decision(count: &CountValidationResult, report: &ValidationReport) -> ReleaseDecision {
    let mut reasons = Vec::new();

    if let CountValidationResult::Mismatch { expected, found } = count {
        reasons.push(format!("Expected {} entities, found {}", expected, found));
    }

    for mismatch in report.mismatches_with(Severity::Error) {
        reasons.push(format!(
            "{}: expected '{}', got '{}' ({})",
            mismatch.field_path, mismatch.expected_value, mismatch.actual_value, mismatch.rule_id
        ));
    }

    if reasons.is_empty() {
        if report.truncated {
            warn!(
                report_id = %report.report_id,
                fields_checked = report.fields_checked,
                "Releasing on a partial validation report"
            );
        }
        ReleaseDecision::Release {
            partial: report.truncated,
        }
    } else {
        ReleaseDecision::Blocked { reasons }
    }
}
