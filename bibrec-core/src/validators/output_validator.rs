//! Output Validator
//!
//! Walks every source field in document order, compares it with the generated output under
//! the matching rule and collects the mismatches into a `ValidationReport`.
//!
//! Runs are bounded by a field-count guard and a wall-clock budget. When either trips, the
//! report is marked `truncated` and carries an INFO entry with rule id `SYSTEM`, so a partial
//! run can never pass as a complete one.

use super::field_comparator::FieldComparator;
use crate::config::ValidatorConfig;
use crate::record::FieldRecord;
use crate::rules::RuleTable;
use crate::types::{CanonicalEntity, FieldMismatch, Severity, ValidationReport, SYSTEM_FIELD_PATH, SYSTEM_RULE_ID};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub struct OutputValidator {
    rules: Arc<RuleTable>,
    comparator: FieldComparator,
    config: ValidatorConfig,
}

impl OutputValidator {
    pub fn new(rules: Arc<RuleTable>, config: ValidatorConfig) -> Self {
        let comparator = FieldComparator::new(rules.tables());
        Self {
            rules,
            comparator,
            config,
        }
    }

    /// Compare a generated record against its source record
    pub fn validate(&self, source: &FieldRecord, generated: &FieldRecord) -> ValidationReport {
        let start = Instant::now();
        let budget = Duration::from_millis(self.config.time_budget_ms);

        let mut mismatches: Vec<FieldMismatch> = Vec::new();
        let mut fields_checked = 0usize;
        let mut truncation: Option<String> = None;

        for (path, expected) in source.iter() {
            if fields_checked >= self.config.max_fields {
                truncation = Some(format!(
                    "Size guard reached: {} of {} fields checked (limit {})",
                    fields_checked,
                    source.len(),
                    self.config.max_fields
                ));
                break;
            }
            if start.elapsed() >= budget {
                truncation = Some(format!(
                    "Time budget of {} ms exhausted: {} of {} fields checked",
                    self.config.time_budget_ms,
                    fields_checked,
                    source.len()
                ));
                break;
            }

            let rule = self.rules.rule_for(path);
            let actual = generated.get(path).unwrap_or("");
            if let Some(mismatch) = self.comparator.compare(path, expected, actual, rule) {
                mismatches.push(mismatch);
            }
            fields_checked += 1;
        }

        let truncated = truncation.is_some();
        if let Some(description) = truncation {
            warn!(fields_checked, total = source.len(), "{}", description);
            mismatches.push(FieldMismatch {
                field_path: SYSTEM_FIELD_PATH.to_string(),
                expected_value: source.len().to_string(),
                actual_value: fields_checked.to_string(),
                severity: Severity::Info,
                rule_id: SYSTEM_RULE_ID.to_string(),
                auto_corrected: false,
                description,
            });
        }

        let report = ValidationReport::new(
            mismatches,
            fields_checked,
            start.elapsed().as_millis() as u64,
            truncated,
            self.rules.version(),
        );

        info!(
            report_id = %report.report_id,
            errors = report.counts.errors,
            warnings = report.counts.warnings,
            infos = report.counts.infos,
            truncated = report.truncated,
            "{}",
            report.summary_message()
        );

        report
    }

    /// Validate generated output against canonical entities listed under the configured collection
    pub fn validate_entities(&self, entities: &[CanonicalEntity], generated: &FieldRecord) -> ValidationReport {
        let source = FieldRecord::from_canonical(&self.config.entity_collection, entities);
        self.validate(&source, generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(config: ValidatorConfig) -> OutputValidator {
        OutputValidator::new(Arc::new(RuleTable::builtin().unwrap()), config)
    }

    #[test]
    fn test_identical_records_are_valid() {
        let record: FieldRecord = [("title", "Widget"), ("inventors[0].family_name", "Doe")]
            .into_iter()
            .collect();

        let report = validator(ValidatorConfig::default()).validate(&record, &record);

        assert!(report.is_valid);
        assert!(report.mismatches.is_empty());
        assert_eq!(report.fields_checked, 2);
        assert_eq!(report.rule_table_version, "builtin-1");
    }

    #[test]
    fn test_unknown_field_uses_default_rule() {
        let source: FieldRecord = [("abstract", "A widget")].into_iter().collect();
        let generated: FieldRecord = [("abstract", "A gadget")].into_iter().collect();

        let report = validator(ValidatorConfig::default()).validate(&source, &generated);

        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].rule_id, "default");
        assert_eq!(report.mismatches[0].severity, Severity::Warning);
        assert!(report.is_valid);
    }

    #[test]
    fn test_size_guard_truncates() {
        let source: FieldRecord = (0..5).map(|i| (format!("notes[{}]", i), "x")).collect();
        let config = ValidatorConfig {
            max_fields: 3,
            ..Default::default()
        };

        let report = validator(config).validate(&source, &FieldRecord::new());

        assert!(report.truncated);
        assert_eq!(report.fields_checked, 3);
        let system: Vec<&FieldMismatch> = report.mismatches.iter().filter(|m| m.rule_id == SYSTEM_RULE_ID).collect();
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].severity, Severity::Info);
    }

    #[test]
    fn test_exhausted_time_budget_truncates() {
        let source: FieldRecord = [("title", "Widget")].into_iter().collect();
        let config = ValidatorConfig {
            time_budget_ms: 0,
            ..Default::default()
        };

        let report = validator(config).validate(&source, &source);

        assert!(report.truncated);
        assert_eq!(report.fields_checked, 0);
        assert_eq!(report.counts.infos, 1);
    }
}
