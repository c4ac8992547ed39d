//! Field Rule Table
//!
//! Versioned mapping from field path (or path pattern) to a comparison rule. The table is
//! configuration: rules are loaded from TOML and can be extended without touching the
//! comparison algorithms.
//!
//! # Path syntax
//! - Concrete: `title`, `inventors[0].family_name`
//! - Pattern: `inventors[*].country` (`[*]` matches any index, `*` matches a whole segment name)
//!
//! # Lookup order
//! 1. Rule whose path equals the field path exactly
//! 2. First pattern rule (in table order) matching the field path
//! 3. The default rule (WARNING)
//!
//! # Rule file
//! ```toml
//! version = "2024.1"
//! required_paths = ["inventors[*].family_name"]
//!
//! [[rules]]
//! id = "country-code"
//! path = "inventors[*].country"
//! normalization = "country"
//! severity = "warning"
//! cosmetic_severity = "warning"
//!
//! [country_aliases]
//! "Bundesrepublik" = "DE"
//! ```

pub mod tables;

use crate::error::{EngineError, EngineResult};
use crate::types::{Severity, SYSTEM_RULE_ID};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tables::NormalizationTables;
use tracing::{debug, info};

/// Id of the fallback rule applied to fields no rule covers
pub const DEFAULT_RULE_ID: &str = "default";

/// Rule-specific normalization applied after trimming and case folding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationFn {
    /// Whitespace only; any other difference is substantive
    Exact,
    /// Case, diacritics and punctuation insensitive
    #[default]
    Text,
    /// Person or organization name (same folding as `Text`)
    Name,
    /// Country name or code → ISO 3166-1 alpha-2
    Country,
    /// US state name or code → two-letter code
    UsState,
    /// Verbose entity-status phrase → canonical token
    EntityStatus,
    /// Spaces and hyphens ignored
    PostalCode,
}

impl NormalizationFn {
    /// Whether the rule maps values to a canonical form (and can report auto-corrections)
    pub fn has_canonical_mapping(self) -> bool {
        matches!(
            self,
            NormalizationFn::Country | NormalizationFn::UsState | NormalizationFn::EntityStatus
        )
    }
}

/// One comparison rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub id: String,
    /// Field path or pattern this rule applies to
    pub path: String,
    #[serde(default)]
    pub normalization: NormalizationFn,
    /// Severity when values differ after normalization
    pub severity: Severity,
    /// Severity when values differ only until normalized (casing, ISO mapping)
    #[serde(default = "default_cosmetic_severity")]
    pub cosmetic_severity: Severity,
}

fn default_cosmetic_severity() -> Severity {
    Severity::Info
}

impl FieldRule {
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        normalization: NormalizationFn,
        severity: Severity,
        cosmetic_severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            normalization,
            severity,
            cosmetic_severity,
        }
    }

    /// Rule applied when no configured rule matches a field
    pub fn fallback() -> Self {
        Self::new(DEFAULT_RULE_ID, "*", NormalizationFn::Text, Severity::Warning, Severity::Info)
    }
}

/// On-disk shape of a rule table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleTableFile {
    pub version: String,
    #[serde(default)]
    pub rules: Vec<FieldRule>,
    /// Field classes that must be covered by a rule; missing coverage is fatal at startup
    #[serde(default)]
    pub required_paths: Vec<String>,
    #[serde(default)]
    pub country_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub state_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub entity_status_aliases: BTreeMap<String, String>,
}

/// Parsed path segment: name plus zero or more index selectors
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    indices: Vec<Option<usize>>,
}

/// Parsed field path or pattern
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    fn parse(path: &str) -> Option<Self> {
        let mut segments = Vec::new();
        for raw in path.split('.') {
            let (name, mut rest) = match raw.find('[') {
                Some(pos) => (&raw[..pos], &raw[pos..]),
                None => (raw, ""),
            };
            if name.is_empty() {
                return None;
            }
            let mut indices = Vec::new();
            while !rest.is_empty() {
                let close = rest.find(']')?;
                if !rest.starts_with('[') {
                    return None;
                }
                let inner = &rest[1..close];
                indices.push(if inner == "*" { None } else { Some(inner.parse().ok()?) });
                rest = &rest[close + 1..];
            }
            segments.push(Segment {
                name: name.to_string(),
                indices,
            });
        }
        Some(Self { segments })
    }

    fn is_wildcard(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s.name == "*" || s.indices.iter().any(Option::is_none))
    }

    fn matches(&self, concrete: &PathPattern) -> bool {
        self.segments.len() == concrete.segments.len()
            && self.segments.iter().zip(&concrete.segments).all(|(p, c)| {
                (p.name == "*" || p.name == c.name)
                    && p.indices.len() == c.indices.len()
                    && p.indices
                        .iter()
                        .zip(&c.indices)
                        .all(|(pi, ci)| pi.is_none() || pi == ci)
            })
    }

    /// Concrete instance of a pattern (`[*]` → `[0]`), used for coverage checks
    fn instance(&self) -> PathPattern {
        PathPattern {
            segments: self
                .segments
                .iter()
                .map(|s| Segment {
                    name: s.name.clone(),
                    indices: s.indices.iter().map(|i| Some(i.unwrap_or(0))).collect(),
                })
                .collect(),
        }
    }
}

/// Compiled, immutable rule table
#[derive(Debug, Clone)]
pub struct RuleTable {
    version: String,
    rules: Vec<FieldRule>,
    exact: HashMap<String, usize>,
    patterns: Vec<(PathPattern, usize)>,
    required_paths: Vec<String>,
    default_rule: FieldRule,
    tables: Arc<NormalizationTables>,
}

impl RuleTable {
    /// Compile and validate a rule table
    ///
    /// # Errors
    /// - `InvalidRule` for empty or duplicate ids, reserved ids, unparseable paths
    /// - `MissingRule` when a required path has no covering rule
    pub fn from_file(file: RuleTableFile) -> EngineResult<Self> {
        let mut seen = HashSet::new();
        let mut exact = HashMap::new();
        let mut patterns = Vec::new();

        for (index, rule) in file.rules.iter().enumerate() {
            if rule.id.trim().is_empty() {
                return Err(EngineError::InvalidRule {
                    id: format!("#{}", index),
                    reason: "rule id is empty".to_string(),
                });
            }
            if rule.id == SYSTEM_RULE_ID || rule.id == DEFAULT_RULE_ID {
                return Err(EngineError::InvalidRule {
                    id: rule.id.clone(),
                    reason: "rule id is reserved".to_string(),
                });
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(EngineError::InvalidRule {
                    id: rule.id.clone(),
                    reason: "duplicate rule id".to_string(),
                });
            }

            let pattern = PathPattern::parse(&rule.path).ok_or_else(|| EngineError::InvalidRule {
                id: rule.id.clone(),
                reason: format!("invalid path '{}'", rule.path),
            })?;

            if pattern.is_wildcard() {
                patterns.push((pattern, index));
            } else {
                exact.entry(rule.path.clone()).or_insert(index);
            }
        }

        let tables = NormalizationTables::builtin().with_aliases(
            &file.country_aliases,
            &file.state_aliases,
            &file.entity_status_aliases,
        );

        let table = Self {
            version: file.version,
            rules: file.rules,
            exact,
            patterns,
            required_paths: file.required_paths,
            default_rule: FieldRule::fallback(),
            tables: Arc::new(tables),
        };

        for required in &table.required_paths {
            if !table.covers(required) {
                return Err(EngineError::MissingRule {
                    class: required.clone(),
                });
            }
        }

        info!(
            version = %table.version,
            rules = table.rules.len(),
            patterns = table.patterns.len(),
            required = table.required_paths.len(),
            "Rule table loaded"
        );

        Ok(table)
    }

    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let file: RuleTableFile = toml::from_str(content)
            .map_err(|e| EngineError::Config(format!("Parse rule table failed: {}", e)))?;
        Self::from_file(file)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Read rule table {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Built-in field map for inventors, applicants, priority claims and filing metadata
    pub fn builtin() -> EngineResult<Self> {
        Self::from_file(builtin_rule_file())
    }

    /// Rule for a concrete field path (never fails: falls back to the default rule)
    pub fn rule_for(&self, field_path: &str) -> &FieldRule {
        if let Some(&index) = self.exact.get(field_path) {
            return &self.rules[index];
        }

        if let Some(concrete) = PathPattern::parse(field_path) {
            if let Some((_, index)) = self.patterns.iter().find(|(p, _)| p.matches(&concrete)) {
                return &self.rules[*index];
            }
        }

        debug!(field_path, "No rule for field, using default rule");
        &self.default_rule
    }

    /// Whether some configured (non-default) rule applies to a path or pattern
    pub fn covers(&self, path: &str) -> bool {
        if self.rules.iter().any(|r| r.path == path) {
            return true;
        }
        let Some(pattern) = PathPattern::parse(path) else {
            return false;
        };
        let instance = pattern.instance();
        self.rules.iter().any(|r| {
            PathPattern::parse(&r.path)
                .map(|p| p.matches(&instance))
                .unwrap_or(false)
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn required_paths(&self) -> &[String] {
        &self.required_paths
    }

    pub fn tables(&self) -> Arc<NormalizationTables> {
        Arc::clone(&self.tables)
    }
}

fn builtin_rule_file() -> RuleTableFile {
    use NormalizationFn::*;
    use Severity::{Error, Info, Warning};

    let rules = vec![
        FieldRule::new("inventor-given-name", "inventors[*].given_name", Name, Error, Info),
        FieldRule::new("inventor-family-name", "inventors[*].family_name", Name, Error, Info),
        FieldRule::new("inventor-full-name", "inventors[*].full_name", Name, Error, Info),
        FieldRule::new("inventor-city", "inventors[*].city", Text, Warning, Info),
        FieldRule::new("inventor-state", "inventors[*].state", UsState, Warning, Warning),
        FieldRule::new("inventor-country", "inventors[*].country", Country, Warning, Warning),
        FieldRule::new("inventor-postal-code", "inventors[*].postal_code", PostalCode, Warning, Info),
        FieldRule::new("applicant-name", "applicants[*].name", Name, Error, Info),
        FieldRule::new("applicant-given-name", "applicants[*].given_name", Name, Error, Info),
        FieldRule::new("applicant-family-name", "applicants[*].family_name", Name, Error, Info),
        FieldRule::new("applicant-full-name", "applicants[*].full_name", Name, Error, Info),
        FieldRule::new("applicant-city", "applicants[*].city", Text, Warning, Info),
        FieldRule::new("applicant-state", "applicants[*].state", UsState, Warning, Warning),
        FieldRule::new("applicant-country", "applicants[*].country", Country, Warning, Warning),
        FieldRule::new("applicant-postal-code", "applicants[*].postal_code", PostalCode, Warning, Info),
        FieldRule::new("priority-application-number", "priority_claims[*].application_number", Exact, Error, Info),
        FieldRule::new("priority-filing-date", "priority_claims[*].filing_date", Exact, Error, Info),
        FieldRule::new("priority-country", "priority_claims[*].country", Country, Warning, Warning),
        FieldRule::new("invention-title", "title", Text, Error, Info),
        FieldRule::new("entity-status", "entity_status", EntityStatus, Warning, Warning),
        FieldRule::new("docket-number", "attorney_docket_number", Exact, Error, Info),
    ];

    RuleTableFile {
        version: "builtin-1".to_string(),
        rules,
        required_paths: vec![
            "inventors[*].given_name".to_string(),
            "inventors[*].family_name".to_string(),
            "title".to_string(),
        ],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_path_beats_pattern() {
        let table = RuleTable::from_toml_str(
            r#"
            version = "t1"

            [[rules]]
            id = "any-country"
            path = "inventors[*].country"
            normalization = "country"
            severity = "warning"

            [[rules]]
            id = "first-country"
            path = "inventors[0].country"
            normalization = "exact"
            severity = "error"
            "#,
        )
        .unwrap();

        assert_eq!(table.rule_for("inventors[0].country").id, "first-country");
        assert_eq!(table.rule_for("inventors[3].country").id, "any-country");
        assert_eq!(table.rule_for("title").id, DEFAULT_RULE_ID);
    }

    #[test]
    fn test_segment_wildcard() {
        let table = RuleTable::from_toml_str(
            r#"
            version = "t2"
            [[rules]]
            id = "any-country"
            path = "*[*].country"
            normalization = "country"
            severity = "warning"
            "#,
        )
        .unwrap();

        assert_eq!(table.rule_for("applicants[2].country").id, "any-country");
        assert_eq!(table.rule_for("country").id, DEFAULT_RULE_ID);
    }

    #[test]
    fn test_missing_required_rule_is_fatal() {
        let result = RuleTable::from_toml_str(
            r#"
            version = "t3"
            required_paths = ["inventors[*].family_name"]
            [[rules]]
            id = "title"
            path = "title"
            severity = "error"
            "#,
        );
        assert!(matches!(result, Err(EngineError::MissingRule { .. })));
    }

    #[test]
    fn test_duplicate_and_reserved_ids_rejected() {
        let duplicate = RuleTable::from_toml_str(
            r#"
            version = "t4"
            [[rules]]
            id = "a"
            path = "title"
            severity = "error"
            [[rules]]
            id = "a"
            path = "entity_status"
            severity = "warning"
            "#,
        );
        assert!(matches!(duplicate, Err(EngineError::InvalidRule { .. })));

        let reserved = RuleTable::from_toml_str(
            r#"
            version = "t5"
            [[rules]]
            id = "SYSTEM"
            path = "title"
            severity = "error"
            "#,
        );
        assert!(matches!(reserved, Err(EngineError::InvalidRule { .. })));
    }

    #[test]
    fn test_invalid_path_rejected() {
        let result = RuleTable::from_toml_str(
            r#"
            version = "t6"
            [[rules]]
            id = "broken"
            path = "inventors[x].country"
            severity = "error"
            "#,
        );
        assert!(matches!(result, Err(EngineError::InvalidRule { .. })));
    }

    #[test]
    fn test_builtin_table_covers_identity_fields() {
        let table = RuleTable::builtin().unwrap();
        let rule = table.rule_for("inventors[1].family_name");
        assert_eq!(rule.severity, Severity::Error);
        assert_eq!(rule.cosmetic_severity, Severity::Info);

        let country = table.rule_for("inventors[0].country");
        assert_eq!(country.normalization, NormalizationFn::Country);
        assert_eq!(country.severity, Severity::Warning);
    }

    #[test]
    fn test_alias_tables_loaded_from_file() {
        let table = RuleTable::from_toml_str(
            r#"
            version = "t7"
            [country_aliases]
            "Bundesrepublik" = "DE"
            "#,
        )
        .unwrap();
        assert_eq!(table.tables().canonical_country("Bundesrepublik"), Some("DE"));
    }
}
