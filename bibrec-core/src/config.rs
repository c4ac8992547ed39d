//! Engine configuration
//!
//! One TOML document configures every stage. All sections are optional; missing values use
//! the built-in defaults below. `BibrecConfig::load` resolves the file via
//! `bibrec_common::config` (CLI → `BIBREC_CONFIG` → platform config dir → defaults) and
//! validates it before anything runs.
//!
//! ```toml
//! rules_path = "/etc/bibrec/rules.toml"
//!
//! [logging]
//! level = "info"
//!
//! [similarity]
//! name = 0.5
//! address = 0.3
//! sequence = 0.2
//!
//! [aggregation]
//! join_threshold = 0.75
//! chunk_window = 1
//!
//! [deduplication]
//! cluster_threshold = 0.85
//!
//! [validator]
//! max_fields = 10000
//! time_budget_ms = 2000
//!
//! [pipeline]
//! max_concurrency = 4
//! call_timeout_ms = 30000
//! ```

use crate::error::{EngineError, EngineResult};
use crate::rules::RuleTable;
use crate::similarity::SignalWeights;
use bibrec_common::config::{load_toml_config, resolve_config_path, LoggingConfig, CONFIG_ENV_VAR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Candidate aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Minimum combined score for a candidate to join an existing group
    pub join_threshold: f64,
    /// How many chunks apart a candidate may be from a group's latest member
    pub chunk_window: usize,
    /// Confidence added per corroborating member
    pub corroboration_boost: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            join_threshold: 0.75,
            chunk_window: 1,
            corroboration_boost: 0.05,
        }
    }
}

/// Global deduplication settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// Minimum pairwise score for two aggregated entities to be clustered
    pub cluster_threshold: f64,
    /// Quality penalty per unresolved conflict field
    pub conflict_penalty: f64,
    /// Keep resolution notes in emitted records (audit retention)
    pub retain_resolution_notes: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            cluster_threshold: 0.85,
            conflict_penalty: 0.1,
            retain_resolution_notes: false,
        }
    }
}

/// Completeness check settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletenessConfig {
    /// Required fields per entity beyond the always-required name
    pub required_fields: Vec<String>,
    /// Position the printed sequence starts at
    pub first_sequence: u32,
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            required_fields: Vec::new(),
            first_sequence: 1,
        }
    }
}

/// Output validation guards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Maximum number of source fields compared per report
    pub max_fields: usize,
    /// Wall-clock budget per report
    pub time_budget_ms: u64,
    /// Collection name canonical entities are validated under
    pub entity_collection: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_fields: 10_000,
            time_budget_ms: 2_000,
            entity_collection: "inventors".to_string(),
        }
    }
}

/// External call settings for the extraction pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent chunk extraction calls
    pub max_concurrency: usize,
    /// Timeout per external call
    pub call_timeout_ms: u64,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            call_timeout_ms: 30_000,
            max_retries: 2,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BibrecConfig {
    pub logging: LoggingConfig,
    /// Rule table file; the built-in table is used when absent
    pub rules_path: Option<PathBuf>,
    pub similarity: SignalWeights,
    pub aggregation: AggregationConfig,
    pub deduplication: DeduplicationConfig,
    pub completeness: CompletenessConfig,
    pub validator: ValidatorConfig,
    pub pipeline: PipelineConfig,
    /// File this configuration was read from; `None` for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl BibrecConfig {
    /// Resolve, load and validate configuration
    pub fn load(cli_path: Option<&Path>) -> EngineResult<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR)?;
        let mut config: BibrecConfig = load_toml_config(path.as_deref())?;
        config.validate()?;
        config.source = path;
        Ok(config)
    }

    /// Report where configuration came from; call once tracing is initialized
    pub fn log_source(&self) {
        match &self.source {
            Some(path) => info!(path = %path.display(), "Configuration loaded"),
            None => info!("No configuration file found, using built-in defaults"),
        }
    }

    /// Reject values the algorithms cannot work with
    pub fn validate(&self) -> EngineResult<()> {
        check_unit("aggregation.join_threshold", self.aggregation.join_threshold)?;
        check_unit("aggregation.corroboration_boost", self.aggregation.corroboration_boost)?;
        check_unit("deduplication.cluster_threshold", self.deduplication.cluster_threshold)?;
        check_unit("deduplication.conflict_penalty", self.deduplication.conflict_penalty)?;

        let weights = self.similarity;
        for (name, value) in [
            ("similarity.name", weights.name),
            ("similarity.address", weights.address),
            ("similarity.sequence", weights.sequence),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::Config(format!("{} must be a non-negative number, got {}", name, value)));
            }
        }
        if weights.name + weights.address + weights.sequence <= 0.0 {
            return Err(EngineError::Config("similarity weights must not all be zero".to_string()));
        }

        if self.validator.max_fields == 0 {
            return Err(EngineError::Config("validator.max_fields must be at least 1".to_string()));
        }
        if self.validator.time_budget_ms == 0 {
            return Err(EngineError::Config("validator.time_budget_ms must be at least 1".to_string()));
        }
        if self.pipeline.max_concurrency == 0 {
            return Err(EngineError::Config("pipeline.max_concurrency must be at least 1".to_string()));
        }
        if self.pipeline.call_timeout_ms == 0 {
            return Err(EngineError::Config("pipeline.call_timeout_ms must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Rule table from `rules_path`, or the built-in table
    pub fn rule_table(&self) -> EngineResult<RuleTable> {
        match &self.rules_path {
            Some(path) => RuleTable::load(path),
            None => RuleTable::builtin(),
        }
    }
}

fn check_unit(name: &str, value: f64) -> EngineResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::Config(format!("{} must be within 0.0-1.0, got {}", name, value)))
    }
}
