//! Configuration for consistency engine runs
//!
//! Thresholds, rule tables and watch patterns. Every table is data, loaded
//! from `concord.toml` and defaulted field by field.

use concord_domain::{AuthorityLayer, Severity};
use concord_store::{WatchPattern, DEFAULT_TRACKING_DIR};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EngineError, Result};

/// Configuration for the consistency engine
///
/// # Examples
///
/// ```
/// use concord_engine::EngineConfig;
///
/// // Default configuration (balanced)
/// let config = EngineConfig::default();
/// assert_eq!(config.thresholds.completeness_overlap, 0.7);
///
/// // Strict: fewer automated merges
/// let config = EngineConfig::strict();
/// assert!(config.thresholds.precision_containment > 0.6);
///
/// // Configuration round-trips through TOML
/// let text = EngineConfig::default().to_toml().unwrap();
/// let parsed = EngineConfig::from_toml(&text).unwrap();
/// assert_eq!(parsed.review_deadline_days, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tracking directory, relative to the repository root
    /// Default: `update-tracking`
    #[serde(default = "default_tracking_dir")]
    pub tracking_dir: String,

    /// Numeric thresholds
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Classification and merge rule tables
    #[serde(default)]
    pub rules: RuleTables,

    /// Source documents watched by the change detector
    #[serde(default = "default_source_patterns")]
    pub source_patterns: Vec<WatchPattern>,

    /// Entry files watched by the change detector and loaded by the store
    #[serde(default = "default_entry_patterns")]
    pub entry_patterns: Vec<WatchPattern>,

    /// Which entry directory each source feeds
    #[serde(default = "default_source_mappings")]
    pub source_mappings: Vec<SourceMapping>,

    /// Which authority layer a source tag extracts into (first match wins)
    #[serde(default = "default_source_layers")]
    pub source_layers: Vec<SourceLayerRule>,

    /// Days until an escalated conflict's review is due
    /// Default: 7
    #[serde(default = "default_review_deadline_days")]
    pub review_deadline_days: i64,

    /// Window around a batch start in which backups count as "before" state
    /// Default: 300 seconds
    #[serde(default = "default_batch_window_secs")]
    pub batch_window_secs: i64,

    /// Actor recorded in logs (falls back to `$USER`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Dry-run mode: report what would be written without writing
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

/// Numeric thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Share of the shorter value's words found in the longer value for a
    /// completeness gap
    /// Default: 0.70
    #[serde(default = "default_completeness_overlap")]
    pub completeness_overlap: f64,

    /// Share of the rejected value's tokens the chosen value must cover
    /// Default: 0.60
    #[serde(default = "default_precision_containment")]
    pub precision_containment: f64,

    /// Resolutions below this confidence are revisited by the regenerator
    /// Default: 0.70
    #[serde(default = "default_low_confidence")]
    pub low_confidence: f64,

    /// Upper bound of the completeness score
    /// Default: 8
    #[serde(default = "default_completeness_cap")]
    pub completeness_cap: u32,

    /// Lowest layer that may overwrite an existing non-technical field
    /// Default: verified
    #[serde(default = "default_overwrite_layer")]
    pub default_overwrite_layer: AuthorityLayer,
}

/// Positive and negative poles of one antonym group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntonymGroup {
    /// Terms of the positive pole
    pub positive: Vec<String>,

    /// Terms of the negative pole
    pub negative: Vec<String>,
}

/// Field names per severity; unlisted fields are low
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityTable {
    /// Critical fields
    pub critical: Vec<String>,

    /// High severity fields
    pub high: Vec<String>,

    /// Medium severity fields
    pub medium: Vec<String>,
}

impl SeverityTable {
    /// Severity of a field
    pub fn severity_of(&self, field: &str) -> Severity {
        let has = |list: &[String]| list.iter().any(|f| f == field);
        if has(&self.critical) {
            Severity::Critical
        } else if has(&self.high) {
            Severity::High
        } else if has(&self.medium) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// A relation field and how its references map to entry ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationField {
    /// Field name
    pub field: String,

    /// Id template, `{}` replaced by the lower-cased reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_template: Option<String>,
}

impl RelationField {
    /// Entry id a reference points at
    pub fn target_id(&self, reference: &str) -> String {
        let reference = reference.trim().to_lowercase();
        match &self.id_template {
            Some(template) => template.replace("{}", &reference),
            None => reference,
        }
    }
}

/// Classification and merge rule tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTables {
    /// Whole words that read as boolean true
    #[serde(default = "default_true_keywords")]
    pub true_keywords: Vec<String>,

    /// Whole words that read as boolean false
    #[serde(default = "default_false_keywords")]
    pub false_keywords: Vec<String>,

    /// Contradicting term groups
    #[serde(default = "default_antonym_groups")]
    pub antonym_groups: Vec<AntonymGroup>,

    /// Terms that raise a value's precision score
    #[serde(default = "default_technical_terms")]
    pub technical_terms: Vec<String>,

    /// Field severities
    #[serde(default = "default_severity")]
    pub severity: SeverityTable,

    /// Fields never changed automatically
    #[serde(default = "default_identity_fields")]
    pub identity_fields: Vec<String>,

    /// List fields merged by union
    #[serde(default = "default_list_fields")]
    pub list_fields: Vec<String>,

    /// Scalar technical fields, overwritten only by equal or higher layers
    #[serde(default = "default_technical_fields")]
    pub technical_fields: Vec<String>,

    /// Fields holding references to other entries
    #[serde(default = "default_relation_fields")]
    pub relation_fields: Vec<RelationField>,

    /// Sections that count toward the completeness score
    #[serde(default = "default_completeness_sections")]
    pub completeness_sections: Vec<String>,

    /// Layer block keys that are bookkeeping, not fields
    #[serde(default = "default_ignored_layer_keys")]
    pub ignored_layer_keys: Vec<String>,
}

/// Source document → entry directory mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapping {
    /// Case-insensitive substring of the source path
    pub source: String,

    /// Entry directory fed by the source
    pub entry_dir: String,
}

/// Source tag → authority layer rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLayerRule {
    /// Case-insensitive substring of the source tag
    pub pattern: String,

    /// Layer the source extracts into
    pub layer: AuthorityLayer,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_tracking_dir() -> String {
    DEFAULT_TRACKING_DIR.to_string()
}

fn default_review_deadline_days() -> i64 {
    7
}

fn default_batch_window_secs() -> i64 {
    300
}

fn default_completeness_overlap() -> f64 {
    0.7
}

fn default_precision_containment() -> f64 {
    0.6
}

fn default_low_confidence() -> f64 {
    0.7
}

fn default_completeness_cap() -> u32 {
    8
}

fn default_overwrite_layer() -> AuthorityLayer {
    AuthorityLayer::Verified
}

fn default_true_keywords() -> Vec<String> {
    strings(&["true", "yes", "enabled", "set"])
}

fn default_false_keywords() -> Vec<String> {
    strings(&["false", "no", "disabled", "clear", "unset"])
}

fn default_antonym_groups() -> Vec<AntonymGroup> {
    let group = |p: &[&str], n: &[&str]| AntonymGroup {
        positive: strings(p),
        negative: strings(n),
    };
    vec![
        group(&["enable", "set", "turn on"], &["disable", "clear", "turn off"]),
        group(&["increase", "increment", "raise"], &["decrease", "decrement", "lower"]),
        group(&["fast", "quick", "rapid"], &["slow", "delayed"]),
        group(&["required", "mandatory", "must"], &["optional", "may", "can"]),
    ]
}

fn default_technical_terms() -> Vec<String> {
    strings(&["sync", "dependent", "window", "alignment", "cycles", "clocks"])
}

fn default_severity() -> SeverityTable {
    SeverityTable {
        critical: strings(&["id", "mnemonic", "encoding", "operation", "basic_operation"]),
        high: strings(&["timing", "flags", "flags_affected", "description", "syntax"]),
        medium: strings(&["notes", "usage_notes", "examples", "related_instructions", "see_also"]),
    }
}

fn default_identity_fields() -> Vec<String> {
    strings(&["id", "mnemonic", "category"])
}

fn default_list_fields() -> Vec<String> {
    strings(&["examples", "related_instructions", "see_also"])
}

fn default_technical_fields() -> Vec<String> {
    strings(&["timing", "encoding"])
}

fn default_relation_fields() -> Vec<RelationField> {
    vec![
        RelationField {
            field: "related_instructions".to_string(),
            id_template: Some("{}-instruction".to_string()),
        },
        RelationField {
            field: "see_also".to_string(),
            id_template: None,
        },
    ]
}

fn default_completeness_sections() -> Vec<String> {
    strings(&[
        "examples",
        "related_instructions",
        "usage_notes",
        "special_cases",
        "optimization_tips",
    ])
}

fn default_ignored_layer_keys() -> Vec<String> {
    strings(&["parts_used", "source_posts", "authority_level"])
}

fn default_source_patterns() -> Vec<WatchPattern> {
    vec![
        WatchPattern::recursive("sources", &["csv", "md"]),
        WatchPattern::recursive("external-inputs", &["docx", "xlsx"]),
    ]
}

fn default_entry_patterns() -> Vec<WatchPattern> {
    vec![
        WatchPattern::recursive("instructions", &["yaml", "yml"]),
        WatchPattern::recursive("components", &["yaml", "yml"]),
        WatchPattern::flat("architecture", &["yaml", "yml"]),
        WatchPattern::flat("hardware", &["yaml", "yml"]),
    ]
}

fn default_source_mappings() -> Vec<SourceMapping> {
    let map = |source: &str, entry_dir: &str| SourceMapping {
        source: source.to_string(),
        entry_dir: entry_dir.to_string(),
    };
    vec![
        map("P2-Instruction-Set.csv", "instructions/pasm2"),
        map("P2-Datasheet", "instructions"),
        map("Silicon-Doc", "instructions"),
        map("Spin2", "instructions/spin2"),
        map("Smart-Pins", "components/smart-pins"),
        map("P2-EVAL", "hardware"),
    ]
}

fn default_source_layers() -> Vec<SourceLayerRule> {
    let rule = |pattern: &str, layer| SourceLayerRule {
        pattern: pattern.to_string(),
        layer,
    };
    vec![
        rule("clarification", AuthorityLayer::Absolute),
        rule("silicon", AuthorityLayer::Verified),
        rule("datasheet", AuthorityLayer::Confirmed),
        rule(".csv", AuthorityLayer::Baseline),
    ]
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            completeness_overlap: default_completeness_overlap(),
            precision_containment: default_precision_containment(),
            low_confidence: default_low_confidence(),
            completeness_cap: default_completeness_cap(),
            default_overwrite_layer: default_overwrite_layer(),
        }
    }
}

impl Default for RuleTables {
    fn default() -> Self {
        Self {
            true_keywords: default_true_keywords(),
            false_keywords: default_false_keywords(),
            antonym_groups: default_antonym_groups(),
            technical_terms: default_technical_terms(),
            severity: default_severity(),
            identity_fields: default_identity_fields(),
            list_fields: default_list_fields(),
            technical_fields: default_technical_fields(),
            relation_fields: default_relation_fields(),
            completeness_sections: default_completeness_sections(),
            ignored_layer_keys: default_ignored_layer_keys(),
        }
    }
}

impl RuleTables {
    /// Whether a field is an identity field
    pub fn is_identity(&self, field: &str) -> bool {
        self.identity_fields.iter().any(|f| f == field)
    }

    /// Whether a field is a list field
    pub fn is_list(&self, field: &str) -> bool {
        self.list_fields.iter().any(|f| f == field)
            || self.relation_fields.iter().any(|r| r.field == field)
    }

    /// Whether a field is a scalar technical field
    pub fn is_technical(&self, field: &str) -> bool {
        self.technical_fields.iter().any(|f| f == field)
    }

    /// Whether a layer block key is bookkeeping
    pub fn is_ignored_layer_key(&self, key: &str) -> bool {
        self.ignored_layer_keys.iter().any(|k| k == key)
    }
}

impl Default for EngineConfig {
    /// Create default configuration
    ///
    /// - Completeness overlap: 0.70
    /// - Precision containment: 0.60
    /// - Review deadline: 7 days
    /// - Batch window: 300 seconds
    fn default() -> Self {
        Self {
            tracking_dir: default_tracking_dir(),
            thresholds: Thresholds::default(),
            rules: RuleTables::default(),
            source_patterns: default_source_patterns(),
            entry_patterns: default_entry_patterns(),
            source_mappings: default_source_mappings(),
            source_layers: default_source_layers(),
            review_deadline_days: default_review_deadline_days(),
            batch_window_secs: default_batch_window_secs(),
            actor: None,
            dry_run: false,
        }
    }
}

impl EngineConfig {
    /// Strict configuration: fewer automated merges, faster review
    ///
    /// - Completeness overlap: 0.85
    /// - Precision containment: 0.80
    /// - Low confidence: 0.80
    /// - Review deadline: 3 days
    pub fn strict() -> Self {
        Self {
            thresholds: Thresholds {
                completeness_overlap: 0.85,
                precision_containment: 0.8,
                low_confidence: 0.8,
                ..Thresholds::default()
            },
            review_deadline_days: 3,
            ..Self::default()
        }
    }

    /// Lenient configuration: more automated merges, relaxed review
    ///
    /// - Completeness overlap: 0.60
    /// - Precision containment: 0.50
    /// - Low confidence: 0.60
    /// - Review deadline: 14 days
    pub fn lenient() -> Self {
        Self {
            thresholds: Thresholds {
                completeness_overlap: 0.6,
                precision_containment: 0.5,
                low_confidence: 0.6,
                default_overwrite_layer: AuthorityLayer::Confirmed,
                ..Thresholds::default()
            },
            review_deadline_days: 14,
            ..Self::default()
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate().map_err(EngineError::Config)?;
        Ok(config)
    }

    /// Serialize configuration to TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load `<root>/concord.toml` if present, defaults otherwise
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let path = root.join("concord.toml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate thresholds
    pub fn validate(&self) -> std::result::Result<(), String> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(format!("{} must be within [0, 1], got {}", name, v))
            }
        };
        unit("completeness_overlap", self.thresholds.completeness_overlap)?;
        unit("precision_containment", self.thresholds.precision_containment)?;
        unit("low_confidence", self.thresholds.low_confidence)?;
        if self.thresholds.completeness_cap == 0 {
            return Err("completeness_cap must be positive".to_string());
        }
        if self.review_deadline_days <= 0 {
            return Err("review_deadline_days must be positive".to_string());
        }
        if self.batch_window_secs < 0 {
            return Err("batch_window_secs must not be negative".to_string());
        }
        if self.tracking_dir.trim().is_empty() {
            return Err("tracking_dir must not be empty".to_string());
        }
        Ok(())
    }

    /// Layer a source tag extracts into, per the source layer rules
    pub fn layer_for_source(&self, source: &str) -> Option<AuthorityLayer> {
        let source = source.to_lowercase();
        self.source_layers
            .iter()
            .find(|rule| source.contains(&rule.pattern.to_lowercase()))
            .map(|rule| rule.layer)
    }
}
