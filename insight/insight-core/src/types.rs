//! Core data model for index insights.

use crate::error::{InsightError, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A stored document: a flat JSON object as returned by the artifact store.
pub type Document = serde_json::Map<String, Value>;

/// Persisted field names, stable across versions.
pub mod fields {
    pub const INDEX_NAME: &str = "index_name";
    pub const LAST_UPDATED_TIME: &str = "last_updated_time";
    pub const CONTENT: &str = "content";
    pub const STATUS: &str = "status";
    pub const TASK_TYPE: &str = "task_type";
    pub const TENANT_ID: &str = "tenant_id";
}

// ============================================================================
// Task type
// ============================================================================

/// Kind of insight a task produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    StatisticalData,
    FieldDescription,
    LogRelatedIndexCheck,
    IndexCorrelation,
    /// Request-only meta value; never the type of a persisted record.
    All,
}

impl TaskType {
    /// Every concrete (persistable) task type.
    pub const CONCRETE: [TaskType; 4] = [
        TaskType::StatisticalData,
        TaskType::FieldDescription,
        TaskType::LogRelatedIndexCheck,
        TaskType::IndexCorrelation,
    ];

    /// Wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::StatisticalData => "STATISTICAL_DATA",
            TaskType::FieldDescription => "FIELD_DESCRIPTION",
            TaskType::LogRelatedIndexCheck => "LOG_RELATED_INDEX_CHECK",
            TaskType::IndexCorrelation => "INDEX_CORRELATION",
            TaskType::All => "ALL",
        }
    }

    /// Whether a record of this type can be persisted
    pub fn is_concrete(&self) -> bool {
        !matches!(self, TaskType::All)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STATISTICAL_DATA" => Ok(TaskType::StatisticalData),
            "FIELD_DESCRIPTION" => Ok(TaskType::FieldDescription),
            "LOG_RELATED_INDEX_CHECK" => Ok(TaskType::LogRelatedIndexCheck),
            "INDEX_CORRELATION" => Ok(TaskType::IndexCorrelation),
            "ALL" => Ok(TaskType::All),
            other => Err(InsightError::invalid_input(format!("Unknown task type: {}", other))),
        }
    }
}

// ============================================================================
// Task status
// ============================================================================

/// Position of a record in the generation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Generating,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Generating => "GENERATING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GENERATING" => Ok(TaskStatus::Generating),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            other => Err(InsightError::invalid_input(format!("Unknown task status: {}", other))),
        }
    }
}

// Parsing is case-insensitive, output is always canonical uppercase.
impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Insight record
// ============================================================================

/// One computed insight for one (index, task type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    #[serde(rename = "index_name")]
    pub index: String,
    pub task_type: TaskType,
    /// Empty string is a valid computed result.
    #[serde(default)]
    pub content: String,
    pub status: TaskStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl InsightRecord {
    /// Record claiming the generation slot
    pub fn generating(
        index: impl Into<String>,
        task_type: TaskType,
        tenant_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            index: index.into(),
            task_type,
            content: String::new(),
            status: TaskStatus::Generating,
            last_updated_time: now,
            tenant_id,
        }
    }

    /// Successfully computed record
    pub fn completed(
        index: impl Into<String>,
        task_type: TaskType,
        content: impl Into<String>,
        tenant_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            index: index.into(),
            task_type,
            content: content.into(),
            status: TaskStatus::Completed,
            last_updated_time: now,
            tenant_id,
        }
    }

    /// Failed record; content holds the error context
    pub fn failed(
        index: impl Into<String>,
        task_type: TaskType,
        error_context: impl Into<String>,
        tenant_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            index: index.into(),
            task_type,
            content: error_context.into(),
            status: TaskStatus::Failed,
            last_updated_time: now,
            tenant_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Milliseconds elapsed between the last transition and `now`
    pub fn age_millis(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_updated_time).num_milliseconds()
    }

    /// Serialize into the stored document shape
    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(InsightError::parse(format!(
                "insight record serialized to non-object: {}",
                other
            ))),
        }
    }

    /// Parse a stored document
    pub fn from_document(doc: &Document) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(doc.clone()))?)
    }

    /// Parse `content` as JSON
    pub fn content_json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.content)?)
    }
}

/// Convert epoch millis into a UTC timestamp
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

// ============================================================================
// Semantic type
// ============================================================================

/// Observability role of an index pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SemanticType {
    Log,
    Trace,
    Metric,
    #[default]
    Unknown,
}

impl SemanticType {
    /// The three types that form a correlation triad
    pub const TRIAD: [SemanticType; 3] = [SemanticType::Log, SemanticType::Trace, SemanticType::Metric];

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Log => "LOG",
            SemanticType::Trace => "TRACE",
            SemanticType::Metric => "METRIC",
            SemanticType::Unknown => "UNKNOWN",
        }
    }

    /// Key of the correlation tuple slot for this type
    pub fn slot_name(&self) -> Option<&'static str> {
        match self {
            SemanticType::Log => Some("logs"),
            SemanticType::Trace => Some("trace"),
            SemanticType::Metric => Some("metrics"),
            SemanticType::Unknown => None,
        }
    }

    /// Lenient parse of a model-supplied label; anything unrecognised is UNKNOWN
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "LOG" | "LOGS" => SemanticType::Log,
            "TRACE" | "TRACES" => SemanticType::Trace,
            "METRIC" | "METRICS" => SemanticType::Metric,
            _ => SemanticType::Unknown,
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Pattern classification
// ============================================================================

/// Task type string under which pattern cache entries are stored.
pub const PATTERN_TYPE_CACHE: &str = "PATTERN_TYPE_CACHE";

/// Classification of one index pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternInfo {
    pub pattern: String,
    #[serde(default)]
    pub sample_indices: Vec<String>,
    #[serde(rename = "type", default)]
    pub semantic_type: SemanticType,
    #[serde(default)]
    pub time_field: Option<String>,
    #[serde(default)]
    pub trace_id_field: Option<String>,
    #[serde(default)]
    pub span_id_field: Option<String>,
}

impl PatternInfo {
    /// Fallback classification when the model cannot help
    pub fn unknown(pattern: impl Into<String>, sample_indices: Vec<String>) -> Self {
        Self {
            pattern: pattern.into(),
            sample_indices,
            semantic_type: SemanticType::Unknown,
            time_field: None,
            trace_id_field: None,
            span_id_field: None,
        }
    }

    /// First member index of the pattern
    pub fn sample_index(&self) -> Option<&str> {
        self.sample_indices.first().map(String::as_str)
    }
}

/// Persisted classification of a pattern with its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternCacheEntry {
    pub info: PatternInfo,
    pub status: TaskStatus,
    pub cached_at: DateTime<Utc>,
}

impl PatternCacheEntry {
    pub fn new(info: PatternInfo, cached_at: DateTime<Utc>) -> Self {
        Self {
            info,
            status: TaskStatus::Completed,
            cached_at,
        }
    }

    /// Served only when completed and younger than `ttl_millis`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl_millis: i64) -> bool {
        self.status == TaskStatus::Completed && (now - self.cached_at).num_milliseconds() < ttl_millis
    }

    /// Stored document shape: an insight-like record whose content is the classification
    pub fn to_document(&self, tenant_id: Option<&str>) -> Result<Document> {
        let mut doc = Document::new();
        doc.insert(fields::INDEX_NAME.into(), Value::String(self.info.pattern.clone()));
        doc.insert(fields::TASK_TYPE.into(), Value::String(PATTERN_TYPE_CACHE.into()));
        doc.insert(
            fields::CONTENT.into(),
            Value::String(serde_json::to_string(&self.info)?),
        );
        doc.insert(fields::STATUS.into(), Value::String(self.status.as_str().into()));
        doc.insert(
            fields::LAST_UPDATED_TIME.into(),
            Value::from(self.cached_at.timestamp_millis()),
        );
        if let Some(tenant) = tenant_id {
            doc.insert(fields::TENANT_ID.into(), Value::String(tenant.into()));
        }
        Ok(doc)
    }

    /// Parse a stored cache document. The pattern argument fills in a missing pattern.
    pub fn from_document(doc: &Document, pattern: &str) -> Result<Self> {
        let status: TaskStatus = doc
            .get(fields::STATUS)
            .and_then(Value::as_str)
            .ok_or_else(|| InsightError::parse("pattern cache entry has no status"))?
            .parse()?;
        let cached_at = doc
            .get(fields::LAST_UPDATED_TIME)
            .and_then(Value::as_i64)
            .and_then(from_epoch_millis)
            .ok_or_else(|| InsightError::parse("pattern cache entry has no timestamp"))?;
        let content = doc
            .get(fields::CONTENT)
            .and_then(Value::as_str)
            .ok_or_else(|| InsightError::parse("pattern cache entry has no content"))?;

        let mut info: PatternInfo = serde_json::from_str(content)?;
        if info.pattern.is_empty() {
            info.pattern = pattern.to_string();
        }

        Ok(Self {
            info,
            status,
            cached_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_type_wire_strings() {
        assert_eq!(TaskType::LogRelatedIndexCheck.to_string(), "LOG_RELATED_INDEX_CHECK");
        assert_eq!(
            serde_json::to_value(TaskType::IndexCorrelation).unwrap(),
            json!("INDEX_CORRELATION")
        );
        assert_eq!("field_description".parse::<TaskType>().unwrap(), TaskType::FieldDescription);
        assert!("NOPE".parse::<TaskType>().is_err());
        assert!(!TaskType::All.is_concrete());
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        let status: TaskStatus = serde_json::from_value(json!("completed")).unwrap();
        assert_eq!(status, TaskStatus::Completed);
        assert_eq!(serde_json::to_value(status).unwrap(), json!("COMPLETED"));
        assert_eq!("Generating".parse::<TaskStatus>().unwrap(), TaskStatus::Generating);
    }

    #[test]
    fn test_record_document_shape() {
        let now = from_epoch_millis(1_700_000_000_123).unwrap();
        let record = InsightRecord::completed("logs", TaskType::StatisticalData, "{}", None, now);
        let doc = record.to_document().unwrap();

        assert_eq!(doc.get("index_name"), Some(&json!("logs")));
        assert_eq!(doc.get("task_type"), Some(&json!("STATISTICAL_DATA")));
        assert_eq!(doc.get("status"), Some(&json!("COMPLETED")));
        assert_eq!(doc.get("last_updated_time"), Some(&json!(1_700_000_000_123i64)));
        assert!(!doc.contains_key("tenant_id"));

        let parsed = InsightRecord::from_document(&doc).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_semantic_type_labels() {
        assert_eq!(SemanticType::from_label("trace"), SemanticType::Trace);
        assert_eq!(SemanticType::from_label("Metrics"), SemanticType::Metric);
        assert_eq!(SemanticType::from_label("banana"), SemanticType::Unknown);
        assert_eq!(SemanticType::Metric.slot_name(), Some("metrics"));
        assert_eq!(SemanticType::Unknown.slot_name(), None);
    }

    #[test]
    fn test_pattern_cache_entry_freshness() {
        let cached_at = from_epoch_millis(1_000_000).unwrap();
        let entry = PatternCacheEntry::new(PatternInfo::unknown("logs-*", vec![]), cached_at);

        assert!(entry.is_fresh(from_epoch_millis(1_000_999).unwrap(), 1000));
        assert!(!entry.is_fresh(from_epoch_millis(1_001_000).unwrap(), 1000));

        let doc = entry.to_document(Some("tenant-a")).unwrap();
        assert_eq!(doc.get("task_type"), Some(&json!("PATTERN_TYPE_CACHE")));
        let parsed = PatternCacheEntry::from_document(&doc, "logs-*").unwrap();
        assert_eq!(parsed, entry);
    }
}
