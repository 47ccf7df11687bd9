//! Semantic classification of index patterns.
//!
//! Classifications are cached per pattern in the artifact store. A pattern
//! that cannot be classified (model failure, unreadable answer) is UNKNOWN for
//! this run and is not cached.

use futures::future::join_all;
use insight_core::prelude::*;
use insight_core::response::{extract_model_response, optional_string, parse_tagged_json};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::pattern::IndexPattern;
use crate::task::TaskContext;

const ANALYSIS_TAG: &str = "index_type_analysis";

/// Sample indices listed in a classification prompt
const PROMPT_SAMPLE_INDICES: usize = 5;

const TYPE_DETECTION_TEMPLATE: &str = r#"I will provide you with an index pattern, sample index names, mapping fields, and actual sample documents.

Index Pattern: {pattern}
Sample Indices: {sample_indices}
Sample Mapping Fields: {sample_fields}

Sample Documents (up to 5):
{sample_documents}

Please determine if this index pattern represents LOG, TRACE, or METRIC data based on:
1. Index naming conventions (e.g., "logs-", "jaeger-span-", "metrics-")
2. Field names in the mapping (e.g., "spanId", "traceId", "severity", "message")
3. Actual document content and structure from the sample documents
4. Common observability patterns (OpenTelemetry, Jaeger, Prometheus, etc.)

Return your analysis in the following JSON format inside tags:

<index_type_analysis>
{
  "type": "LOG" | "TRACE" | "METRIC" | "UNKNOWN",
  "confidence": "high" | "medium" | "low",
  "reasoning": "brief explanation",
  "time_field": "name of the time field or null",
  "trace_id_field": "name of trace ID field or null (for TRACE/LOG)",
  "span_id_field": "name of span ID field or null (for TRACE/LOG)"
}
</index_type_analysis>

Rules:
- If you cannot confidently determine the type, use "UNKNOWN"
- time_field should be the primary timestamp field
- trace_id_field and span_id_field are only relevant for TRACE and LOG types"#;

/// Classifies patterns for one tenant.
pub struct PatternDetector<'a> {
    ctx: &'a TaskContext,
    tenant_id: Option<&'a str>,
    context_index: &'a str,
}

impl<'a> PatternDetector<'a> {
    /// `context_index` is the index on whose behalf the model is called
    pub fn new(ctx: &'a TaskContext, tenant_id: Option<&'a str>, context_index: &'a str) -> Self {
        Self {
            ctx,
            tenant_id,
            context_index,
        }
    }

    /// Classify every pattern, at most `max_concurrent_classifications` at a
    /// time. Output order follows input order.
    pub async fn classify_all(&self, patterns: &[IndexPattern]) -> Vec<PatternInfo> {
        let permits = self.ctx.config.correlation.max_concurrent_classifications.max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        debug!(
            "Classifying {} patterns with {} concurrent slots",
            patterns.len(),
            permits
        );

        let classifications = patterns.iter().map(|pattern| {
            let semaphore = semaphore.clone();
            async move {
                match semaphore.acquire().await {
                    Ok(_permit) => self.classify(pattern).await,
                    Err(e) => {
                        warn!("Classification slot unavailable for {}: {}", pattern.pattern, e);
                        PatternInfo::unknown(pattern.pattern.clone(), pattern.indices.clone())
                    }
                }
            }
        });
        join_all(classifications).await
    }

    /// Classify one pattern. Never fails: anything that goes wrong yields UNKNOWN.
    pub async fn classify(&self, pattern: &IndexPattern) -> PatternInfo {
        if let Some(mut cached) = self.cached(&pattern.pattern).await {
            info!("Cache hit for pattern {}", pattern.pattern);
            cached.sample_indices = pattern.indices.clone();
            return cached;
        }

        let Some(sample_index) = pattern.indices.first() else {
            return PatternInfo::unknown(pattern.pattern.clone(), Vec::new());
        };

        let fields = match self.ctx.cluster.get_mapping(sample_index).await {
            Ok(mappings) => mapping_field_names(mappings.values()),
            Err(e) => {
                error!("Failed to get mapping for index {}: {}", sample_index, e);
                return PatternInfo::unknown(pattern.pattern.clone(), pattern.indices.clone());
            }
        };

        let sample_size = self.ctx.config.correlation.sample_documents;
        let documents = self
            .ctx
            .cluster
            .search_sample(sample_index, sample_size)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to sample documents of index {}: {}", sample_index, e);
                Vec::new()
            });

        let prompt = self.prompt(pattern, &fields, &documents);
        let response = match self
            .ctx
            .model
            .call_model(self.ctx.agent_id(), &prompt, self.context_index)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to call model for type detection of {}: {}", pattern.pattern, e);
                return PatternInfo::unknown(pattern.pattern.clone(), pattern.indices.clone());
            }
        };

        let Some(info) = parse_type_analysis(&extract_model_response(&response), pattern) else {
            warn!("Failed to parse type detection response for pattern {}", pattern.pattern);
            return PatternInfo::unknown(pattern.pattern.clone(), pattern.indices.clone());
        };

        debug!("Pattern {} classified as {}", info.pattern, info.semantic_type);
        self.save(&info).await;
        info
    }

    /// Fresh cached classification, or `None` on miss, expiry or read failure
    async fn cached(&self, pattern: &str) -> Option<PatternInfo> {
        let request = GetRequest::new(self.ctx.storage_index(), pattern_cache_doc_id(pattern), self.tenant_id);
        let document = match self.ctx.store.get(&request).await {
            Ok(document) => document?,
            Err(e) => {
                warn!("Failed to query cache for pattern {}: {}", pattern, e);
                return None;
            }
        };

        let entry = match PatternCacheEntry::from_document(&document, pattern) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to parse cached pattern info for {}: {}", pattern, e);
                return None;
            }
        };

        let ttl = self.ctx.config.pattern_cache_ttl().num_milliseconds();
        entry.is_fresh(self.ctx.now(), ttl).then_some(entry.info)
    }

    async fn save(&self, info: &PatternInfo) {
        let entry = PatternCacheEntry::new(info.clone(), self.ctx.now());
        let document = match entry.to_document(self.tenant_id) {
            Ok(document) => document,
            Err(e) => {
                warn!("Failed to serialize pattern {} for cache: {}", info.pattern, e);
                return;
            }
        };

        let request = PutRequest::new(
            self.ctx.storage_index(),
            pattern_cache_doc_id(&info.pattern),
            self.tenant_id,
            document,
        );
        match self.ctx.store.put(&request).await {
            Ok(()) => debug!("Saved pattern {} to cache", info.pattern),
            Err(e) => warn!("Failed to save pattern {} to cache: {}", info.pattern, e),
        }
    }

    fn prompt(&self, pattern: &IndexPattern, fields: &BTreeSet<String>, documents: &[Document]) -> String {
        let sample_indices = pattern
            .indices
            .iter()
            .take(PROMPT_SAMPLE_INDICES)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let sample_fields = fields
            .iter()
            .take(self.ctx.config.correlation.max_prompt_fields)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let sample_documents = serde_json::to_string_pretty(documents).unwrap_or_else(|_| "[]".to_string());

        TYPE_DETECTION_TEMPLATE
            .replace("{pattern}", &pattern.pattern)
            .replace("{sample_indices}", &sample_indices)
            .replace("{sample_fields}", &sample_fields)
            .replace("{sample_documents}", &sample_documents)
    }
}

/// Every field path in the mappings, including object parents
fn mapping_field_names<'a, I>(mappings: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut names = BTreeSet::new();
    for mapping in mappings {
        if let Some(properties) = mapping.get("properties").and_then(Value::as_object) {
            collect_names(properties, "", &mut names);
        }
    }
    names
}

fn collect_names(properties: &Map<String, Value>, prefix: &str, names: &mut BTreeSet<String>) {
    for (name, definition) in properties {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        if let Some(nested) = definition.get("properties").and_then(Value::as_object) {
            collect_names(nested, &path, names);
        }
        names.insert(path);
    }
}

/// Classification from the tagged model answer
pub fn parse_type_analysis(text: &str, pattern: &IndexPattern) -> Option<PatternInfo> {
    let analysis = parse_tagged_json(text, ANALYSIS_TAG)?;
    let semantic_type = analysis
        .get("type")
        .and_then(Value::as_str)
        .map(SemanticType::from_label)
        .unwrap_or_default();

    Some(PatternInfo {
        pattern: pattern.pattern.clone(),
        sample_indices: pattern.indices.clone(),
        semantic_type,
        time_field: optional_string(&analysis, "time_field"),
        trace_id_field: optional_string(&analysis, "trace_id_field"),
        span_id_field: optional_string(&analysis, "span_id_field"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pattern() -> IndexPattern {
        IndexPattern {
            pattern: "jaeger-span-*".to_string(),
            indices: vec!["jaeger-span-2025-12-19".to_string()],
        }
    }

    #[test]
    fn test_parse_type_analysis() {
        let text = r#"<index_type_analysis>
{"type": "trace", "confidence": "high", "reasoning": "jaeger", "time_field": "startTime",
 "trace_id_field": "traceID", "span_id_field": "spanID"}
</index_type_analysis>"#;
        let info = parse_type_analysis(text, &pattern()).unwrap();
        assert_eq!(info.semantic_type, SemanticType::Trace);
        assert_eq!(info.time_field.as_deref(), Some("startTime"));
        assert_eq!(info.span_id_field.as_deref(), Some("spanID"));
        assert_eq!(info.sample_index(), Some("jaeger-span-2025-12-19"));
    }

    #[test]
    fn test_unrecognised_type_label_is_unknown() {
        let text = r#"<index_type_analysis>{"type": "EVENTS"}</index_type_analysis>"#;
        let info = parse_type_analysis(text, &pattern()).unwrap();
        assert_eq!(info.semantic_type, SemanticType::Unknown);
        assert!(parse_type_analysis("TRACE", &pattern()).is_none());
    }

    #[test]
    fn test_mapping_field_names_include_parents() {
        let mapping = json!({"properties": {
            "resource": {"properties": {"service": {"properties": {"name": {"type": "keyword"}}}}},
            "traceID": {"type": "keyword"}
        }});
        let names = mapping_field_names([&mapping]);
        let expected: BTreeSet<String> = ["resource", "resource.service", "resource.service.name", "traceID"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, expected);
    }
}
