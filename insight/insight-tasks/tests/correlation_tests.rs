//! Correlation across index patterns

use chrono::{Duration, Utc};
use insight_core::prelude::*;
use insight_storage::{InMemoryCluster, MemoryArtifactStore, ScriptedModel};
use insight_tasks::correlation::{IndexPattern, PatternDetector};
use insight_tasks::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn analysis(semantic_type: &str, time_field: &str, trace_id: Option<&str>, span_id: Option<&str>) -> String {
    format!(
        "<index_type_analysis>{}</index_type_analysis>",
        json!({
            "type": semantic_type,
            "confidence": "high",
            "reasoning": "naming and fields",
            "time_field": time_field,
            "trace_id_field": trace_id,
            "span_id_field": span_id,
        })
    )
}

fn log_index(cluster: InMemoryCluster, name: &str) -> InMemoryCluster {
    cluster.with_index(
        name,
        json!({"properties": {"body": {"type": "text"}, "traceId": {"type": "keyword"}, "time": {"type": "date"}}}),
        vec![doc(json!({"body": "GET /cart", "traceId": "abc", "time": "2025-12-19T00:00:00Z"}))],
    )
}

fn trace_index(cluster: InMemoryCluster, name: &str) -> InMemoryCluster {
    cluster.with_index(
        name,
        json!({"properties": {"traceID": {"type": "keyword"}, "spanID": {"type": "keyword"}, "startTime": {"type": "long"}}}),
        vec![doc(json!({"traceID": "abc", "spanID": "def", "startTime": 1}))],
    )
}

fn metric_index(cluster: InMemoryCluster, name: &str) -> InMemoryCluster {
    cluster.with_index(
        name,
        json!({"properties": {"value": {"type": "double"}, "@timestamp": {"type": "date"}}}),
        vec![doc(json!({"value": 0.5, "@timestamp": "2025-12-19T00:00:00Z"}))],
    )
}

/// Classification answers keyed on the pattern named in the prompt
fn classifier() -> ScriptedModel {
    ScriptedModel::new()
        .respond_when("Index Pattern: logs-otel-v1-*", analysis("LOG", "time", Some("traceId"), None))
        .respond_when("Index Pattern: logs-app-*", analysis("LOG", "time", None, None))
        .respond_when(
            "Index Pattern: jaeger-span-*",
            analysis("TRACE", "startTime", Some("traceID"), Some("spanID")),
        )
        .respond_when("Index Pattern: metrics-otel-*", analysis("METRIC", "@timestamp", None, None))
}

struct Harness {
    store: Arc<MemoryArtifactStore>,
    model: Arc<ScriptedModel>,
    ctx: TaskContext,
}

impl Harness {
    fn new(cluster: InMemoryCluster, model: ScriptedModel) -> Self {
        let store = Arc::new(MemoryArtifactStore::new());
        let model = Arc::new(model);
        let ctx = TaskContext::new(store.clone(), Arc::new(cluster), model.clone(), InsightConfig::default());
        Self { store, model, ctx }
    }

    async fn correlate(&self, index: &str) -> CorrelationResult {
        IndexCorrelationTask::new(index).correlate(&self.ctx, None).await.unwrap()
    }

    fn cached(&self, pattern: &str) -> Option<PatternCacheEntry> {
        self.store
            .document(self.ctx.storage_index(), &pattern_cache_doc_id(pattern), None)
            .map(|d| PatternCacheEntry::from_document(&d, pattern).unwrap())
    }
}

#[tokio::test]
async fn test_trace_source_finds_log_pattern() {
    let mut cluster = InMemoryCluster::new();
    cluster = log_index(cluster, "logs-otel-v1-000001");
    cluster = log_index(cluster, "logs-otel-v1-000002");
    cluster = trace_index(cluster, "jaeger-span-2025-12-19");
    let h = Harness::new(cluster, classifier());

    let service = IndexInsightService::new(h.ctx.clone());
    let record = service
        .get_insight("jaeger-span-2025-12-19", TaskType::IndexCorrelation, None)
        .await
        .unwrap();
    let content = record.content_json().unwrap();

    assert_eq!(content["total_indices_scanned"], json!(3));
    assert_eq!(content["total_patterns_detected"], json!(2));
    assert_eq!(content["source_type"], json!("TRACE"));
    assert_eq!(content["source_pattern"], json!("jaeger-span-*"));

    let tuple = &content["correlation_tuple"];
    assert_eq!(tuple["logs"]["pattern"], json!("logs-otel-v1-*"));
    assert_eq!(tuple["logs"]["sample_index"], json!("logs-otel-v1-000001"));
    assert_eq!(tuple["logs"]["trace_id_field"], json!("traceId"));
    assert_eq!(tuple["trace"]["pattern"], json!("jaeger-span-*"));
    assert_eq!(tuple["trace"]["span_id_field"], json!("spanID"));
    assert_eq!(tuple["metrics"], json!(null));
    assert!(tuple.get("llm_reasoning").is_none());

    assert_eq!(
        content["all_patterns"],
        json!([
            {"pattern": "logs-otel-v1-*", "type": "LOG", "sample_count": 2},
            {"pattern": "jaeger-span-*", "type": "TRACE", "sample_count": 1}
        ])
    );
    assert_eq!(h.model.call_count(), 2);
}

#[tokio::test]
async fn test_system_indices_are_not_scanned() {
    let mut cluster = InMemoryCluster::new();
    cluster = log_index(cluster, "logs-otel-v1-000001");
    cluster = log_index(cluster, "logs-otel-v1-000002");
    cluster = metric_index(cluster, "metrics-otel-2025.01.01");
    cluster = metric_index(cluster, "metrics-otel-2025.01.02");
    cluster = cluster.with_index(".kibana_1", json!({"properties": {}}), Vec::new());
    let h = Harness::new(cluster, classifier());

    let result = h.correlate("metrics-otel-2025.01.02").await;

    assert_eq!(result.total_indices_scanned, 4);
    assert_eq!(result.total_patterns_detected, 2);
    assert_eq!(result.source_type, SemanticType::Metric);
    assert_eq!(result.correlation_tuple.logs.unwrap().pattern, "logs-otel-v1-*");
    assert!(result.correlation_tuple.trace.is_none());
    assert_eq!(h.model.calls_containing(".kibana"), 0);
}

#[tokio::test]
async fn test_rollover_indices_collapse_into_two_patterns() {
    let mut cluster = InMemoryCluster::new();
    cluster = log_index(cluster, "logs-otel-v1-000001");
    cluster = log_index(cluster, "logs-otel-v1-000002");
    cluster = trace_index(cluster, "jaeger-span-2025-12-19");
    cluster = trace_index(cluster, "jaeger-span-2025-12-20");
    let h = Harness::new(cluster, classifier());

    let result = h.correlate("logs-otel-v1-000002").await;

    assert_eq!(result.total_indices_scanned, 4);
    assert_eq!(result.total_patterns_detected, 2);
    assert_eq!(result.source_pattern, "logs-otel-v1-*");
    assert_eq!(
        result
            .all_patterns
            .iter()
            .map(|p| (p.pattern.as_str(), p.sample_count))
            .collect::<Vec<_>>(),
        vec![("logs-otel-v1-*", 2), ("jaeger-span-*", 2)]
    );
    assert_eq!(result.correlation_tuple.trace.unwrap().pattern, "jaeger-span-*");
    assert_eq!(h.model.call_count(), 2);
}

#[tokio::test]
async fn test_log_only_cluster_leaves_trace_and_metrics_empty() {
    let mut cluster = InMemoryCluster::new();
    cluster = log_index(cluster, "logs-otel-v1-000001");
    cluster = log_index(cluster, "logs-otel-v1-000002");
    let h = Harness::new(cluster, classifier());

    let result = h.correlate("logs-otel-v1-000001").await;

    assert_eq!(result.source_type, SemanticType::Log);
    assert_eq!(result.total_patterns_detected, 1);
    let tuple = result.correlation_tuple;
    let logs = tuple.logs.unwrap();
    assert_eq!(logs.pattern, "logs-otel-v1-*");
    assert_eq!(logs.sample_index.as_deref(), Some("logs-otel-v1-000001"));
    assert!(tuple.trace.is_none());
    assert!(tuple.metrics.is_none());
    assert!(tuple.llm_reasoning.is_none());
    assert_eq!(h.model.call_count(), 1);
}

#[tokio::test]
async fn test_classifications_are_cached() {
    let mut cluster = InMemoryCluster::new();
    cluster = log_index(cluster, "logs-otel-v1-000001");
    cluster = trace_index(cluster, "jaeger-span-2025-12-19");
    let h = Harness::new(cluster, classifier());

    let first = h.correlate("jaeger-span-2025-12-19").await;
    let calls = h.model.call_count();
    let cached = h.cached("jaeger-span-*").unwrap();
    assert_eq!(cached.status, TaskStatus::Completed);
    assert_eq!(cached.info.semantic_type, SemanticType::Trace);
    assert_eq!(cached.info.trace_id_field.as_deref(), Some("traceID"));

    let second = h.correlate("jaeger-span-2025-12-19").await;
    assert_eq!(h.model.call_count(), calls);
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_expired_cache_entry_is_reclassified() {
    let cluster = trace_index(InMemoryCluster::new(), "jaeger-span-2025-12-19");
    let h = Harness::new(cluster, classifier());

    let stale = PatternCacheEntry::new(
        PatternInfo {
            semantic_type: SemanticType::Log,
            ..PatternInfo::unknown("jaeger-span-*", vec!["jaeger-span-2025-12-19".to_string()])
        },
        Utc::now() - Duration::days(8),
    );
    h.store.insert(
        h.ctx.storage_index(),
        &pattern_cache_doc_id("jaeger-span-*"),
        None,
        stale.to_document(None).unwrap(),
    );

    let result = h.correlate("jaeger-span-2025-12-19").await;
    assert_eq!(result.source_type, SemanticType::Trace);
    assert_eq!(h.model.calls_containing("Index Pattern: jaeger-span-*"), 1);
}

#[tokio::test]
async fn test_failed_classification_is_unknown_and_not_cached() {
    let mut cluster = InMemoryCluster::new();
    cluster = log_index(cluster, "logs-otel-v1-000001");
    cluster = trace_index(cluster, "jaeger-span-2025-12-19");
    let model = ScriptedModel::new()
        .fail_when("Index Pattern: logs-otel-v1-*", "rate limited")
        .respond_when(
            "Index Pattern: jaeger-span-*",
            analysis("TRACE", "startTime", Some("traceID"), Some("spanID")),
        );
    let h = Harness::new(cluster, model);

    let result = h.correlate("jaeger-span-2025-12-19").await;

    assert_eq!(result.all_patterns[0].semantic_type, SemanticType::Unknown);
    assert!(result.correlation_tuple.logs.is_none());
    assert!(h.cached("logs-otel-v1-*").is_none());
    assert!(h.cached("jaeger-span-*").is_some());
}

#[tokio::test]
async fn test_unparsable_answer_is_unknown() {
    let cluster = log_index(InMemoryCluster::new(), "logs-otel-v1-000001");
    let h = Harness::new(cluster, ScriptedModel::new().with_default("I think these are logs."));

    let result = h.correlate("logs-otel-v1-000001").await;
    assert_eq!(result.source_type, SemanticType::Unknown);
    assert_eq!(result.correlation_tuple, CorrelationTuple::default());
    assert!(h.cached("logs-otel-v1-*").is_none());
}

#[tokio::test]
async fn test_ambiguous_slot_uses_model_choice() {
    let mut cluster = InMemoryCluster::new();
    cluster = log_index(cluster, "logs-app-000001");
    cluster = log_index(cluster, "logs-otel-v1-000001");
    cluster = trace_index(cluster, "jaeger-span-2025-12-19");
    let model = classifier().respond_when(
        "<correlation_selection>",
        r#"<correlation_selection>{"logs": "logs-otel-v1-*", "trace": null, "metrics": null, "reasoning": "both use otel naming"}</correlation_selection>"#,
    );
    let h = Harness::new(cluster, model);

    let result = h.correlate("jaeger-span-2025-12-19").await;
    assert_eq!(result.correlation_tuple.logs.unwrap().pattern, "logs-otel-v1-*");
    assert_eq!(result.correlation_tuple.llm_reasoning.as_deref(), Some("both use otel naming"));
    assert_eq!(h.model.calls_containing("<correlation_selection>"), 1);
}

#[tokio::test]
async fn test_ambiguous_slot_falls_back_to_first_candidate() {
    let mut cluster = InMemoryCluster::new();
    cluster = log_index(cluster, "logs-app-000001");
    cluster = log_index(cluster, "logs-otel-v1-000001");
    cluster = trace_index(cluster, "jaeger-span-2025-12-19");
    let model = classifier().fail_when("<correlation_selection>", "model unavailable");
    let h = Harness::new(cluster, model);

    let result = h.correlate("jaeger-span-2025-12-19").await;
    assert_eq!(result.correlation_tuple.logs.unwrap().pattern, "logs-app-*");
    assert!(result.correlation_tuple.llm_reasoning.is_none());
}

#[tokio::test]
async fn test_choice_outside_candidates_falls_back() {
    let mut cluster = InMemoryCluster::new();
    cluster = log_index(cluster, "logs-app-000001");
    cluster = log_index(cluster, "logs-otel-v1-000001");
    cluster = trace_index(cluster, "jaeger-span-2025-12-19");
    let model = classifier().respond_when(
        "<correlation_selection>",
        r#"<correlation_selection>{"logs": "nginx-*", "reasoning": "guess"}</correlation_selection>"#,
    );
    let h = Harness::new(cluster, model);

    let result = h.correlate("jaeger-span-2025-12-19").await;
    assert_eq!(result.correlation_tuple.logs.unwrap().pattern, "logs-app-*");
    assert_eq!(result.correlation_tuple.llm_reasoning.as_deref(), Some("guess"));
}

#[tokio::test]
async fn test_system_source_is_classified_alone() {
    let mut cluster = trace_index(InMemoryCluster::new(), "jaeger-span-2025-12-19");
    cluster = metric_index(cluster, ".otel-metrics-000001");
    let model = classifier().respond_when(
        "Index Pattern: .otel-metrics-*",
        analysis("METRIC", "@timestamp", None, None),
    );
    let h = Harness::new(cluster, model);

    let result = h.correlate(".otel-metrics-000001").await;
    assert_eq!(result.source_pattern, ".otel-metrics-*");
    assert_eq!(result.source_type, SemanticType::Metric);
    assert_eq!(result.total_indices_scanned, 1);
    assert_eq!(result.total_patterns_detected, 1);
    assert_eq!(result.correlation_tuple.metrics.unwrap().sample_index.as_deref(), Some(".otel-metrics-000001"));
    assert_eq!(result.correlation_tuple.trace.unwrap().pattern, "jaeger-span-*");
}

#[tokio::test]
async fn test_classify_all_preserves_order_under_limited_concurrency() {
    let mut cluster = InMemoryCluster::new();
    let mut patterns = Vec::new();
    for i in 0..6 {
        let name = format!("svc{}-logs-000001", i);
        cluster = log_index(cluster, &name);
        patterns.push(IndexPattern {
            pattern: format!("svc{}-logs-*", i),
            indices: vec![name],
        });
    }
    let mut config = InsightConfig::default();
    config.correlation.max_concurrent_classifications = 2;
    let model = Arc::new(ScriptedModel::new().with_default(analysis("LOG", "time", None, None)));
    let ctx = TaskContext::new(Arc::new(MemoryArtifactStore::new()), Arc::new(cluster), model.clone(), config);

    let detector = PatternDetector::new(&ctx, None, "svc0-logs-000001");
    let classified = detector.classify_all(&patterns).await;

    let order: Vec<&str> = classified.iter().map(|p| p.pattern.as_str()).collect();
    assert_eq!(
        order,
        ["svc0-logs-*", "svc1-logs-*", "svc2-logs-*", "svc3-logs-*", "svc4-logs-*", "svc5-logs-*"]
    );
    assert!(classified.iter().all(|p| p.semantic_type == SemanticType::Log));
    assert_eq!(model.call_count(), 6);
}
