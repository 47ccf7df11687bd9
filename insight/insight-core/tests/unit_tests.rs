//! Unit tests for insight-core public surface

use insight_core::config::DEFAULT_STORAGE_INDEX;
use insight_core::mapping::{flatten_mappings, simple_match};
use insight_core::prelude::*;
use insight_core::response::{extract_model_response, parse_tagged_json};
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// Error Tests
// ============================================================================

#[test]
fn test_error_display() {
    let err = InsightError::store("disk full");
    assert_eq!(format!("{}", err), "Storage error: disk full");

    let err = InsightError::not_found("insight", "abc");
    assert_eq!(format!("{}", err), "Not found: insight with id abc");
    assert!(err.is_not_found());
    assert_eq!(err.status(), ErrorStatus::NotFound);
}

#[test]
fn test_unsupported_prerequisite_is_bad_request() {
    let err = InsightError::UnsupportedPrerequisite {
        task_type: TaskType::LogRelatedIndexCheck,
        prerequisite: TaskType::StatisticalData,
    };
    assert_eq!(err.status(), ErrorStatus::BadRequest);
    assert_eq!(
        err.to_string(),
        "Unsupported prerequisite type STATISTICAL_DATA for LOG_RELATED_INDEX_CHECK task"
    );
}

#[test]
fn test_serialization_error_conversion() {
    let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{nope");
    let err: InsightError = parse.unwrap_err().into();
    assert!(matches!(err, InsightError::Serialization(_)));
    assert_eq!(err.status(), ErrorStatus::Internal);
}

// ============================================================================
// Record Tests
// ============================================================================

#[test]
fn test_record_from_stored_document_with_lowercase_status() {
    let doc = json!({
        "index_name": "logs-otel-v1-000001",
        "task_type": "FIELD_DESCRIPTION",
        "content": "",
        "status": "completed",
        "last_updated_time": 1_750_000_000_000i64,
        "tenant_id": "tenant-1"
    });
    let record = InsightRecord::from_document(doc.as_object().unwrap()).unwrap();

    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.content, "");
    assert_eq!(record.tenant_id.as_deref(), Some("tenant-1"));
    assert_eq!(record.to_document().unwrap().get("status"), Some(&json!("COMPLETED")));
}

#[test]
fn test_record_without_status_does_not_parse() {
    let doc = json!({"index_name": "x", "task_type": "ALL", "last_updated_time": 1});
    assert!(InsightRecord::from_document(doc.as_object().unwrap()).is_err());
}

#[test]
fn test_doc_ids_are_stable_and_distinct() {
    let a = doc_id("logs-otel-v1-000001", TaskType::StatisticalData);
    let b = doc_id("logs-otel-v1-000001", TaskType::StatisticalData);
    let c = doc_id("logs-otel-v1-000002", TaskType::StatisticalData);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
    assert_eq!(pattern_cache_doc_id("logs-*").len(), 64);
}

// ============================================================================
// Utility Tests
// ============================================================================

#[test]
fn test_flatten_multiple_index_mappings() {
    let first = json!({"properties": {"message": {"type": "text", "fields": {"raw": {"type": "keyword"}}}}});
    let second = json!({"properties": {"traceId": {"type": "keyword"}, "alias_f": {"type": "alias"}}});

    let fields = flatten_mappings([&first, &second], false);
    assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["message", "traceId"]);

    let with_multi = flatten_mappings([&first, &second], true);
    assert!(with_multi.contains_key("message.raw"));
}

#[test]
fn test_wildcard_record_matching() {
    assert!(simple_match("logs-otel-*", "logs-otel-v1-000001"));
    assert!(!simple_match("logs-otel-*", "jaeger-span-2025-12-19"));
}

#[test]
fn test_tagged_answer_inside_envelope() {
    let raw = json!({
        "response": "Here you go <log_index_analysis>{\"is_log_index\": true}</log_index_analysis>"
    })
    .to_string();
    let answer = extract_model_response(&raw);
    let parsed = parse_tagged_json(&answer, "log_index_analysis").unwrap();
    assert_eq!(parsed.get("is_log_index"), Some(&json!(true)));
}

// ============================================================================
// Config Tests
// ============================================================================

#[tokio::test]
async fn test_config_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("insight.toml");

    let mut config = InsightConfig::default();
    config.generation.generating_timeout_secs = 42;
    config.field_description.batch_size = 7;
    config.save_to_path(&path).await.unwrap();

    let loaded = InsightConfig::load_from_path(&path).await.unwrap();
    assert_eq!(loaded.generation.generating_timeout_secs, 42);
    assert_eq!(loaded.field_description.batch_size, 7);
    assert_eq!(loaded.storage.index_name, DEFAULT_STORAGE_INDEX);
}

#[tokio::test]
async fn test_config_load_rejects_invalid_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    tokio::fs::write(&path, "[field_description]\nbatch_size = 0\n")
        .await
        .unwrap();

    let err = InsightConfig::load_from_path(&path).await.unwrap_err();
    assert!(matches!(err, InsightError::Config(_)));
}

#[tokio::test]
async fn test_config_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = InsightConfig::load_from_path(&dir.path().join("absent.toml"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
