//! Does the index hold log data, and which fields carry the message and the
//! trace/span identifiers?

use async_trait::async_trait;
use insight_core::prelude::*;
use insight_core::response::{extract_model_response, optional_string, parse_tagged_json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::task::{IndexInsightTask, PrerequisiteResults, TaskContext};

const ANALYSIS_TAG: &str = "log_index_analysis";

const LOG_CHECK_TEMPLATE: &str = r#"I will provide you with an index name and sample documents from that index.

Index Name: {index}

Sample Documents:
{documents}

Please determine whether this index stores log data (application logs, access logs, OpenTelemetry log records and similar).
If it does, identify the field holding the log message text and, if present, the fields holding trace and span identifiers.

Return your analysis in the following JSON format inside tags:

<log_index_analysis>
{
  "is_log_index": true | false,
  "log_message_field": "name of the message field or null",
  "trace_id_field": "name of the trace ID field or null",
  "span_id_field": "name of the span ID field or null"
}
</log_index_analysis>"#;

/// Stored content of a log check. Every key is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCheckResult {
    pub is_log_index: bool,
    pub log_message_field: Option<String>,
    pub trace_id_field: Option<String>,
    pub span_id_field: Option<String>,
}

impl LogCheckResult {
    /// Read the tagged answer out of model output; `None` when it is missing
    /// or not a JSON object
    pub fn from_model_output(text: &str) -> Option<Self> {
        let analysis = parse_tagged_json(text, ANALYSIS_TAG)?;
        let is_log_index = match analysis.get("is_log_index") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            _ => false,
        };
        Some(Self {
            is_log_index,
            log_message_field: optional_string(&analysis, "log_message_field"),
            trace_id_field: optional_string(&analysis, "trace_id_field"),
            span_id_field: optional_string(&analysis, "span_id_field"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LogRelatedIndexCheckTask {
    index: String,
}

impl LogRelatedIndexCheckTask {
    pub fn new(index: impl Into<String>) -> Self {
        Self { index: index.into() }
    }

    fn prompt(&self, sample: &[Document]) -> String {
        let documents = serde_json::to_string_pretty(sample).unwrap_or_else(|_| "[]".to_string());
        LOG_CHECK_TEMPLATE
            .replace("{index}", &self.index)
            .replace("{documents}", &documents)
    }
}

#[async_trait]
impl IndexInsightTask for LogRelatedIndexCheckTask {
    fn task_type(&self) -> TaskType {
        TaskType::LogRelatedIndexCheck
    }

    fn source_index(&self) -> &str {
        &self.index
    }

    async fn run_task(
        &self,
        ctx: &TaskContext,
        _tenant_id: Option<&str>,
        _prerequisites: &PrerequisiteResults,
    ) -> Result<String> {
        let sample_size = ctx.config.correlation.sample_documents;
        let sample = ctx.cluster.search_sample(&self.index, sample_size).await?;
        debug!("Checking index {} with {} sample documents", self.index, sample.len());

        let result = match ctx.model.call_model(ctx.agent_id(), &self.prompt(&sample), &self.index).await {
            Ok(raw) => LogCheckResult::from_model_output(&extract_model_response(&raw)).unwrap_or_else(|| {
                warn!("Unparsable log check answer for index {}, assuming not a log index", self.index);
                LogCheckResult::default()
            }),
            Err(e) => {
                warn!("Log check model call failed for index {}: {}", self.index, e);
                LogCheckResult::default()
            }
        };

        info!(
            "Index {} is_log_index={} message_field={:?}",
            self.index, result.is_log_index, result.log_message_field
        );
        Ok(serde_json::to_string(&result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tagged_answer() {
        let text = r#"Looks like OTel logs.
<log_index_analysis>
{"is_log_index": true, "log_message_field": "body", "trace_id_field": "traceId", "span_id_field": null}
</log_index_analysis>"#;
        let result = LogCheckResult::from_model_output(text).unwrap();
        assert!(result.is_log_index);
        assert_eq!(result.log_message_field.as_deref(), Some("body"));
        assert_eq!(result.trace_id_field.as_deref(), Some("traceId"));
        assert_eq!(result.span_id_field, None);
    }

    #[test]
    fn test_missing_tag_is_none() {
        assert!(LogCheckResult::from_model_output("is_log_index: yes").is_none());
        assert!(LogCheckResult::from_model_output("<log_index_analysis>[1]</log_index_analysis>").is_none());
    }

    #[test]
    fn test_default_content_keeps_every_key() {
        let content = serde_json::to_value(LogCheckResult::default()).unwrap();
        assert_eq!(
            content,
            json!({
                "is_log_index": false,
                "log_message_field": null,
                "trace_id_field": null,
                "span_id_field": null
            })
        );
    }

    #[test]
    fn test_prompt_embeds_index_and_docs() {
        let task = LogRelatedIndexCheckTask::new("app-logs-1");
        let doc = json!({"message": "GET /"}).as_object().cloned().unwrap();
        let prompt = task.prompt(&[doc]);
        assert!(prompt.contains("Index Name: app-logs-1"));
        assert!(prompt.contains("GET /"));
        assert!(prompt.contains("<log_index_analysis>"));
    }
}
