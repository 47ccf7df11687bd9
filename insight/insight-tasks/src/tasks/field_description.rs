//! Model-generated descriptions of the fields kept by the statistical profile.

use async_trait::async_trait;
use futures::future::join_all;
use insight_core::mapping::flatten_mappings;
use insight_core::prelude::*;
use insight_core::response::extract_model_response;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::statistical::{EXAMPLE_DOCS_KEY, IMPORTANT_COLUMN_KEY, StatisticalDataTask};
use crate::task::{IndexInsightTask, PatternOutcome, PrerequisiteResults, TaskContext};

#[derive(Debug, Clone)]
pub struct FieldDescriptionTask {
    index: String,
}

impl FieldDescriptionTask {
    pub fn new(index: impl Into<String>) -> Self {
        Self { index: index.into() }
    }

    async fn describe_batch(
        &self,
        ctx: &TaskContext,
        batch: &[String],
        profile: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let prompt = batch_prompt(&self.index, batch, profile);
        let response = ctx.model.call_model(ctx.agent_id(), &prompt, &self.index).await?;
        debug!(
            "Batch model call returned for {} fields of index {}",
            batch.len(),
            self.index
        );
        Ok(parse_field_descriptions(&extract_model_response(&response)))
    }
}

#[async_trait]
impl IndexInsightTask for FieldDescriptionTask {
    fn task_type(&self) -> TaskType {
        TaskType::FieldDescription
    }

    fn source_index(&self) -> &str {
        &self.index
    }

    fn prerequisites(&self) -> Vec<TaskType> {
        vec![TaskType::StatisticalData]
    }

    fn create_prerequisite_task(&self, prerequisite: TaskType) -> Result<Box<dyn IndexInsightTask>> {
        match prerequisite {
            TaskType::StatisticalData => Ok(Box::new(StatisticalDataTask::new(self.index.clone()))),
            other => Err(InsightError::UnsupportedPrerequisite {
                task_type: self.task_type(),
                prerequisite: other,
            }),
        }
    }

    async fn run_task(
        &self,
        ctx: &TaskContext,
        _tenant_id: Option<&str>,
        prerequisites: &PrerequisiteResults,
    ) -> Result<String> {
        let raw = prerequisites.content(TaskType::StatisticalData)?;
        let profile = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Err(InsightError::parse(format!(
                    "statistical content of index {} is not a JSON object",
                    self.index
                )));
            }
        };

        let Some(Value::Object(distribution)) = profile.get(IMPORTANT_COLUMN_KEY) else {
            return Err(InsightError::NoMappingProperties(self.index.clone()));
        };
        let all_fields: Vec<String> = distribution.keys().cloned().collect();
        if all_fields.is_empty() {
            warn!("No important fields found for index {}", self.index);
            return Ok(String::new());
        }

        let batch_size = ctx.config.field_description.batch_size.max(1);
        let batches: Vec<&[String]> = all_fields.chunks(batch_size).collect();
        info!(
            "Describing {} fields of index {} in {} batches",
            all_fields.len(),
            self.index,
            batches.len()
        );

        let outcomes = join_all(
            batches
                .iter()
                .map(|batch| self.describe_batch(ctx, batch, &profile)),
        )
        .await;

        let mut descriptions = Map::new();
        let mut failed = false;
        for outcome in outcomes {
            match outcome {
                Ok(batch) => descriptions.extend(batch),
                Err(e) => {
                    error!("Batch processing failed for index {}: {}", self.index, e);
                    failed = true;
                }
            }
        }
        if failed {
            return Err(InsightError::BatchProcessing("Batch processing failed".to_string()));
        }

        Ok(serde_json::to_string(&descriptions)?)
    }

    /// Keep only the pattern's descriptions for fields this index has
    async fn handle_pattern_result(
        &self,
        ctx: &TaskContext,
        pattern_record: &InsightRecord,
        tenant_id: Option<&str>,
    ) -> Result<PatternOutcome> {
        // Empty content is a valid result for a pattern without important fields
        let pattern_descriptions = match pattern_record.content_json() {
            Ok(Value::Object(map)) => map,
            _ => {
                debug!(
                    "Pattern {} holds no field descriptions, generating for index {}",
                    pattern_record.index, self.index
                );
                return Ok(PatternOutcome::Regenerate);
            }
        };

        let mappings = ctx.cluster.get_mapping(&self.index).await.map_err(|e| {
            error!("Failed to get current index mapping for index {}: {}", self.index, e);
            e
        })?;
        if mappings.is_empty() {
            return Ok(PatternOutcome::Regenerate);
        }

        let current_fields = flatten_mappings(mappings.values(), false);
        let filtered: Map<String, Value> = current_fields
            .keys()
            .filter_map(|name| {
                pattern_descriptions
                    .get(name)
                    .map(|description| (name.clone(), description.clone()))
            })
            .collect();
        debug!(
            "Pattern {} covers {} of {} fields of index {}",
            pattern_record.index,
            filtered.len(),
            current_fields.len(),
            self.index
        );

        Ok(PatternOutcome::Served(InsightRecord::completed(
            self.index.as_str(),
            TaskType::FieldDescription,
            serde_json::to_string(&filtered)?,
            tenant_id.map(str::to_string),
            pattern_record.last_updated_time,
        )))
    }
}

/// Prompt for one batch: field list plus the profile slice relevant to it
fn batch_prompt(index: &str, batch: &[String], profile: &Map<String, Value>) -> String {
    let mut prompt = String::from("Please analyze the following OpenSearch index fields and provide descriptions:\n\n");
    prompt.push_str(&format!("Index Name: {}\n\n", index));

    prompt.push_str("Fields to describe:\n");
    for field in batch {
        prompt.push_str(&format!("- {}\n", field));
    }
    prompt.push('\n');

    let distribution: Map<String, Value> = profile
        .get(IMPORTANT_COLUMN_KEY)
        .and_then(Value::as_object)
        .map(|all| {
            batch
                .iter()
                .filter_map(|field| all.get(field).map(|stats| (field.clone(), stats.clone())))
                .collect()
        })
        .unwrap_or_default();
    if !distribution.is_empty() {
        prompt.push_str(&format!("Some Field Distribution:\n{}\n\n", Value::Object(distribution)));
    }

    let docs = profile
        .get(EXAMPLE_DOCS_KEY)
        .and_then(Value::as_array)
        .filter(|docs| !docs.is_empty());
    if let Some(docs) = docs {
        let filtered: Vec<Value> = docs
            .iter()
            .map(|doc| {
                let slice: Map<String, Value> = batch
                    .iter()
                    .filter_map(|field| doc.get(field).map(|v| (field.clone(), v.clone())))
                    .collect();
                Value::Object(slice)
            })
            .collect();
        prompt.push_str(&format!("Example Documents:\n{}\n\n", Value::Array(filtered)));
    }

    prompt.push_str(
        "For each field listed above, provide a brief description of what it contains and its purpose. \
         The description should not mention specific values from any example documents or include specific examples.\n",
    );
    prompt.push_str("For each field, provide description in the following format EXACTLY:\n");
    prompt.push_str("field_name: description");
    prompt
}

/// `name: description` per line; lines without a colon or description are skipped
pub fn parse_field_descriptions(text: &str) -> Map<String, Value> {
    text.trim()
        .lines()
        .filter_map(|line| {
            let (name, description) = line.trim().split_once(':')?;
            let description = description.trim();
            (!description.is_empty()).then(|| (name.trim().to_string(), Value::String(description.to_string())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_descriptions() {
        let parsed = parse_field_descriptions(
            "level: Severity of the log entry\n\
             \n\
             no colon here\n\
             empty:   \n\
             url: Request target: path and query\n",
        );
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["level"], json!("Severity of the log entry"));
        assert_eq!(parsed["url"], json!("Request target: path and query"));
    }

    #[test]
    fn test_prompt_slices_profile_to_batch() {
        let profile = json!({
            EXAMPLE_DOCS_KEY: [{"level": "INFO", "secret": "s3cr3t"}],
            IMPORTANT_COLUMN_KEY: {
                "level": {"type": "keyword"},
                "secret": {"type": "keyword"}
            }
        });
        let prompt = batch_prompt(
            "logs-1",
            &["level".to_string()],
            profile.as_object().unwrap(),
        );

        assert!(prompt.contains("Index Name: logs-1"));
        assert!(prompt.contains("- level\n"));
        assert!(prompt.contains(r#"{"level":{"type":"keyword"}}"#));
        assert!(prompt.contains(r#"[{"level":"INFO"}]"#));
        assert!(!prompt.contains("secret"));
        assert!(prompt.ends_with("field_name: description"));
    }
}
