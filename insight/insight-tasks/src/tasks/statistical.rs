//! Statistical profile of an index: example documents plus per-field
//! distribution computed over a document sample.

use async_trait::async_trait;
use insight_core::mapping::flatten_mappings;
use insight_core::prelude::*;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::task::{IndexInsightTask, PrerequisiteResults, TaskContext};

pub const EXAMPLE_DOCS_KEY: &str = "example_docs";
pub const IMPORTANT_COLUMN_KEY: &str = "important_column_and_distribution";

/// Field types that get `unique_terms` and `unique_count`.
const UNIQUE_TERMS_TYPES: [&str; 5] = ["text", "keyword", "integer", "long", "short"];

/// Field types that get `min_value` and `max_value`.
const MIN_MAX_TYPES: [&str; 6] = ["integer", "long", "float", "double", "short", "date"];

#[derive(Debug, Clone)]
pub struct StatisticalDataTask {
    index: String,
}

impl StatisticalDataTask {
    pub fn new(index: impl Into<String>) -> Self {
        Self { index: index.into() }
    }
}

#[async_trait]
impl IndexInsightTask for StatisticalDataTask {
    fn task_type(&self) -> TaskType {
        TaskType::StatisticalData
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
        let mappings = ctx.cluster.get_mapping(&self.index).await?;
        let fields = flatten_mappings(mappings.values(), false);
        if fields.is_empty() {
            return Err(InsightError::NoMappingProperties(self.index.clone()));
        }

        let settings = &ctx.config.statistics;
        let sample = ctx.cluster.search_sample(&self.index, settings.sample_size).await?;
        debug!(
            "Profiling {} fields of index {} over {} sampled documents",
            fields.len(),
            self.index,
            sample.len()
        );

        let profile = build_profile(
            &fields,
            &sample,
            settings.term_size,
            settings.example_docs,
            settings.not_null_threshold,
        );
        info!(
            "Statistical profile for index {} keeps {} fields",
            self.index,
            profile[IMPORTANT_COLUMN_KEY].as_object().map_or(0, Map::len)
        );
        Ok(serde_json::to_string(&profile)?)
    }
}

/// Build the profile document from flattened fields and a sample
pub fn build_profile(
    fields: &BTreeMap<String, String>,
    sample: &[Document],
    term_size: usize,
    example_docs: usize,
    not_null_threshold: f64,
) -> Value {
    let total = sample.len() as f64;
    let mut distribution = Map::new();

    for (name, field_type) in fields {
        let values: Vec<&Value> = sample
            .iter()
            .flat_map(|doc| leaf_values(doc, name))
            .collect();
        let present = sample
            .iter()
            .filter(|doc| !leaf_values(doc, name).is_empty())
            .count() as f64;

        if present <= not_null_threshold * total || present == 0.0 {
            continue;
        }

        let mut entry = Map::new();
        entry.insert("type".into(), Value::String(field_type.clone()));

        if UNIQUE_TERMS_TYPES.contains(&field_type.as_str()) {
            let (top, distinct) = top_terms(&values, term_size);
            entry.insert("unique_terms".into(), Value::Array(top));
            entry.insert("unique_count".into(), Value::from(distinct));
        }
        if MIN_MAX_TYPES.contains(&field_type.as_str()) {
            let min = values.iter().copied().min_by(|a, b| compare_values(a, b));
            let max = values.iter().copied().max_by(|a, b| compare_values(a, b));
            entry.insert("min_value".into(), min.cloned().unwrap_or(Value::Null));
            entry.insert("max_value".into(), max.cloned().unwrap_or(Value::Null));
        }

        distribution.insert(name.clone(), Value::Object(entry));
    }

    let examples: Vec<Value> = sample
        .iter()
        .take(example_docs)
        .map(|doc| Value::Object(doc.clone()))
        .collect();

    json!({
        EXAMPLE_DOCS_KEY: examples,
        IMPORTANT_COLUMN_KEY: distribution,
    })
}

/// Non-null values at a dotted path; arrays contribute their elements.
///
/// Both nested objects (`{"a": {"b": 1}}`) and flattened keys (`{"a.b": 1}`)
/// are resolved.
fn leaf_values<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    collect_path(doc, path, &mut out);
    out
}

fn collect_path<'a>(object: &'a Map<String, Value>, path: &str, out: &mut Vec<&'a Value>) {
    if let Some(value) = object.get(path) {
        push_leaf(value, out);
    }
    for (pos, _) in path.match_indices('.') {
        let (head, rest) = (&path[..pos], &path[pos + 1..]);
        match object.get(head) {
            Some(Value::Object(child)) => collect_path(child, rest, out),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::Object(child) = item {
                        collect_path(child, rest, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_leaf<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Null => {}
        Value::Array(items) => items.iter().for_each(|item| push_leaf(item, out)),
        other => out.push(other),
    }
}

/// Most frequent values (ties keep first-seen order) and the distinct count
fn top_terms(values: &[&Value], term_size: usize) -> (Vec<Value>, usize) {
    let mut counts: Vec<(&Value, usize)> = Vec::new();
    for value in values.iter().copied() {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    let distinct = counts.len();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let top = counts
        .into_iter()
        .take(term_size)
        .map(|(value, _)| value.clone())
        .collect();
    (top, distinct)
}

/// Numbers compare numerically, strings lexically (ISO dates sort correctly),
/// numbers sort before strings
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.as_str().unwrap_or_default().cmp(b.as_str().unwrap_or_default()),
    }
}
