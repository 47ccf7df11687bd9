//! In-process artifact store backed by a concurrent map.

use async_trait::async_trait;
use dashmap::DashMap;
use insight_core::prelude::*;
use regex::Regex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct StoreKey {
    index: String,
    tenant_id: Option<String>,
    id: String,
}

/// Artifact store that keeps every document in memory.
///
/// Documents are partitioned by index and tenant. Writes are plain upserts, so
/// concurrent writers to the same id resolve as last writer wins.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    documents: DashMap<StoreKey, Document>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    searches: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across all indices and tenants
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Synchronous peek used by tests and the CLI
    pub fn document(&self, index: &str, id: &str, tenant_id: Option<&str>) -> Option<Document> {
        let key = StoreKey {
            index: index.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            id: id.to_string(),
        };
        self.documents.get(&key).map(|entry| entry.value().clone())
    }

    /// Synchronous insert used to seed state
    pub fn insert(&self, index: &str, id: &str, tenant_id: Option<&str>, document: Document) {
        let key = StoreKey {
            index: index.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            id: id.to_string(),
        };
        self.documents.insert(key, document);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }
}

fn compile_filters(filters: &[QueryFilter]) -> Result<Vec<CompiledFilter<'_>>> {
    filters
        .iter()
        .map(|filter| match filter {
            QueryFilter::Term { field, value } => Ok(CompiledFilter::Term {
                field: field.as_str(),
                value: value.as_str(),
            }),
            QueryFilter::Regexp { field, pattern } => {
                let regex = Regex::new(&format!("^(?:{})$", pattern))
                    .map_err(|e| InsightError::invalid_input(format!("Invalid regexp '{}': {}", pattern, e)))?;
                Ok(CompiledFilter::Regexp {
                    field: field.as_str(),
                    regex,
                })
            }
        })
        .collect()
}

enum CompiledFilter<'a> {
    Term { field: &'a str, value: &'a str },
    Regexp { field: &'a str, regex: Regex },
}

impl CompiledFilter<'_> {
    fn matches(&self, document: &Document) -> bool {
        match self {
            CompiledFilter::Term { field, value } => {
                document.get(*field).and_then(Value::as_str) == Some(*value)
            }
            CompiledFilter::Regexp { field, regex } => document
                .get(*field)
                .and_then(Value::as_str)
                .is_some_and(|s| regex.is_match(s)),
        }
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn get(&self, request: &GetRequest) -> Result<Option<Document>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.document(&request.index, &request.id, request.tenant_id.as_deref()))
    }

    async fn put(&self, request: &PutRequest) -> Result<()> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        debug!("Storing document {} in {}", request.id, request.index);
        self.insert(
            &request.index,
            &request.id,
            request.tenant_id.as_deref(),
            request.document.clone(),
        );
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Document>> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        let filters = compile_filters(&request.filters)?;

        let mut hits: Vec<(StoreKey, Document)> = self
            .documents
            .iter()
            .filter(|entry| {
                let key = entry.key();
                key.index == request.index && key.tenant_id == request.tenant_id
            })
            .filter(|entry| filters.iter().all(|f| f.matches(entry.value())))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        // Map iteration order is arbitrary; hits are returned in id order.
        hits.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(hits
            .into_iter()
            .take(request.size)
            .map(|(_, doc)| doc)
            .collect())
    }
}
