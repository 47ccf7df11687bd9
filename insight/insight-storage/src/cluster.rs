//! In-process cluster metadata: index names, mappings and raw documents.

use async_trait::async_trait;
use insight_core::mapping::{is_pattern, simple_match};
use insight_core::prelude::*;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
struct IndexData {
    name: String,
    mapping: Value,
    documents: Vec<Document>,
}

/// Cluster view over a fixed set of indices, kept in creation order.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    indices: RwLock<Vec<IndexData>>,
    unavailable: RwLock<HashSet<String>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`InMemoryCluster::add_index`]
    pub fn with_index(self, name: impl Into<String>, mapping: Value, documents: Vec<Document>) -> Self {
        self.add_index(name, mapping, documents);
        self
    }

    /// Add or replace an index. `mapping` is the object holding `properties`.
    pub fn add_index(&self, name: impl Into<String>, mapping: Value, documents: Vec<Document>) {
        let name = name.into();
        let mut indices = self.indices.write();
        let data = IndexData {
            name: name.clone(),
            mapping,
            documents,
        };
        match indices.iter_mut().find(|i| i.name == name) {
            Some(existing) => *existing = data,
            None => indices.push(data),
        }
    }

    /// Make mapping and sample reads of `name` fail until cleared
    pub fn set_unavailable(&self, name: impl Into<String>, unavailable: bool) {
        let name = name.into();
        let mut set = self.unavailable.write();
        if unavailable {
            set.insert(name);
        } else {
            set.remove(&name);
        }
    }

    fn check_available(&self, name: &str) -> Result<()> {
        if self.unavailable.read().contains(name) {
            return Err(InsightError::store(format!("index {} is unavailable", name)));
        }
        Ok(())
    }

    /// Indices selected by a concrete name or a wildcard expression
    fn resolve(&self, index_or_pattern: &str) -> Result<Vec<IndexData>> {
        let indices = self.indices.read();
        if is_pattern(index_or_pattern) {
            return Ok(indices
                .iter()
                .filter(|i| simple_match(index_or_pattern, &i.name))
                .cloned()
                .collect());
        }

        indices
            .iter()
            .find(|i| i.name == index_or_pattern)
            .cloned()
            .map(|i| vec![i])
            .ok_or_else(|| InsightError::not_found("index", index_or_pattern))
    }
}

#[async_trait]
impl ClusterMetadata for InMemoryCluster {
    async fn list_indices(&self) -> Result<Vec<String>> {
        Ok(self.indices.read().iter().map(|i| i.name.clone()).collect())
    }

    async fn get_mapping(&self, index_or_pattern: &str) -> Result<BTreeMap<String, Value>> {
        let mut mappings = BTreeMap::new();
        for index in self.resolve(index_or_pattern)? {
            self.check_available(&index.name)?;
            mappings.insert(index.name, index.mapping);
        }
        Ok(mappings)
    }

    async fn search_sample(&self, index_or_pattern: &str, size: usize) -> Result<Vec<Document>> {
        let mut sample = Vec::new();
        for index in self.resolve(index_or_pattern)? {
            self.check_available(&index.name)?;
            let remaining = size.saturating_sub(sample.len());
            sample.extend(index.documents.into_iter().take(remaining));
            if sample.len() >= size {
                break;
            }
        }
        Ok(sample)
    }
}
