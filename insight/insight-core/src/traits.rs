//! Collaborator interfaces consumed by the insight engine.
//!
//! The engine never talks to a concrete document store, cluster or model
//! runtime. Hosts plug those in through the traits below.

use crate::error::Result;
use crate::types::Document;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Artifact store
// ============================================================================

/// Fetch one document by id.
#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    pub index: String,
    pub id: String,
    pub tenant_id: Option<String>,
}

impl GetRequest {
    pub fn new(index: impl Into<String>, id: impl Into<String>, tenant_id: Option<&str>) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            tenant_id: tenant_id.map(str::to_string),
        }
    }
}

/// Upsert one document under an id.
#[derive(Debug, Clone, PartialEq)]
pub struct PutRequest {
    pub index: String,
    pub id: String,
    pub tenant_id: Option<String>,
    pub document: Document,
}

impl PutRequest {
    pub fn new(
        index: impl Into<String>,
        id: impl Into<String>,
        tenant_id: Option<&str>,
        document: Document,
    ) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            tenant_id: tenant_id.map(str::to_string),
            document,
        }
    }
}

/// A single match condition. All filters of a query must hold.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    /// Exact string equality on a field
    Term { field: String, value: String },
    /// Whole-value regular expression match on a string field
    Regexp { field: String, pattern: String },
}

/// Search the store for documents matching every filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    pub tenant_id: Option<String>,
    pub filters: Vec<QueryFilter>,
    pub size: usize,
}

impl SearchRequest {
    pub fn new(index: impl Into<String>, tenant_id: Option<&str>) -> Self {
        Self {
            index: index.into(),
            tenant_id: tenant_id.map(str::to_string),
            filters: Vec::new(),
            size: 100,
        }
    }

    pub fn term(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(QueryFilter::Term {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn regexp(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filters.push(QueryFilter::Regexp {
            field: field.into(),
            pattern: pattern.into(),
        });
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }
}

/// Key-value document store holding insight records and pattern cache entries.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Get a document by id; `None` if it does not exist
    async fn get(&self, request: &GetRequest) -> Result<Option<Document>>;

    /// Upsert a document
    async fn put(&self, request: &PutRequest) -> Result<()>;

    /// Search documents
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Document>>;
}

// ============================================================================
// Cluster metadata
// ============================================================================

/// Read-only view of the indices being analysed.
#[async_trait]
pub trait ClusterMetadata: Send + Sync {
    /// Names of every index in the cluster, system indices included
    async fn list_indices(&self) -> Result<Vec<String>>;

    /// Mapping source (the object holding `properties`) of every index matching
    /// `index_or_pattern`, keyed by concrete index name
    async fn get_mapping(&self, index_or_pattern: &str) -> Result<BTreeMap<String, Value>>;

    /// Up to `size` raw documents from the matching indices
    async fn search_sample(&self, index_or_pattern: &str, size: usize) -> Result<Vec<Document>>;
}

// ============================================================================
// Model invocation
// ============================================================================

/// Opaque "ask the model a prompt, get text back" call.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn call_model(&self, agent_id: &str, prompt: &str, context_index: &str) -> Result<String>;
}

// ============================================================================
// Clock
// ============================================================================

/// Source of "now" for staleness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
