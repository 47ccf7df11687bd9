//! JSON fixtures describing a cluster and a scripted model.
//!
//! ```json
//! {
//!   "indices": [
//!     {"name": "logs-1", "mapping": {"properties": {}}, "documents": []}
//!   ],
//!   "model": {"rules": [{"when": "logs", "respond": "..."}], "default": null}
//! }
//! ```

use crate::cluster::InMemoryCluster;
use crate::model::{ModelRule, ScriptedModel};
use insight_core::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterFixture {
    #[serde(default)]
    pub indices: Vec<IndexFixture>,
    #[serde(default)]
    pub model: ModelFixture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFixture {
    pub name: String,
    #[serde(default = "empty_mapping")]
    pub mapping: Value,
    #[serde(default)]
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelFixture {
    #[serde(default)]
    pub rules: Vec<ModelRule>,
    #[serde(default)]
    pub default: Option<String>,
}

fn empty_mapping() -> Value {
    serde_json::json!({"properties": {}})
}

impl ClusterFixture {
    /// Read a fixture file
    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Loading fixture from: {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        let fixture = Self::from_json(&content)?;
        info!(
            "Loaded fixture with {} indices and {} model rules",
            fixture.indices.len(),
            fixture.model.rules.len()
        );
        Ok(fixture)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_cluster(&self) -> InMemoryCluster {
        let cluster = InMemoryCluster::new();
        for index in &self.indices {
            cluster.add_index(index.name.clone(), index.mapping.clone(), index.documents.clone());
        }
        cluster
    }

    pub fn to_model(&self) -> ScriptedModel {
        ScriptedModel::from_rules(self.model.rules.clone(), self.model.default.clone())
    }
}
