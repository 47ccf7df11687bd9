//! Cross-index correlation: find the LOG, TRACE and METRIC patterns that
//! describe the same system as a source index.

pub mod detector;
pub mod engine;
pub mod pattern;

use async_trait::async_trait;
use insight_core::prelude::*;
use tracing::{debug, info};

pub use detector::PatternDetector;
pub use engine::{CorrelationEngine, CorrelationResult, CorrelationTuple, PatternSummary, SlotInfo};
pub use pattern::{IndexPattern, group_index_patterns, is_system_index, pattern_for};

use crate::task::{IndexInsightTask, PrerequisiteResults, TaskContext};

#[derive(Debug, Clone)]
pub struct IndexCorrelationTask {
    index: String,
}

impl IndexCorrelationTask {
    pub fn new(index: impl Into<String>) -> Self {
        Self { index: index.into() }
    }

    /// Scan the cluster and build the correlation result
    pub async fn correlate(&self, ctx: &TaskContext, tenant_id: Option<&str>) -> Result<CorrelationResult> {
        let indices: Vec<String> = ctx
            .cluster
            .list_indices()
            .await?
            .into_iter()
            .filter(|name| !is_system_index(name))
            .collect();
        let patterns = group_index_patterns(&indices);
        info!(
            "Found {} indices in {} patterns while correlating index {}",
            indices.len(),
            patterns.len(),
            self.index
        );

        let detector = PatternDetector::new(ctx, tenant_id, &self.index);
        let classified = detector.classify_all(&patterns).await;

        let source_pattern = pattern_for(&self.index);
        let source = match classified.iter().find(|info| info.pattern == source_pattern) {
            Some(info) => info.clone(),
            None => {
                debug!("Source index {} was not part of the scan, classifying it alone", self.index);
                detector
                    .classify(&IndexPattern {
                        pattern: source_pattern,
                        indices: vec![self.index.clone()],
                    })
                    .await
            }
        };

        Ok(CorrelationEngine::new(ctx, &self.index)
            .assemble(&source, &classified, indices.len())
            .await)
    }
}

#[async_trait]
impl IndexInsightTask for IndexCorrelationTask {
    fn task_type(&self) -> TaskType {
        TaskType::IndexCorrelation
    }

    fn source_index(&self) -> &str {
        &self.index
    }

    async fn run_task(
        &self,
        ctx: &TaskContext,
        tenant_id: Option<&str>,
        _prerequisites: &PrerequisiteResults,
    ) -> Result<String> {
        let result = self.correlate(ctx, tenant_id).await?;
        Ok(serde_json::to_string(&result)?)
    }
}
