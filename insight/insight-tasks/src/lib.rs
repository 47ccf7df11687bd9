//! Index insight tasks and the generation state machine.
//!
//! This crate provides:
//! - The [`IndexInsightTask`] contract and the task registry
//! - [`TaskRunner`]: caching, rate limiting and prerequisite resolution
//! - Task bodies: statistics, field descriptions, log check, correlation
//! - [`IndexInsightService`]: the host-facing entry point, including `ALL`
//!
//! # Example
//!
//! ```no_run
//! use insight_core::prelude::*;
//! use insight_tasks::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     store: Arc<dyn ArtifactStore>,
//! #     cluster: Arc<dyn ClusterMetadata>,
//! #     model: Arc<dyn ModelClient>,
//! # ) -> insight_core::Result<()> {
//! let ctx = TaskContext::new(store, cluster, model, InsightConfig::default());
//! let service = IndexInsightService::new(ctx);
//! let record = service
//!     .get_insight("logs-otel-v1-000001", TaskType::StatisticalData, None)
//!     .await?;
//! println!("{}", record.content);
//! # Ok(())
//! # }
//! ```

pub mod correlation;
pub mod runner;
pub mod service;
pub mod task;
pub mod tasks;

pub use correlation::{CorrelationResult, IndexCorrelationTask};
pub use runner::{Decision, TaskRunner};
pub use service::IndexInsightService;
pub use task::{IndexInsightTask, PatternOutcome, PrerequisiteResults, TaskContext, create_task};
pub use tasks::{FieldDescriptionTask, LogRelatedIndexCheckTask, StatisticalDataTask};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::correlation::{CorrelationResult, CorrelationTuple, IndexCorrelationTask, SlotInfo};
    pub use crate::runner::{Decision, TaskRunner};
    pub use crate::service::IndexInsightService;
    pub use crate::task::{IndexInsightTask, PatternOutcome, PrerequisiteResults, TaskContext, create_task};
    pub use crate::tasks::{FieldDescriptionTask, LogCheckResult, LogRelatedIndexCheckTask, StatisticalDataTask};
}
