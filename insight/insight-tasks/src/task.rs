//! The task contract and the shared execution context.

use async_trait::async_trait;
use insight_core::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::correlation::IndexCorrelationTask;
use crate::tasks::{FieldDescriptionTask, LogRelatedIndexCheckTask, StatisticalDataTask};

// ============================================================================
// Context
// ============================================================================

/// Collaborators and configuration shared by every task of a service.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<dyn ArtifactStore>,
    pub cluster: Arc<dyn ClusterMetadata>,
    pub model: Arc<dyn ModelClient>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<InsightConfig>,
}

impl TaskContext {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        cluster: Arc<dyn ClusterMetadata>,
        model: Arc<dyn ModelClient>,
        config: InsightConfig,
    ) -> Self {
        Self {
            store,
            cluster,
            model,
            clock: Arc::new(SystemClock),
            config: Arc::new(config),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Index holding insight records and pattern cache entries
    pub fn storage_index(&self) -> &str {
        &self.config.storage.index_name
    }

    pub fn agent_id(&self) -> &str {
        &self.config.model.agent_id
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("storage_index", &self.storage_index())
            .field("agent_id", &self.agent_id())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Prerequisite results
// ============================================================================

/// COMPLETED records of a task's prerequisites, keyed by type.
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteResults {
    records: BTreeMap<TaskType, InsightRecord>,
}

impl PrerequisiteResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: InsightRecord) {
        self.records.insert(record.task_type, record);
    }

    pub fn get(&self, task_type: TaskType) -> Option<&InsightRecord> {
        self.records.get(&task_type)
    }

    /// Content of a prerequisite, `NotFound` if it was not run
    pub fn content(&self, task_type: TaskType) -> Result<&str> {
        self.get(task_type)
            .map(|r| r.content.as_str())
            .ok_or_else(|| InsightError::not_found("prerequisite content", task_type.as_str()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// Task contract
// ============================================================================

/// What to do with a fresh record stored under a wildcard pattern that
/// matches the task's index.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternOutcome {
    /// Answer with this record; nothing is written
    Served(InsightRecord),
    /// Ignore the pattern record and generate normally
    Regenerate,
}

/// A unit of work producing one insight for one (index, task type) pair.
///
/// Tasks hold no long-lived state: everything they read or write goes
/// through the [`TaskContext`].
#[async_trait]
pub trait IndexInsightTask: Send + Sync {
    fn task_type(&self) -> TaskType;

    fn source_index(&self) -> &str;

    /// Task types that must be COMPLETED before `run_task`
    fn prerequisites(&self) -> Vec<TaskType> {
        Vec::new()
    }

    /// Build the task for one of the declared prerequisites
    fn create_prerequisite_task(&self, prerequisite: TaskType) -> Result<Box<dyn IndexInsightTask>> {
        Err(InsightError::UnsupportedPrerequisite {
            task_type: self.task_type(),
            prerequisite,
        })
    }

    /// Compute the record content
    async fn run_task(
        &self,
        ctx: &TaskContext,
        tenant_id: Option<&str>,
        prerequisites: &PrerequisiteResults,
    ) -> Result<String>;

    /// Serve a pattern-level record for this index. By default the pattern's
    /// content is returned as-is with the pattern's timestamp.
    async fn handle_pattern_result(
        &self,
        _ctx: &TaskContext,
        pattern_record: &InsightRecord,
        tenant_id: Option<&str>,
    ) -> Result<PatternOutcome> {
        Ok(PatternOutcome::Served(InsightRecord::completed(
            self.source_index(),
            self.task_type(),
            pattern_record.content.clone(),
            tenant_id.map(str::to_string),
            pattern_record.last_updated_time,
        )))
    }
}

/// Build the task for a concrete type
///
/// # Errors
///
/// `ALL` is not a task; it fails with `InvalidInput`
pub fn create_task(task_type: TaskType, index: impl Into<String>) -> Result<Box<dyn IndexInsightTask>> {
    let index = index.into();
    match task_type {
        TaskType::StatisticalData => Ok(Box::new(StatisticalDataTask::new(index))),
        TaskType::FieldDescription => Ok(Box::new(FieldDescriptionTask::new(index))),
        TaskType::LogRelatedIndexCheck => Ok(Box::new(LogRelatedIndexCheckTask::new(index))),
        TaskType::IndexCorrelation => Ok(Box::new(IndexCorrelationTask::new(index))),
        TaskType::All => Err(InsightError::invalid_input(
            "ALL is an aggregate request, not a task type",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds_concrete_tasks() {
        for task_type in TaskType::CONCRETE {
            let task = create_task(task_type, "logs-1").unwrap();
            assert_eq!(task.task_type(), task_type);
            assert_eq!(task.source_index(), "logs-1");
        }
    }

    #[test]
    fn test_registry_rejects_all() {
        let err = create_task(TaskType::All, "logs-1").err().unwrap();
        assert!(matches!(err, InsightError::InvalidInput(_)));
    }

    #[test]
    fn test_undeclared_prerequisite_is_rejected() {
        let task = create_task(TaskType::LogRelatedIndexCheck, "logs-1").unwrap();
        let err = task.create_prerequisite_task(TaskType::StatisticalData).err().unwrap();
        assert!(matches!(err, InsightError::UnsupportedPrerequisite { .. }));

        let task = create_task(TaskType::FieldDescription, "logs-1").unwrap();
        let prerequisite = task.create_prerequisite_task(TaskType::StatisticalData).unwrap();
        assert_eq!(prerequisite.task_type(), TaskType::StatisticalData);
        assert!(task.create_prerequisite_task(TaskType::IndexCorrelation).is_err());
    }

    #[test]
    fn test_missing_prerequisite_content() {
        let results = PrerequisiteResults::new();
        assert!(results.content(TaskType::StatisticalData).unwrap_err().is_not_found());
    }
}
