//! Generation state machine.
//!
//! One persisted record per (index, task type) is both cache and mutex:
//!
//! ```text
//!  absent ──► GENERATING ──► COMPLETED ──(older than update interval)──► GENERATING
//!                  │
//!                  └───────► FAILED ──(next request)──► GENERATING
//! ```
//!
//! A GENERATING record younger than the generating timeout rejects other
//! requesters with `TooManyRequests`; an older one is treated as abandoned.
//! Two requesters that both observe a stale record before either writes will
//! both regenerate, and the last terminal write wins.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use insight_core::mapping::simple_match;
use insight_core::prelude::*;
use insight_core::types::fields;
use tracing::{debug, error, info, warn};

use crate::task::{IndexInsightTask, PatternOutcome, PrerequisiteResults, TaskContext};

/// Matches stored index names that use wildcard syntax.
const PATTERN_INDEX_REGEXP: &str = ".*[*?,].*";

/// Upper bound on pattern records considered per lookup.
const PATTERN_SEARCH_SIZE: usize = 100;

/// What an existing record means for the current request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Fresh COMPLETED record, returned unchanged
    Serve(InsightRecord),
    /// Someone else is generating
    Reject,
    /// Missing, stale, abandoned or failed
    Regenerate,
}

/// Drives tasks through the generation state machine.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    ctx: TaskContext,
    settings: RunnerSettings,
}

impl TaskRunner {
    pub fn new(ctx: TaskContext, settings: RunnerSettings) -> Self {
        info!(
            "Initializing task runner with update_interval={}s generating_timeout={}s",
            settings.update_interval.num_seconds(),
            settings.generating_timeout.num_seconds()
        );
        Self { ctx, settings }
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    pub fn settings(&self) -> RunnerSettings {
        self.settings
    }

    /// Classify an existing record at time `now`
    pub fn decide(&self, record: &InsightRecord, now: DateTime<Utc>) -> Decision {
        let age = now - record.last_updated_time;
        match record.status {
            TaskStatus::Completed if age < self.settings.update_interval => Decision::Serve(record.clone()),
            TaskStatus::Completed => Decision::Regenerate,
            TaskStatus::Generating if age < self.settings.generating_timeout => Decision::Reject,
            TaskStatus::Generating => Decision::Regenerate,
            TaskStatus::Failed => Decision::Regenerate,
        }
    }

    /// Return the task's record, generating it (and its prerequisites) if needed
    ///
    /// # Errors
    ///
    /// `TooManyRequests` while another generation is in flight, `Prerequisite`
    /// when a prerequisite fails, `TaskBody` when the task itself fails, and
    /// store errors from reading or claiming the record
    pub async fn execute(&self, task: &dyn IndexInsightTask, tenant_id: Option<&str>) -> Result<InsightRecord> {
        self.execute_chain(task, tenant_id, Vec::new()).await
    }

    fn execute_chain<'a>(
        &'a self,
        task: &'a dyn IndexInsightTask,
        tenant_id: Option<&'a str>,
        chain: Vec<TaskType>,
    ) -> BoxFuture<'a, Result<InsightRecord>> {
        async move {
            let task_type = task.task_type();
            let index = task.source_index();

            if !task_type.is_concrete() {
                return Err(InsightError::invalid_input(format!(
                    "{} cannot be executed as a single task",
                    task_type
                )));
            }
            if chain.contains(&task_type) {
                return Err(InsightError::InvalidTaskGraph(format!(
                    "{} reappears on its own prerequisite chain {:?}",
                    task_type, chain
                )));
            }

            match self.load_record(index, task_type, tenant_id).await? {
                Some(existing) => match self.decide(&existing, self.ctx.now()) {
                    Decision::Serve(record) => {
                        debug!("Serving cached {} insight for index {}", task_type, index);
                        return Ok(record);
                    }
                    Decision::Reject => {
                        debug!("{} insight for index {} is already generating", task_type, index);
                        return Err(InsightError::too_many_requests());
                    }
                    Decision::Regenerate => {
                        debug!(
                            "Existing {} insight for index {} is {}, regenerating",
                            task_type, index, existing.status
                        );
                    }
                },
                None => {
                    if let Some(pattern_record) = self.find_pattern_record(task, tenant_id).await? {
                        match task.handle_pattern_result(&self.ctx, &pattern_record, tenant_id).await? {
                            PatternOutcome::Served(record) => {
                                info!(
                                    "Serving {} insight for index {} from pattern {}",
                                    task_type, index, pattern_record.index
                                );
                                return Ok(record);
                            }
                            PatternOutcome::Regenerate => {}
                        }
                    }
                }
            }

            self.regenerate(task, tenant_id, chain).await
        }
        .boxed()
    }

    /// Read the record stored under the task's id. Unparsable records count as absent.
    async fn load_record(
        &self,
        index: &str,
        task_type: TaskType,
        tenant_id: Option<&str>,
    ) -> Result<Option<InsightRecord>> {
        let id = doc_id(index, task_type);
        let request = GetRequest::new(self.ctx.storage_index(), id, tenant_id);
        let Some(document) = self.ctx.store.get(&request).await? else {
            return Ok(None);
        };

        match InsightRecord::from_document(&document) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(
                    "Ignoring unreadable {} insight for index {}: {}",
                    task_type, index, e
                );
                Ok(None)
            }
        }
    }

    /// Record of the same type stored under a wildcard pattern matching the
    /// task's index. Only the first matching hit is considered; it is returned
    /// when COMPLETED and fresh, otherwise there is no pattern record.
    async fn find_pattern_record(
        &self,
        task: &dyn IndexInsightTask,
        tenant_id: Option<&str>,
    ) -> Result<Option<InsightRecord>> {
        let task_type = task.task_type();
        let request = SearchRequest::new(self.ctx.storage_index(), tenant_id)
            .regexp(fields::INDEX_NAME, PATTERN_INDEX_REGEXP)
            .term(fields::TASK_TYPE, task_type.as_str())
            .size(PATTERN_SEARCH_SIZE);

        let hits = self.ctx.store.search(&request).await.map_err(|e| {
            error!(
                "Failed to search pattern matched documents for index {}: {}",
                task.source_index(),
                e
            );
            e
        })?;

        let matched = hits.iter().find(|doc| {
            doc.get(fields::INDEX_NAME)
                .and_then(serde_json::Value::as_str)
                .is_some_and(|pattern| simple_match(pattern, task.source_index()))
        });
        let Some(document) = matched else {
            return Ok(None);
        };

        let record = match InsightRecord::from_document(document) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring unreadable pattern record: {}", e);
                return Ok(None);
            }
        };

        let fresh = record.is_completed()
            && self.ctx.now() - record.last_updated_time < self.settings.update_interval;
        Ok(fresh.then_some(record))
    }

    /// Claim the slot, satisfy prerequisites in order, run the body, persist
    async fn regenerate(
        &self,
        task: &dyn IndexInsightTask,
        tenant_id: Option<&str>,
        mut chain: Vec<TaskType>,
    ) -> Result<InsightRecord> {
        let task_type = task.task_type();
        let index = task.source_index();
        let tenant = tenant_id.map(str::to_string);

        info!("Generating {} insight for index {}", task_type, index);
        let claim = InsightRecord::generating(index, task_type, tenant.clone(), self.ctx.now());
        self.write(&claim, tenant_id).await?;

        chain.push(task_type);
        let mut prerequisites = PrerequisiteResults::new();
        for prerequisite in task.prerequisites() {
            let outcome = match task.create_prerequisite_task(prerequisite) {
                Ok(prerequisite_task) => {
                    self.execute_chain(prerequisite_task.as_ref(), tenant_id, chain.clone())
                        .await
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(record) => prerequisites.insert(record),
                Err(e) => {
                    warn!(
                        "Prerequisite {} of {} failed for index {}: {}",
                        prerequisite, task_type, index, e
                    );
                    let failure = InsightError::prerequisite(prerequisite, e);
                    return Err(self.mark_failed(task, tenant_id, failure).await);
                }
            }
        }

        let content = match task.run_task(&self.ctx, tenant_id, &prerequisites).await {
            Ok(content) => content,
            Err(e) => {
                error!("{} task failed for index {}: {}", task_type, index, e);
                let failure = InsightError::task_body(task_type, e);
                return Err(self.mark_failed(task, tenant_id, failure).await);
            }
        };

        let record = InsightRecord::completed(index, task_type, content, tenant, self.ctx.now());
        if let Err(e) = self.write(&record, tenant_id).await {
            error!("Failed to save completed {} result for index {}: {}", task_type, index, e);
            return Err(self.mark_failed(task, tenant_id, e).await);
        }

        info!("{} insight completed for index {}", task_type, index);
        Ok(record)
    }

    /// Best-effort FAILED write; always hands back the original error
    async fn mark_failed(
        &self,
        task: &dyn IndexInsightTask,
        tenant_id: Option<&str>,
        failure: InsightError,
    ) -> InsightError {
        let record = InsightRecord::failed(
            task.source_index(),
            task.task_type(),
            failure.to_string(),
            tenant_id.map(str::to_string),
            self.ctx.now(),
        );
        if let Err(write_error) = self.write(&record, tenant_id).await {
            error!(
                "Failed to record FAILED status of {} for index {}: {}",
                task.task_type(),
                task.source_index(),
                write_error
            );
        }
        failure
    }

    async fn write(&self, record: &InsightRecord, tenant_id: Option<&str>) -> Result<()> {
        let id = doc_id(&record.index, record.task_type);
        let request = PutRequest::new(self.ctx.storage_index(), id, tenant_id, record.to_document()?);
        self.ctx.store.put(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use insight_storage::{InMemoryCluster, MemoryArtifactStore, ScriptedModel};
    use std::sync::Arc;

    fn runner() -> TaskRunner {
        let ctx = TaskContext::new(
            Arc::new(MemoryArtifactStore::new()),
            Arc::new(InMemoryCluster::new()),
            Arc::new(ScriptedModel::new()),
            InsightConfig::default(),
        );
        TaskRunner::new(ctx, RunnerSettings::new(Duration::hours(24), Duration::minutes(3)))
    }

    fn record(status: TaskStatus, at: DateTime<Utc>) -> InsightRecord {
        InsightRecord {
            index: "logs".to_string(),
            task_type: TaskType::StatisticalData,
            content: "{}".to_string(),
            status,
            last_updated_time: at,
            tenant_id: None,
        }
    }

    #[test]
    fn test_completed_boundaries() {
        let runner = runner();
        let now = Utc::now();
        let fresh = record(TaskStatus::Completed, now - Duration::hours(24) + Duration::milliseconds(1));
        assert!(matches!(runner.decide(&fresh, now), Decision::Serve(_)));

        let stale = record(TaskStatus::Completed, now - Duration::hours(24));
        assert_eq!(runner.decide(&stale, now), Decision::Regenerate);
    }

    #[test]
    fn test_generating_boundaries() {
        let runner = runner();
        let now = Utc::now();
        let busy = record(TaskStatus::Generating, now - Duration::seconds(179));
        assert_eq!(runner.decide(&busy, now), Decision::Reject);

        let abandoned = record(TaskStatus::Generating, now - Duration::minutes(3));
        assert_eq!(runner.decide(&abandoned, now), Decision::Regenerate);
    }

    #[test]
    fn test_failed_always_regenerates() {
        let runner = runner();
        let now = Utc::now();
        assert_eq!(runner.decide(&record(TaskStatus::Failed, now), now), Decision::Regenerate);
    }
}
