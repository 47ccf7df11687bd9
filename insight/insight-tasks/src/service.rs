//! Entry point for hosts: one call per (index, task type) request.

use insight_core::prelude::*;
use tracing::{info, warn};

use crate::runner::TaskRunner;
use crate::task::{TaskContext, create_task};

/// Steps of an `ALL` request, in execution order
const ALL_STEPS: [TaskType; 3] = [
    TaskType::StatisticalData,
    TaskType::FieldDescription,
    TaskType::LogRelatedIndexCheck,
];

#[derive(Debug, Clone)]
pub struct IndexInsightService {
    runner: TaskRunner,
}

impl IndexInsightService {
    /// Service with the state machine windows taken from the context's config
    pub fn new(ctx: TaskContext) -> Self {
        let settings = ctx.config.runner_settings();
        Self::with_settings(ctx, settings)
    }

    pub fn with_settings(ctx: TaskContext, settings: RunnerSettings) -> Self {
        Self {
            runner: TaskRunner::new(ctx, settings),
        }
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Return the insight, generating it when missing or stale
    ///
    /// # Errors
    ///
    /// Everything [`TaskRunner::execute`] reports; for `ALL`, only
    /// `AllTasksFailed` when no step succeeds
    pub async fn get_insight(
        &self,
        index: &str,
        task_type: TaskType,
        tenant_id: Option<&str>,
    ) -> Result<InsightRecord> {
        if index.trim().is_empty() {
            return Err(InsightError::invalid_input("index name must not be empty"));
        }
        if task_type == TaskType::All {
            return self.get_all(index, tenant_id).await;
        }

        let task = create_task(task_type, index)?;
        self.runner.execute(task.as_ref(), tenant_id).await
    }

    /// Statistics, field descriptions and log check, concatenated. Field
    /// descriptions are skipped when statistics fail. Nothing is persisted
    /// under `ALL`.
    async fn get_all(&self, index: &str, tenant_id: Option<&str>) -> Result<InsightRecord> {
        let mut blocks = Vec::new();
        let mut last_error = None;
        let mut statistics_failed = false;

        for step in ALL_STEPS {
            if step == TaskType::FieldDescription && statistics_failed {
                warn!("Skipping {} for index {}: statistics unavailable", step, index);
                continue;
            }

            let outcome = match create_task(step, index) {
                Ok(task) => self.runner.execute(task.as_ref(), tenant_id).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(record) => blocks.push(format!("{}:\n{}", step, record.content)),
                Err(e) => {
                    warn!("{} failed for index {} in ALL request: {}", step, index, e);
                    statistics_failed |= step == TaskType::StatisticalData;
                    last_error = Some(e);
                }
            }
        }

        if blocks.is_empty() {
            let last = last_error.unwrap_or_else(|| InsightError::invalid_input("no steps ran"));
            return Err(InsightError::AllTasksFailed { last: Box::new(last) });
        }

        info!("ALL insight for index {} assembled from {} steps", index, blocks.len());
        Ok(InsightRecord::completed(
            index,
            TaskType::All,
            blocks.join("\n\n"),
            tenant_id.map(str::to_string),
            self.runner.context().now(),
        ))
    }
}
