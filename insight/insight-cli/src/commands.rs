//! Command implementations.

use anyhow::{Context, Result, bail};
use insight_core::prelude::*;
use insight_storage::{ClusterFixture, MemoryArtifactStore};
use insight_tasks::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Defaults, then the file (if any), then environment overrides
pub async fn load_config(path: Option<&Path>) -> Result<InsightConfig> {
    let mut config = match path {
        Some(path) => InsightConfig::load_from_path(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => InsightConfig::default(),
    };
    config.merge_env_vars().context("Invalid environment override")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub async fn run_task(
    config: InsightConfig,
    fixture_path: &Path,
    index: &str,
    task_type: &str,
    tenant_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let task_type: TaskType = task_type.parse()?;
    let fixture = ClusterFixture::load(fixture_path)
        .await
        .with_context(|| format!("Failed to load fixture {}", fixture_path.display()))?;
    debug!("Loaded fixture with {} indices", fixture.indices.len());

    let ctx = TaskContext::new(
        Arc::new(MemoryArtifactStore::new()),
        Arc::new(fixture.to_cluster()),
        Arc::new(fixture.to_model()),
        config,
    );
    let service = IndexInsightService::new(ctx);

    info!("Running {} for index {}", task_type, index);
    let record = service
        .get_insight(index, task_type, tenant_id)
        .await
        .with_context(|| format!("{} failed for index {}", task_type, index))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{}", pretty_content(&record.content));
    }
    Ok(())
}

pub fn print_doc_id(index: &str, task_type: &str) -> Result<()> {
    let task_type: TaskType = task_type.parse()?;
    if !task_type.is_concrete() {
        bail!("{} records are never stored", task_type);
    }
    println!("{}", doc_id(index, task_type));
    Ok(())
}

pub fn show_config(config: &InsightConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

pub async fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    InsightConfig::default().save_to_path(path).await?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Content re-indented when it is JSON, unchanged otherwise
fn pretty_content(content: &str) -> String {
    serde_json::from_str::<serde_json::Value>(content)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| content.to_string())
}
