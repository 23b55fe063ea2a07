//! CLI helper functions

use crate::{
    client::{MongoCollection, RedisBuffer},
    config::PipelineConfig,
    dag::Dag,
    etl::{BufferKeys, Pipeline, RunReport, Stage},
    storage::CsvReader,
    transform::TitleCase,
};
use eyre::{Context, Result, eyre};
use std::path::Path;

/// The pipeline wired to the configured CSV file, Redis and MongoDB
pub type ConfiguredPipeline = Pipeline<CsvReader, TitleCase, MongoCollection, RedisBuffer>;

/// Load the configuration from an optional YAML file and the environment
pub fn load_config(file: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::load(file).context("Failed to load pipeline configuration")
}

/// Build the pipeline for `config`
///
/// `run_id` namespaces the buffer keys and takes precedence over
/// `buffer.namespace` from the configuration.
pub fn build_pipeline(config: &PipelineConfig, run_id: Option<&str>) -> Result<ConfiguredPipeline> {
    let extractor =
        CsvReader::new(&config.source.path).with_delimiter(config.delimiter_byte());
    let buffer = RedisBuffer::try_new(&config.buffer, config.timeout())
        .with_context(|| format!("Invalid buffer address {}", config.buffer.url()))?;
    let loader = MongoCollection::new(config.store.clone(), config.timeout());

    let namespace = run_id.or(config.buffer.namespace.as_deref());
    let keys = BufferKeys::namespaced(namespace);

    Ok(Pipeline::new(extractor, TitleCase, loader, buffer)
        .with_dag(Dag::from_config(config))
        .with_keys(keys))
}

/// Run all three stages once
///
/// Pipeline: CsvReader → Redis → TitleCase → Redis → MongoCollection
pub async fn run_pipeline(config: &PipelineConfig, run_id: Option<&str>) -> Result<RunReport> {
    let pipeline = build_pipeline(config, run_id)?;
    log::info!(
        "Running {} with keys '{}' and '{}'",
        pipeline.dag().dag_id,
        pipeline.keys().extracted,
        pipeline.keys().transformed
    );

    let report = pipeline.run().await;
    match &report.error {
        Some(err) => Err(eyre!("Run ended in {}: {}", report.state, err)),
        None => {
            log::info!("✓ Loaded {} document(s)", report.rows_loaded);
            Ok(report)
        }
    }
}

/// Run one stage against whatever its predecessor left in the buffer
pub async fn run_stage(config: &PipelineConfig, stage: Stage, run_id: Option<&str>) -> Result<usize> {
    let pipeline = build_pipeline(config, run_id)?;
    let rows = pipeline
        .run_stage(stage)
        .await
        .with_context(|| format!("Stage {} failed", stage))?;

    log::info!("✓ {} processed {} row(s)", stage, rows);
    Ok(rows)
}

/// The orchestrator-facing declaration as YAML
pub fn render_dag(config: &PipelineConfig) -> Result<String> {
    let dag = Dag::from_config(config);
    dag.execution_order()
        .context("Pipeline declaration is invalid")?;
    dag.to_yaml().context("Failed to render pipeline declaration")
}

/// Check the buffer and the document store are reachable
pub async fn ping(config: &PipelineConfig) -> Result<()> {
    let buffer = RedisBuffer::try_new(&config.buffer, config.timeout())?;
    buffer
        .ping()
        .await
        .with_context(|| format!("Buffer at {} did not answer", config.buffer.url()))?;
    log::info!("✓ Buffer reachable at {}", config.buffer.url());

    let store = MongoCollection::new(config.store.clone(), config.timeout());
    store
        .ping()
        .await
        .with_context(|| format!("Document store for {} did not answer", store.namespace()))?;
    log::info!("✓ Document store reachable for {}", store.namespace());

    Ok(())
}
