//! End-to-end pipeline for the creative analytics ETL.
//!
//! Normalizes the four sources, joins them into the fact table, derives the
//! performance metrics and rolls the result up per author. Persistence only
//! starts once both outputs exist, so a failed transform writes nothing.
//! Each sink replaces its tables all-or-nothing; sinks are not rolled back
//! when a later one fails.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use etl_core::error::Result;
use etl_core::metrics::MetricCalculator;
use etl_core::models::{AuthorSummary, SourceKind, Table};
use etl_core::settings::PipelineConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregator::AuthorAggregator;
use crate::joiner::FactJoiner;
use crate::normalizer::{
    AdSpendNormalizer, CreativeNormalizer, MappingNormalizer, RevenueNormalizer, SourceNormalizer,
};
use crate::reader::{CsvWorkbook, SourceProvider, SourceTables};
use crate::writer::{CsvSink, SqliteSink, TableSink};

/// Output table names, stable across runs.
pub const FACT_TABLE: &str = "fact_creative_performance";
pub const AUTHOR_TABLE: &str = "author_performance_summary";

/// File name of the run metadata written next to the CSV outputs.
pub const METADATA_FILE: &str = "run_metadata.json";

// ── Public types ──────────────────────────────────────────────────────────────

/// Facts about one run, persisted as JSON alongside the outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// RFC 3339 timestamp when the transform finished.
    pub generated_at: String,
    /// Raw row count per source table.
    pub source_rows: BTreeMap<String, usize>,
    pub fact_rows: usize,
    pub fact_columns: usize,
    pub authors: usize,
    /// Campaign names that yielded a creative key.
    pub campaign_keys_matched: usize,
    /// Campaign names that did not.
    pub campaign_keys_failed: usize,
    pub unmatched_campaign_samples: Vec<String>,
    /// Wall-clock seconds spent in the transform.
    pub transform_time_seconds: f64,
}

/// The two output tables of a run plus its metadata.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub fact: Table,
    pub authors: Vec<AuthorSummary>,
    pub metadata: RunMetadata,
}

impl PipelineOutput {
    /// The author summary rendered as a table.
    pub fn author_table(&self) -> Table {
        AuthorSummary::to_table(AUTHOR_TABLE, &self.authors)
    }
}

/// The four sources after normalization.
#[derive(Debug, Clone)]
pub struct NormalizedSources {
    pub creative: Table,
    pub ad_spend: Table,
    pub revenue: Table,
    pub mapping: Table,
}

// ── Transform ─────────────────────────────────────────────────────────────────

/// Run the in-memory transform on already-loaded sources.
///
/// 1. Normalize each source (campaign keys are extracted from ad spend).
/// 2. Left-join ad spend → mapping → revenue → creative.
/// 3. Derive the per-row metrics.
/// 4. Aggregate per author.
pub fn run_pipeline(sources: &SourceTables, config: &PipelineConfig) -> Result<PipelineOutput> {
    let started = Instant::now();
    let policy = config.date_policy;

    // ── Step 1: Normalize ─────────────────────────────────────────────────────
    info!("Normalizing sources");
    let (ad_spend, key_stats) =
        AdSpendNormalizer { date_policy: policy }.normalize_with_stats(&sources.ad_spend)?;
    let normalized = NormalizedSources {
        creative: CreativeNormalizer { date_policy: policy }.normalize(&sources.creative)?,
        ad_spend,
        revenue: RevenueNormalizer { date_policy: policy }.normalize(&sources.revenue)?,
        mapping: MappingNormalizer.normalize(&sources.mapping)?,
    };
    debug!(
        creative = ?normalized.creative.columns(),
        ad_spend = ?normalized.ad_spend.columns(),
        "Normalized columns"
    );

    // ── Step 2: Join ──────────────────────────────────────────────────────────
    let joined = FactJoiner::join(
        &normalized.ad_spend,
        &normalized.mapping,
        &normalized.revenue,
        &normalized.creative,
    )?;

    // ── Step 3: Metrics ───────────────────────────────────────────────────────
    let fact = MetricCalculator::apply(&joined)?.with_name(FACT_TABLE);
    info!(rows = fact.len(), columns = fact.width(), "Fact table built");

    // ── Step 4: Aggregate ─────────────────────────────────────────────────────
    let authors = AuthorAggregator::aggregate(&fact)?;
    info!(authors = authors.len(), "Author summary built");

    let source_rows = SourceKind::ALL
        .iter()
        .map(|kind| (kind.table_name().to_string(), sources.get(*kind).len()))
        .collect();

    let metadata = RunMetadata {
        generated_at: Utc::now().to_rfc3339(),
        source_rows,
        fact_rows: fact.len(),
        fact_columns: fact.width(),
        authors: authors.len(),
        campaign_keys_matched: key_stats.matched,
        campaign_keys_failed: key_stats.failed,
        unmatched_campaign_samples: key_stats.unmatched_samples,
        transform_time_seconds: started.elapsed().as_secs_f64(),
    };

    Ok(PipelineOutput {
        fact,
        authors,
        metadata,
    })
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// Sinks enabled by `config`, CSV first.
pub fn sinks_for(config: &PipelineConfig) -> Vec<Box<dyn TableSink>> {
    let mut sinks: Vec<Box<dyn TableSink>> = Vec::new();
    if let Some(dir) = &config.csv_dir {
        sinks.push(Box::new(CsvSink::new(dir)));
    }
    if let Some(path) = &config.database {
        sinks.push(Box::new(SqliteSink::new(path)));
    }
    sinks
}

/// Write `metadata` as pretty JSON into `dir`.
pub fn write_metadata(dir: &Path, metadata: &RunMetadata) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(METADATA_FILE);
    let json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Hand both output tables to every sink.
pub fn persist(output: &PipelineOutput, sinks: &[Box<dyn TableSink>]) -> Result<()> {
    let authors = output.author_table();
    let tables = [&output.fact, &authors];
    for sink in sinks {
        info!(sink = %sink.label(), "Persisting outputs");
        sink.write_tables(&tables)?;
    }
    Ok(())
}

/// Load, transform and persist according to `config`.
pub fn run_with(
    provider: &dyn SourceProvider,
    sinks: &[Box<dyn TableSink>],
    config: &PipelineConfig,
) -> Result<PipelineOutput> {
    let sources = provider.load()?;
    let output = run_pipeline(&sources, config)?;
    persist(&output, sinks)?;
    if let Some(dir) = &config.csv_dir {
        let path = write_metadata(dir, &output.metadata)?;
        debug!(path = %path.display(), "Wrote run metadata");
    }
    info!(
        fact_rows = output.fact.len(),
        authors = output.authors.len(),
        "ETL finished"
    );
    Ok(output)
}

/// Run against the CSV workbook in `config.input_dir` with the configured sinks.
pub fn run(config: &PipelineConfig) -> Result<PipelineOutput> {
    let workbook = CsvWorkbook::new(&config.input_dir);
    run_with(&workbook, &sinks_for(config), config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
