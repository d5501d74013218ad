//! Pipeline execution engine.
//!
//! Runs ingest, categorical encode and feature engineering in order, stops at
//! the first failure, and optionally writes the final table to disk.

use super::steps::{StepKind, categorical_encode, feature_engineering, ingest};
use crate::config::{OutputConfig, PipelineConfig};
use crate::error::{Error, Result};
use crate::table::Table;
use chrono::Local;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Shape of the table after one step.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step: StepKind,
    pub rows: usize,
    pub columns: usize,
    pub duration: Duration,
}

/// Report generated after pipeline execution
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Rows as ingested
    pub rows_before: usize,

    /// Columns as ingested
    pub columns_before: usize,

    pub rows_after: usize,

    pub columns_after: usize,

    pub steps: Vec<StepRecord>,

    /// Where the final table was written, if anywhere
    pub output_path: Option<PathBuf>,

    pub duration: Duration,
}

impl RunReport {
    pub fn steps_applied(&self) -> usize {
        self.steps.len()
    }

    /// Create a summary message
    pub fn summary(&self) -> String {
        format!(
            "Pipeline completed: {} rows, {} → {} columns ({}), {} steps, {:.2}s",
            self.rows_after,
            self.columns_before,
            self.columns_after,
            match self.columns_after.cmp(&self.columns_before) {
                std::cmp::Ordering::Greater => "added",
                std::cmp::Ordering::Less => "removed",
                std::cmp::Ordering::Equal => "unchanged",
            },
            self.steps_applied(),
            self.duration.as_secs_f64()
        )
    }
}

/// Final table together with its run report.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub table: Table,
    pub report: RunReport,
}

/// Execute all steps against the configured source.
///
/// # Errors
///
/// Returns the first step error unchanged, or a config/output error.
pub async fn run_pipeline(config: &PipelineConfig) -> Result<PipelineRun> {
    config.validate()?;

    let start = Instant::now();
    let mut steps = Vec::with_capacity(StepKind::ALL.len());

    let step_start = Instant::now();
    let ingested = ingest(config).await?;
    steps.push(record(StepKind::Ingest, &ingested, step_start));
    let (rows_before, columns_before) = (ingested.height(), ingested.width());

    let step_start = Instant::now();
    let encoded = categorical_encode(&ingested, config)?;
    steps.push(record(StepKind::CategoricalEncode, &encoded, step_start));

    let step_start = Instant::now();
    let table = feature_engineering(&encoded, config)?;
    steps.push(record(StepKind::FeatureEngineering, &table, step_start));

    let output_path = match &config.output {
        Some(output) => Some(write_output(&table, output)?),
        None => None,
    };

    let report = RunReport {
        rows_before,
        columns_before,
        rows_after: table.height(),
        columns_after: table.width(),
        steps,
        output_path,
        duration: start.elapsed(),
    };
    tracing::info!("{}", report.summary());

    Ok(PipelineRun { table, report })
}

fn record(step: StepKind, table: &Table, started: Instant) -> StepRecord {
    StepRecord {
        step,
        rows: table.height(),
        columns: table.width(),
        duration: started.elapsed(),
    }
}

/// Expand path template with variables (e.g., {date})
fn expand_path_template(template: &str) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    PathBuf::from(template.replace("{date}", &today))
}

/// Write the table to the configured file. Returns the expanded path.
pub fn write_output(table: &Table, config: &OutputConfig) -> Result<PathBuf> {
    let path = expand_path_template(&config.path);
    write_table(table, &path, config.overwrite)?;
    Ok(path)
}

fn write_table(table: &Table, path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Err(Error::Config(format!(
            "Output file already exists and overwrite is false: {}",
            path.display()
        )));
    }

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if !matches!(ext.as_str(), "csv" | "parquet" | "json") {
        return Err(Error::Config(format!("Unsupported output format: '{ext}'")));
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut df = table.frame().clone();
    let file = std::fs::File::create(path)?;
    match ext.as_str() {
        "parquet" => {
            ParquetWriter::new(file).finish(&mut df)?;
        }
        "json" => {
            JsonWriter::new(file)
                .with_json_format(JsonFormat::Json)
                .finish(&mut df)?;
        }
        _ => {
            CsvWriter::new(file).include_header(true).finish(&mut df)?;
        }
    }

    tracing::info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}
