// External crates
use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// Internal modules
use crate::constants::SUMMARY_FILE_NAME;
use crate::error::PipelineResult;
use crate::pipeline::step_1_data_cleaning::CleanedSeries;
use crate::util::schema::ColumnSchema;

/// Produces a report about the cleaned series before labeling.
///
/// Reports are advisory: the orchestrator logs a failing reporter and carries on.
pub trait ExplorationReporter {
    fn report(&self, series: &CleanedSeries, schema: &ColumnSchema) -> PipelineResult<()>;
}

/// Descriptive statistics for one feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (ddof = 1)
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSummary {
    fn from_column(column: &Float64Chunked) -> PipelineResult<Self> {
        Ok(Self {
            count: column.len() - column.null_count(),
            mean: column.mean(),
            std: column.std(1),
            min: column.min(),
            q25: column.quantile(0.25, QuantileMethod::Linear)?,
            median: column.median(),
            q75: column.quantile(0.75, QuantileMethod::Linear)?,
            max: column.max(),
        })
    }
}

/// Whole-series summary written as `summary.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub rows: usize,
    pub start: Option<String>,
    pub end: Option<String>,
    pub columns: BTreeMap<String, ColumnSummary>,
}

impl SeriesSummary {
    pub fn describe(series: &CleanedSeries, schema: &ColumnSchema) -> PipelineResult<Self> {
        let mut columns = BTreeMap::new();
        for name in schema.feature_names() {
            let column = series.frame.column(name)?.f64()?.clone();
            columns.insert(name.to_string(), ColumnSummary::from_column(&column)?);
        }

        Ok(Self {
            rows: series.len(),
            start: series.index.first().map(|ts| ts.to_rfc3339()),
            end: series.index.last().map(|ts| ts.to_rfc3339()),
            columns,
        })
    }
}

/// Writes [`SeriesSummary`] as pretty JSON into an exploration directory
#[derive(Debug, Clone)]
pub struct SummaryReporter {
    output_dir: PathBuf,
}

impl SummaryReporter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(SUMMARY_FILE_NAME)
    }
}

impl ExplorationReporter for SummaryReporter {
    fn report(&self, series: &CleanedSeries, schema: &ColumnSchema) -> PipelineResult<()> {
        let summary = SeriesSummary::describe(series, schema)?;
        fs::create_dir_all(&self.output_dir)?;

        let path = self.summary_path();
        fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
        info!("Exploration summary written to {}", path.display());
        Ok(())
    }
}
