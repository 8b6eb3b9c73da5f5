// External crates
use log::info;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// Internal modules
use super::step_2_label_creation::Label;
use crate::error::PipelineResult;

/// Number of rows per label class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub sell: usize,
    pub buy: usize,
    pub hold: usize,
}

impl LabelCounts {
    pub fn from_labels(labels: &[Label]) -> Self {
        labels.iter().fold(Self::default(), |mut counts, label| {
            match label {
                Label::Sell => counts.sell += 1,
                Label::Buy => counts.buy += 1,
                Label::Hold => counts.hold += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.sell + self.buy + self.hold
    }
}

/// Observational record of a pipeline run.
///
/// Stages take the record by value and hand back an updated copy, so each
/// field is written by exactly one stage in pipeline order. The unscaled
/// partitions are kept for audit but left out of the JSON dump.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub missing_values: BTreeMap<String, usize>,
    pub unfillable_rows: usize,
    /// Rows sharing a timestamp with another row, every occurrence counted
    pub duplicated_values: usize,
    pub duplicates_removed: usize,
    pub labels: LabelCounts,
    pub train_labels: LabelCounts,
    pub test_labels: LabelCounts,
    pub requested_scaling_method: Option<String>,
    pub scaling_method: Option<String>,
    pub scaling_fallback: bool,
    pub train_windows: Option<usize>,
    pub test_windows: Option<usize>,
    #[serde(skip)]
    pub train_data: Option<DataFrame>,
    #[serde(skip)]
    pub test_data: Option<DataFrame>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_values(mut self, missing: BTreeMap<String, usize>) -> Self {
        self.missing_values = missing;
        self
    }

    pub fn with_unfillable_rows(mut self, rows: usize) -> Self {
        self.unfillable_rows = rows;
        self
    }

    pub fn with_duplicates(mut self, duplicated: usize, removed: usize) -> Self {
        self.duplicated_values = duplicated;
        self.duplicates_removed = removed;
        self
    }

    pub fn with_labels(mut self, counts: LabelCounts) -> Self {
        self.labels = counts;
        self
    }

    pub fn with_split_labels(mut self, train: LabelCounts, test: LabelCounts) -> Self {
        self.train_labels = train;
        self.test_labels = test;
        self
    }

    pub fn with_scaling_method(mut self, requested: &str, effective: &str) -> Self {
        self.requested_scaling_method = Some(requested.to_string());
        self.scaling_method = Some(effective.to_string());
        self.scaling_fallback = requested != effective;
        self
    }

    pub fn with_unscaled_partitions(mut self, train: DataFrame, test: DataFrame) -> Self {
        self.train_data = Some(train);
        self.test_data = Some(test);
        self
    }

    pub fn with_window_counts(mut self, train: usize, test: usize) -> Self {
        self.train_windows = Some(train);
        self.test_windows = Some(test);
        self
    }

    pub fn total_missing(&self) -> usize {
        self.missing_values.values().sum()
    }

    pub fn log_summary(&self) {
        info!(
            "Diagnostics: missing={} unfillable_rows={} duplicated={} removed={}",
            self.total_missing(),
            self.unfillable_rows,
            self.duplicated_values,
            self.duplicates_removed
        );
        info!(
            "Labels: sell={} buy={} hold={} | scaling={} (fallback: {})",
            self.labels.sell,
            self.labels.buy,
            self.labels.hold,
            self.scaling_method.as_deref().unwrap_or("-"),
            self.scaling_fallback
        );
    }

    /// Writes the record (without data slices) as pretty JSON
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Deserializable mirror used by callers that read a saved record back
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub missing_values: BTreeMap<String, usize>,
    pub unfillable_rows: usize,
    pub duplicated_values: usize,
    pub duplicates_removed: usize,
    pub labels: LabelCounts,
    pub scaling_method: Option<String>,
    pub scaling_fallback: bool,
    pub train_windows: Option<usize>,
    pub test_windows: Option<usize>,
}
