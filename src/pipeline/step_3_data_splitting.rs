// External crates
use chrono::{DateTime, Utc};
use log::info;
use polars::prelude::*;

// Internal modules
use super::diagnostics::{Diagnostics, LabelCounts};
use super::step_2_label_creation::{Label, LabeledSeries};
use crate::constants::TEST_SPLIT_RATIO;
use crate::error::{PipelineError, PipelineResult};

/// Contiguous slice of the labeled series with features and labels kept apart
#[derive(Debug, Clone)]
pub struct Partition {
    pub index: Vec<DateTime<Utc>>,
    pub features: DataFrame,
    pub labels: Vec<Label>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn slice(labeled: &LabeledSeries, offset: usize, length: usize) -> Self {
        Self {
            index: labeled.index[offset..offset + length].to_vec(),
            features: labeled.features.slice(offset as i64, length),
            labels: labeled.labels[offset..offset + length].to_vec(),
        }
    }
}

/// Chronological train/test pair; every train row precedes every test row
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Partition,
    pub test: Partition,
}

/// Train and test sizes for `n_rows`: the test partition takes `ceil(0.3 * n)`
pub fn split_sizes(n_rows: usize) -> (usize, usize) {
    let n_test = ((n_rows as f64 * TEST_SPLIT_RATIO).ceil() as usize).min(n_rows);
    (n_rows - n_test, n_test)
}

/// Splits the labeled series into train and test without shuffling
///
/// # Arguments
///
/// * `labeled` - Labeled series in time order
/// * `diagnostics` - Run record, returned with per-partition label counts
///
/// # Returns
///
/// Returns the split, or `EmptyPartition` if either side would have no rows
pub fn split_train_test(
    labeled: LabeledSeries,
    diagnostics: Diagnostics,
) -> PipelineResult<(Split, Diagnostics)> {
    let (n_train, n_test) = split_sizes(labeled.len());
    if n_train == 0 {
        return Err(PipelineError::EmptyPartition { partition: "train" });
    }
    if n_test == 0 {
        return Err(PipelineError::EmptyPartition { partition: "test" });
    }

    let train = Partition::slice(&labeled, 0, n_train);
    let test = Partition::slice(&labeled, n_train, n_test);
    info!("Training partition: {} rows", train.len());
    info!("Testing partition: {} rows", test.len());

    let diagnostics = diagnostics.with_split_labels(
        LabelCounts::from_labels(&train.labels),
        LabelCounts::from_labels(&test.labels),
    );
    Ok((Split { train, test }, diagnostics))
}
