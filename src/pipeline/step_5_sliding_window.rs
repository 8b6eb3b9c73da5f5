// External crates
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use chrono::{DateTime, Utc};
use log::{info, warn};
use ndarray::{Array1, Array3};

// Internal modules
use super::diagnostics::Diagnostics;
use super::step_1_data_cleaning::column_as_vec;
use super::step_3_data_splitting::Partition;
use super::step_4_data_scaling::ScaledSplit;
use crate::error::{PipelineError, PipelineResult};

/// Sliding windows drawn from one partition
///
/// `features` has shape `(windows, window_length, features)`; `labels[i]` is
/// the label of the last row of window `i` and `end_index[i]` its timestamp.
#[derive(Debug, Clone)]
pub struct WindowedDataset {
    pub features: Array3<f32>,
    pub labels: Array1<i64>,
    pub end_index: Vec<DateTime<Utc>>,
}

impl WindowedDataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn window_length(&self) -> usize {
        self.features.dim().1
    }

    pub fn n_features(&self) -> usize {
        self.features.dim().2
    }

    /// Converts the windows into Burn tensors for model training
    ///
    /// # Returns
    ///
    /// Returns a tuple of (features `[windows, window_length, features]`, labels `[windows]`)
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 3>, Tensor<B, 1, Int>) {
        let (n_windows, window_length, n_features) = self.features.dim();
        let feature_data = TensorData::new(
            self.features.iter().copied().collect::<Vec<f32>>(),
            [n_windows, window_length, n_features],
        );
        let label_data = TensorData::new(self.labels.to_vec(), [n_windows]);

        (
            Tensor::<B, 3>::from_data(feature_data, device),
            Tensor::<B, 1, Int>::from_data(label_data, device),
        )
    }
}

/// Slides a window of `window_length` rows over a partition, one row at a time
///
/// A partition with `window_length` rows or fewer yields an empty dataset.
///
/// # Arguments
///
/// * `partition` - Scaled partition in time order
/// * `window_length` - Rows per window
///
/// # Returns
///
/// Returns `len - window_length` windows with right-aligned labels
pub fn build_windows(partition: &Partition, window_length: usize) -> PipelineResult<WindowedDataset> {
    if window_length == 0 {
        return Err(PipelineError::InvalidConfig {
            key: "window_length".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let n_rows = partition.len();
    if partition.index.len() != n_rows || partition.features.height() != n_rows {
        return Err(PipelineError::MisalignedPartition {
            index: partition.index.len(),
            features: partition.features.height(),
            labels: n_rows,
        });
    }
    let n_windows = n_rows.saturating_sub(window_length);

    // Collect all columns for efficient access
    let columns: Vec<Vec<f64>> = partition
        .features
        .get_column_names()
        .into_iter()
        .map(|name| column_as_vec(&partition.features, name.as_str()))
        .collect::<PipelineResult<_>>()?;
    let n_cols = columns.len();

    let mut feature_buffer = Vec::with_capacity(n_windows * window_length * n_cols);
    let mut label_buffer = Vec::with_capacity(n_windows);
    let mut end_index = Vec::with_capacity(n_windows);

    for start in 0..n_windows {
        for row in start..start + window_length {
            for column in &columns {
                feature_buffer.push(column[row] as f32);
            }
        }
        let last = start + window_length - 1;
        label_buffer.push(partition.labels[last].code());
        end_index.push(partition.index[last]);
    }

    Ok(WindowedDataset {
        features: Array3::from_shape_vec((n_windows, window_length, n_cols), feature_buffer)?,
        labels: Array1::from_vec(label_buffer),
        end_index,
    })
}

/// Builds the train and test window datasets independently
pub fn build_window_pair(
    scaled: &ScaledSplit,
    window_length: usize,
    diagnostics: Diagnostics,
) -> PipelineResult<((WindowedDataset, WindowedDataset), Diagnostics)> {
    let train = build_windows(&scaled.train, window_length)?;
    let test = build_windows(&scaled.test, window_length)?;

    for (name, dataset, partition) in [
        ("train", &train, &scaled.train),
        ("test", &test, &scaled.test),
    ] {
        if dataset.is_empty() {
            warn!(
                "{} partition has {} rows, not more than the window length {}: no windows",
                name,
                partition.len(),
                window_length
            );
        } else {
            info!("{} windows: {:?}", name, dataset.features.dim());
        }
    }

    let diagnostics = diagnostics.with_window_counts(train.len(), test.len());
    Ok(((train, test), diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::step_2_label_creation::Label;
    use burn::backend::NdArray;
    use chrono::{Duration, TimeZone};
    use polars::prelude::*;

    fn partition(n: usize) -> Partition {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        Partition {
            index: (0..n).map(|i| start + Duration::minutes(i as i64)).collect(),
            features: DataFrame::new(vec![
                Series::new("close".into(), a).into_column(),
                Series::new("volume".into(), b).into_column(),
            ])
            .unwrap(),
            labels: (0..n).map(|i| Label::ALL[(i * 7) % 3]).collect(),
        }
    }

    #[test]
    fn test_window_count_and_shape() {
        let dataset = build_windows(&partition(10), 3).unwrap();
        assert_eq!(dataset.len(), 7);
        assert_eq!(dataset.features.dim(), (7, 3, 2));
        assert_eq!(dataset.window_length(), 3);
        assert_eq!(dataset.n_features(), 2);
    }

    #[test]
    fn test_windows_are_right_aligned() {
        let source = partition(10);
        let window_length = 4;
        let dataset = build_windows(&source, window_length).unwrap();

        for i in 0..dataset.len() {
            assert_eq!(dataset.labels[i], source.labels[i + window_length - 1].code());
            assert_eq!(dataset.end_index[i], source.index[i + window_length - 1]);
            for step in 0..window_length {
                assert_eq!(dataset.features[[i, step, 0]], (i + step) as f32);
                assert_eq!(dataset.features[[i, step, 1]], 100.0 + (i + step) as f32);
            }
        }
    }

    #[test]
    fn test_short_partition_yields_no_windows() {
        for n in [0, 2, 3] {
            let dataset = build_windows(&partition(n), 3).unwrap();
            assert!(dataset.is_empty());
            assert_eq!(dataset.features.dim(), (0, 3, 2));
        }
    }

    #[test]
    fn test_zero_window_length_is_rejected() {
        assert!(build_windows(&partition(5), 0).is_err());
    }

    #[test]
    fn test_misaligned_partition_is_rejected() {
        let mut short_index = partition(6);
        short_index.index.truncate(4);
        assert!(matches!(
            build_windows(&short_index, 2),
            Err(PipelineError::MisalignedPartition { index: 4, features: 6, labels: 6 })
        ));

        let mut extra_labels = partition(6);
        extra_labels.labels.push(Label::Hold);
        assert!(build_windows(&extra_labels, 2).is_err());
    }

    #[test]
    fn test_to_tensors_shapes() {
        let dataset = build_windows(&partition(6), 2).unwrap();
        let device = Default::default();
        let (features, labels) = dataset.to_tensors::<NdArray>(&device);

        assert_eq!(features.dims(), [4, 2, 2]);
        assert_eq!(labels.dims(), [4]);

        let values: Vec<f32> = features.into_data().to_vec().unwrap();
        assert_eq!(values[0..4], [0.0, 100.0, 1.0, 101.0]);
    }
}
