// External crates
use log::{info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Internal modules
use super::diagnostics::Diagnostics;
use super::step_1_data_cleaning::column_as_vec;
use super::step_3_data_splitting::{Partition, Split};
use super::step_6_scaler_serialization::save_scaler;
use crate::error::{PipelineError, PipelineResult};
use crate::util::config::ScalingSection;

/// Feature scaling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMethod {
    /// Median / inter-quartile range
    Robust,
    /// Rescale into a configured range
    MinMax,
    /// Zero mean, unit variance
    Standard,
}

impl ScalingMethod {
    /// Maps a configured name to a method; unknown names fall back to standard
    pub fn resolve(name: &str) -> Self {
        match name {
            "robust" => ScalingMethod::Robust,
            "minmax" => ScalingMethod::MinMax,
            _ => ScalingMethod::Standard,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalingMethod::Robust => "robust",
            ScalingMethod::MinMax => "minmax",
            ScalingMethod::Standard => "standard",
        }
    }
}

/// Fitted per-feature transform `x' = (x - offset) / scale + shift`
///
/// For min-max scaling `shift` is the lower bound of the target range; it is
/// zero for the other methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub method: ScalingMethod,
    pub feature_names: Vec<String>,
    pub offsets: Vec<f64>,
    pub scales: Vec<f64>,
    pub shift: f64,
    pub feature_range: Option<[f64; 2]>,
}

impl ScalerArtifact {
    /// Estimates parameters from `features` (the training partition only)
    pub fn fit(
        method: ScalingMethod,
        feature_range: [f64; 2],
        features: &DataFrame,
    ) -> PipelineResult<Self> {
        if features.height() == 0 {
            return Err(PipelineError::EmptyPartition { partition: "train" });
        }

        let feature_names: Vec<String> = features
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let mut offsets = Vec::with_capacity(feature_names.len());
        let mut scales = Vec::with_capacity(feature_names.len());

        for name in &feature_names {
            let values = features.column(name)?.f64()?.clone();
            let (offset, scale) = match method {
                // Population standard deviation (ddof = 0)
                ScalingMethod::Standard => (statistic(values.mean())?, statistic(values.std(0))?),
                ScalingMethod::Robust => {
                    let q25 = statistic(values.quantile(0.25, QuantileMethod::Linear)?)?;
                    let q75 = statistic(values.quantile(0.75, QuantileMethod::Linear)?)?;
                    (statistic(values.median())?, q75 - q25)
                }
                ScalingMethod::MinMax => {
                    let min = statistic(values.min())?;
                    let max = statistic(values.max())?;
                    let [lo, hi] = feature_range;
                    (min, non_zero(max - min) / (hi - lo))
                }
            };
            offsets.push(offset);
            scales.push(non_zero(scale));
        }

        let (shift, feature_range) = match method {
            ScalingMethod::MinMax => (feature_range[0], Some(feature_range)),
            _ => (0.0, None),
        };

        Ok(Self {
            method,
            feature_names,
            offsets,
            scales,
            shift,
            feature_range,
        })
    }

    /// Applies the fitted transform, keeping row order and column names
    pub fn transform(&self, features: &DataFrame) -> PipelineResult<DataFrame> {
        self.map_columns(features, |x, offset, scale| (x - offset) / scale + self.shift)
    }

    /// Maps scaled values back to the original units
    pub fn inverse_transform(&self, scaled: &DataFrame) -> PipelineResult<DataFrame> {
        self.map_columns(scaled, |x, offset, scale| (x - self.shift) * scale + offset)
    }

    fn map_columns<F>(&self, df: &DataFrame, f: F) -> PipelineResult<DataFrame>
    where
        F: Fn(f64, f64, f64) -> f64,
    {
        let columns = self
            .feature_names
            .iter()
            .zip(self.offsets.iter().zip(&self.scales))
            .map(|(name, (&offset, &scale))| {
                let values: Vec<f64> = column_as_vec(df, name)?
                    .into_iter()
                    .map(|x| f(x, offset, scale))
                    .collect();
                Ok(Series::new(name.as_str().into(), values).into_column())
            })
            .collect::<PipelineResult<Vec<Column>>>()?;
        Ok(DataFrame::new(columns)?)
    }
}

/// Split with scaled features plus the transform that produced them
#[derive(Debug, Clone)]
pub struct ScaledSplit {
    pub train: Partition,
    pub test: Partition,
    pub artifact: ScalerArtifact,
    pub artifact_path: PathBuf,
}

/// Fits the scaler on train features, scales both partitions and persists the scaler
///
/// # Arguments
///
/// * `split` - Chronological train/test split
/// * `scaling` - Configured method name and min-max target range
/// * `model_dir` - Directory the fitted scaler is written to
/// * `diagnostics` - Run record, returned with the effective method and the
///   unscaled partitions
///
/// # Returns
///
/// Returns the scaled split; labels and timestamps are carried over unchanged
pub fn scale_split(
    split: Split,
    scaling: &ScalingSection,
    model_dir: &Path,
    diagnostics: Diagnostics,
) -> PipelineResult<(ScaledSplit, Diagnostics)> {
    let method = ScalingMethod::resolve(&scaling.method);
    if method.name() != scaling.method {
        warn!(
            "Unrecognized scaling method '{}', falling back to {}",
            scaling.method,
            method.name()
        );
    }
    let diagnostics = diagnostics
        .with_scaling_method(&scaling.method, method.name())
        .with_unscaled_partitions(split.train.features.clone(), split.test.features.clone());

    // Fit on the training partition only
    let artifact = ScalerArtifact::fit(method, scaling.minmax_range, &split.train.features)?;
    let artifact_path = save_scaler(&artifact, model_dir)?;
    info!(
        "Fitted {} scaler on {} training rows",
        method.name(),
        split.train.len()
    );

    let train = Partition {
        features: artifact.transform(&split.train.features)?,
        ..split.train
    };
    let test = Partition {
        features: artifact.transform(&split.test.features)?,
        ..split.test
    };

    Ok((
        ScaledSplit {
            train,
            test,
            artifact,
            artifact_path,
        },
        diagnostics,
    ))
}

fn non_zero(scale: f64) -> f64 {
    if scale == 0.0 || !scale.is_finite() {
        1.0
    } else {
        scale
    }
}

/// Aggregates only come back empty for an all-null column
fn statistic(value: Option<f64>) -> PipelineResult<f64> {
    value.ok_or(PipelineError::EmptyPartition { partition: "train" })
}
