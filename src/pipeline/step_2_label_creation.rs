// External crates
use chrono::{DateTime, Utc};
use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Internal modules
use super::diagnostics::{Diagnostics, LabelCounts};
use super::step_1_data_cleaning::CleanedSeries;
use crate::constants::{BUY, HOLD, NUM_CLASSES, PREPROCESSED_FILE_NAME, SELL};
use crate::error::{PipelineError, PipelineResult};
use crate::util::file_utils::write_csv;
use crate::util::schema::ColumnSchema;

/// Direction of the close-to-close move ending at a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    Sell,
    Buy,
    Hold,
}

impl Label {
    pub const ALL: [Label; NUM_CLASSES] = [Label::Sell, Label::Buy, Label::Hold];

    pub fn code(self) -> i64 {
        match self {
            Label::Sell => SELL,
            Label::Buy => BUY,
            Label::Hold => HOLD,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Label::ALL.into_iter().find(|label| label.code() == code)
    }

    /// Classifies a relative price change against the tolerance.
    ///
    /// Changes of exactly `±tolerance` are HOLD.
    pub fn classify(pct_change: f64, tolerance: f64) -> Self {
        if pct_change > tolerance {
            Label::Buy
        } else if pct_change < -tolerance {
            Label::Sell
        } else {
            Label::Hold
        }
    }
}

/// Cleaned series with one label per row
///
/// `features` and `labels` share the row positions of `index`.
#[derive(Debug, Clone)]
pub struct LabeledSeries {
    pub index: Vec<DateTime<Utc>>,
    pub features: DataFrame,
    pub labels: Vec<Label>,
}

impl LabeledSeries {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Full table: timestamp, features, label codes
    pub fn to_dataframe(&self, schema: &ColumnSchema) -> PipelineResult<DataFrame> {
        let dates: Vec<String> = self.index.iter().map(|ts| ts.to_rfc3339()).collect();
        let codes: Vec<i64> = self.labels.iter().map(|label| label.code()).collect();

        let mut columns = vec![Series::new(schema.date.as_str().into(), dates).into_column()];
        columns.extend(self.features.get_columns().iter().cloned());
        columns.push(Series::new(schema.label.as_str().into(), codes).into_column());
        Ok(DataFrame::new(columns)?)
    }
}

/// Derives the three-class direction label from close-to-close changes
///
/// # Arguments
///
/// * `cleaned` - Ordered, duplicate-free series
/// * `schema` - Used to locate the close column
/// * `tolerance` - Minimum relative change for BUY/SELL
/// * `diagnostics` - Run record, returned with the label distribution
///
/// # Returns
///
/// Returns the labeled series, one row shorter than the input since the
/// first row has no previous close
pub fn create_labels(
    cleaned: CleanedSeries,
    schema: &ColumnSchema,
    tolerance: f64,
    diagnostics: Diagnostics,
) -> PipelineResult<(LabeledSeries, Diagnostics)> {
    let n_rows = cleaned.len();
    if n_rows < 2 {
        return Err(PipelineError::EmptySeries { stage: "labeling" });
    }
    info!("Creating labels for {} rows (tolerance {})", n_rows, tolerance);

    let close = cleaned.frame.column(&schema.close)?.f64()?.clone();
    let shifted = close.shift(1);

    let pct_change: Vec<Option<f64>> = close
        .into_iter()
        .zip(shifted.into_iter())
        .map(|(curr, prev)| match (curr, prev) {
            (Some(c), Some(p)) => Some(c / p - 1.0),
            _ => None,
        })
        .collect();

    // First row has no previous close and is dropped
    let labels = pct_change
        .iter()
        .enumerate()
        .skip(1)
        .map(|(row, change)| match change {
            Some(change) if change.is_finite() => Ok(Label::classify(*change, tolerance)),
            _ => Err(PipelineError::UndefinedPriceChange { row }),
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    let counts = LabelCounts::from_labels(&labels);
    info!(
        "Labels: sell={} buy={} hold={}",
        counts.sell, counts.buy, counts.hold
    );

    let labeled = LabeledSeries {
        index: cleaned.index[1..].to_vec(),
        features: cleaned.frame.slice(1, n_rows - 1),
        labels,
    };
    Ok((labeled, diagnostics.with_labels(counts)))
}

/// Saves the labeled (pre-split) table so it can be reused without rerunning preprocessing
pub fn export_labeled_series(
    labeled: &LabeledSeries,
    schema: &ColumnSchema,
    data_dir: &Path,
) -> PipelineResult<PathBuf> {
    let path = data_dir.join(PREPROCESSED_FILE_NAME);
    write_csv(&labeled.to_dataframe(schema)?, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cleaned_from_closes(closes: &[f64]) -> CleanedSeries {
        let index = (0..closes.len())
            .map(|i| Utc.with_ymd_and_hms(2023, 1, 1 + i as u32, 0, 0, 0).unwrap())
            .collect();
        let schema = ColumnSchema::default();
        let columns = schema
            .feature_names()
            .into_iter()
            .map(|name| Series::new(name.into(), closes.to_vec()).into_column())
            .collect();
        CleanedSeries {
            index,
            frame: DataFrame::new(columns).unwrap(),
        }
    }

    #[test]
    fn test_labels_for_reference_sequence() {
        let cleaned = cleaned_from_closes(&[100.0, 101.0, 99.0, 99.0]);
        let (labeled, diagnostics) = create_labels(
            cleaned,
            &ColumnSchema::default(),
            0.01,
            Diagnostics::new(),
        )
        .unwrap();

        assert_eq!(labeled.labels, vec![Label::Buy, Label::Sell, Label::Hold]);
        assert_eq!(labeled.features.height(), 3);
        assert_eq!(labeled.index.len(), 3);
        assert_eq!(diagnostics.labels.total(), 3);
    }

    #[test]
    fn test_exact_tolerance_is_hold() {
        assert_eq!(Label::classify(0.5, 0.5), Label::Hold);
        assert_eq!(Label::classify(-0.5, 0.5), Label::Hold);
        assert_eq!(Label::classify(0.0, 0.0), Label::Hold);
        assert_eq!(Label::classify(1e-9, 0.0), Label::Buy);

        // 2 -> 3 and 3 -> 1.5 are exactly +50% and -50%
        let cleaned = cleaned_from_closes(&[2.0, 3.0, 1.5]);
        let (labeled, _) =
            create_labels(cleaned, &ColumnSchema::default(), 0.5, Diagnostics::new()).unwrap();
        assert_eq!(labeled.labels, vec![Label::Hold, Label::Hold]);
    }

    #[test]
    fn test_zero_previous_close_is_rejected() {
        let cleaned = cleaned_from_closes(&[1.0, 0.0, 2.0]);
        let err = create_labels(cleaned, &ColumnSchema::default(), 0.01, Diagnostics::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UndefinedPriceChange { row: 2 }));
    }

    #[test]
    fn test_single_row_cannot_be_labeled() {
        let cleaned = cleaned_from_closes(&[1.0]);
        assert!(matches!(
            create_labels(cleaned, &ColumnSchema::default(), 0.01, Diagnostics::new()),
            Err(PipelineError::EmptySeries { .. })
        ));
    }

    #[test]
    fn test_label_codes() {
        for label in Label::ALL {
            assert_eq!(Label::from_code(label.code()), Some(label));
        }
        assert_eq!(Label::Sell.code(), 0);
        assert_eq!(Label::Buy.code(), 1);
        assert_eq!(Label::Hold.code(), 2);
        assert_eq!(Label::from_code(7), None);
    }

    #[test]
    fn test_export_writes_label_column() {
        let dir = tempfile::tempdir().unwrap();
        let schema = ColumnSchema::default();
        let cleaned = cleaned_from_closes(&[100.0, 101.0, 99.0]);
        let (labeled, _) = create_labels(cleaned, &schema, 0.01, Diagnostics::new()).unwrap();

        let path = export_labeled_series(&labeled, &schema, dir.path()).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "date,open,high,low,close,volume,labels");
        assert_eq!(text.lines().count(), 3);
    }
}
