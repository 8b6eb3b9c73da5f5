// External crates
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info, warn};
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};

// Internal modules
use super::diagnostics::Diagnostics;
use crate::error::{PipelineError, PipelineResult};
use crate::util::config::FillMethod;
use crate::util::schema::ColumnSchema;

/// Timestamp-ordered, duplicate-free numeric price series
///
/// `index` holds the timestamp of every row of `frame`; it is strictly
/// ascending. `frame` contains only the numeric feature columns, all
/// `Float64` without nulls.
#[derive(Debug, Clone)]
pub struct CleanedSeries {
    pub index: Vec<DateTime<Utc>>,
    pub frame: DataFrame,
}

impl CleanedSeries {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Values of a numeric column
    pub fn column_values(&self, name: &str) -> PipelineResult<Vec<f64>> {
        column_as_vec(&self.frame, name)
    }
}

/// Collects a Float64 column into a vector, nulls as NaN
pub(crate) fn column_as_vec(df: &DataFrame, name: &str) -> PipelineResult<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::MissingColumn(name.to_string()))?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Cleans a raw text table into a [`CleanedSeries`]
///
/// # Arguments
///
/// * `raw` - Table as read by the ingester (text columns)
/// * `schema` - Column roles; everything else is dropped
/// * `fill_method` - Imputation applied when any numeric value is missing
/// * `diagnostics` - Run record, returned updated
///
/// # Returns
///
/// Returns the cleaned series and the diagnostics with missing-value and
/// duplicate counts filled in
pub fn clean_series(
    raw: &DataFrame,
    schema: &ColumnSchema,
    fill_method: FillMethod,
    diagnostics: Diagnostics,
) -> PipelineResult<(CleanedSeries, Diagnostics)> {
    info!("Cleaning {} raw rows", raw.height());

    let retained = remove_unused_columns(raw, schema)?;

    // Fix data types
    let mut timestamps = parse_date_column(&retained, &schema.date)?;
    let feature_names = schema.feature_names();
    let mut features = feature_names
        .iter()
        .map(|name| parse_numeric_column(&retained, name))
        .collect::<PipelineResult<Vec<_>>>()?;

    // Count missing values before imputation
    let mut missing = BTreeMap::new();
    missing.insert(
        schema.date.clone(),
        timestamps.iter().filter(|t| t.is_none()).count(),
    );
    for (name, values) in feature_names.iter().zip(&features) {
        missing.insert(name.to_string(), values.iter().filter(|v| v.is_none()).count());
    }
    let total_missing: usize = missing.values().sum();
    let diagnostics = diagnostics.with_missing_values(missing);

    if total_missing > 0 {
        info!("Imputing {} missing values with {:?}", total_missing, fill_method);
        features = features
            .iter()
            .map(|values| impute_missing_values(values, fill_method))
            .collect();
    }

    // Rows that could not be completed cannot be ordered or used
    let complete: Vec<bool> = (0..timestamps.len())
        .map(|row| timestamps[row].is_some() && features.iter().all(|col| col[row].is_some()))
        .collect();
    let unfillable_rows = complete.iter().filter(|&&ok| !ok).count();
    if unfillable_rows > 0 {
        warn!("Dropping {} rows that could not be imputed", unfillable_rows);
        timestamps = retain_rows(&timestamps, &complete);
        features = features
            .iter()
            .map(|col| retain_rows(col, &complete))
            .collect();
    }
    let diagnostics = diagnostics.with_unfillable_rows(unfillable_rows);

    // Timestamp stays in the frame while ordering and de-duplicating
    let micros: Vec<i64> = timestamps
        .into_iter()
        .flatten()
        .map(|ts| ts.timestamp_micros())
        .collect();
    let mut columns = vec![Int64Chunked::from_vec(schema.date.as_str().into(), micros)
        .into_datetime(TimeUnit::Microseconds, None)
        .into_series()
        .into_column()];
    columns.extend(feature_names.iter().zip(features).map(|(name, values)| {
        let values: Vec<f64> = values.into_iter().flatten().collect();
        Series::new((*name).into(), values).into_column()
    }));
    let indexed = DataFrame::new(columns)?;

    // Ties keep file order, so the first occurrence survives de-duplication
    let sorted = indexed.sort(
        vec![schema.date.as_str()],
        SortMultipleOptions::default().with_maintain_order(true),
    )?;
    let duplicated = sorted
        .select([schema.date.as_str()])?
        .is_duplicated()?
        .sum()
        .unwrap_or(0) as usize;
    let subset = [schema.date.clone()];
    let deduplicated =
        sorted.unique_stable(Some(&subset[..]), UniqueKeepStrategy::First, None)?;
    let removed = sorted.height() - deduplicated.height();
    if duplicated > 0 {
        info!(
            "Found {} rows with duplicated timestamps, removed {}",
            duplicated, removed
        );
    }
    let diagnostics = diagnostics.with_duplicates(duplicated, removed);

    if deduplicated.height() == 0 {
        return Err(PipelineError::EmptySeries { stage: "cleaning" });
    }

    let index = datetime_index(&deduplicated, &schema.date)?;
    let frame = deduplicated.drop(&schema.date)?;

    info!("Cleaned series has {} rows", frame.height());
    Ok((CleanedSeries { index, frame }, diagnostics))
}

/// Keeps only the configured columns (set difference of actual vs. desired)
fn remove_unused_columns(raw: &DataFrame, schema: &ColumnSchema) -> PipelineResult<DataFrame> {
    let desired: HashSet<&str> = schema.retained_columns().into_iter().collect();
    let dropped: Vec<String> = raw
        .get_column_names()
        .into_iter()
        .filter(|name| !desired.contains(name.as_str()))
        .map(|name| name.to_string())
        .collect();
    if !dropped.is_empty() {
        debug!("Dropping unused columns: {:?}", dropped);
    }

    for name in schema.retained_columns() {
        if raw.column(name).is_err() {
            return Err(PipelineError::MissingColumn(name.to_string()));
        }
    }

    let selection: Vec<Expr> = schema
        .retained_columns()
        .into_iter()
        .map(col)
        .collect();
    Ok(raw.clone().lazy().select(selection).collect()?)
}

/// Reads any column as trimmed text cells; empty cells become `None`
fn text_cells(df: &DataFrame, name: &str) -> PipelineResult<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::MissingColumn(name.to_string()))?;
    let as_text = column.cast(&DataType::String)?;
    Ok(as_text
        .str()?
        .into_iter()
        .map(|cell| {
            cell.map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        })
        .collect())
}

fn parse_date_column(df: &DataFrame, name: &str) -> PipelineResult<Vec<Option<DateTime<Utc>>>> {
    text_cells(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, cell)| match cell {
            None => Ok(None),
            Some(text) => parse_timestamp(&text)
                .map(Some)
                .ok_or_else(|| PipelineError::TypeConversion {
                    column: name.to_string(),
                    row,
                    value: text,
                }),
        })
        .collect()
}

fn parse_numeric_column(df: &DataFrame, name: &str) -> PipelineResult<Vec<Option<f64>>> {
    text_cells(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, cell)| match cell {
            None => Ok(None),
            Some(text) => match text.parse::<f64>() {
                Ok(value) if value.is_nan() => Ok(None),
                Ok(value) => Ok(Some(value)),
                Err(_) => Err(PipelineError::TypeConversion {
                    column: name.to_string(),
                    row,
                    value: text,
                }),
            },
        })
        .collect()
}

const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

const NAIVE_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

/// Parses a timestamp cell into UTC
///
/// Offset-bearing values are converted to UTC, naive values are taken as UTC,
/// plain dates map to midnight.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Fills gaps in a column by position, extending to both boundaries
///
/// Interior gaps are interpolated with the chosen method; leading and
/// trailing gaps take the nearest known value. A column without any known
/// value is returned unchanged.
pub fn impute_missing_values(values: &[Option<f64>], method: FillMethod) -> Vec<Option<f64>> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(pos, v)| v.map(|v| (pos, v)))
        .collect();
    if known.is_empty() || known.len() == values.len() {
        return values.to_vec();
    }

    values
        .iter()
        .enumerate()
        .map(|(pos, value)| {
            if value.is_some() {
                return *value;
            }
            // First known point to the right of the gap
            let right = known.partition_point(|&(p, _)| p < pos);
            if right == 0 {
                return Some(known[0].1);
            }
            if right == known.len() {
                return Some(known[known.len() - 1].1);
            }
            let filled = match method {
                FillMethod::Linear => {
                    let (x0, y0) = known[right - 1];
                    let (x1, y1) = known[right];
                    y0 + (y1 - y0) * (pos - x0) as f64 / (x1 - x0) as f64
                }
                FillMethod::Polynomial { order } => {
                    let points = nearest_known(&known, right, pos, order + 1);
                    lagrange_at(points, pos as f64)
                }
            };
            Some(filled)
        })
        .collect()
}

/// Up to `count` known points closest to `pos`, grown outward from the gap
/// (left side wins ties). Returned as a contiguous slice of `known`.
fn nearest_known(known: &[(usize, f64)], right: usize, pos: usize, count: usize) -> &[(usize, f64)] {
    let count = count.min(known.len());
    let mut lo = right - 1;
    let mut hi = right;
    while hi - lo + 1 < count {
        let left_dist = if lo > 0 { Some(pos - known[lo - 1].0) } else { None };
        let right_dist = if hi + 1 < known.len() {
            Some(known[hi + 1].0 - pos)
        } else {
            None
        };
        match (left_dist, right_dist) {
            (Some(l), Some(r)) if l <= r => lo -= 1,
            (Some(_), Some(_)) => hi += 1,
            (Some(_), None) => lo -= 1,
            (None, Some(_)) => hi += 1,
            (None, None) => break,
        }
    }
    &known[lo..=hi]
}

/// Evaluates the Lagrange polynomial through `points` at `x`
fn lagrange_at(points: &[(usize, f64)], x: f64) -> f64 {
    points
        .iter()
        .enumerate()
        .map(|(j, &(xj, yj))| {
            let xj = xj as f64;
            let basis: f64 = points
                .iter()
                .enumerate()
                .filter(|&(m, _)| m != j)
                .map(|(_, &(xm, _))| {
                    let xm = xm as f64;
                    (x - xm) / (xj - xm)
                })
                .product();
            yj * basis
        })
        .sum()
}

fn retain_rows<T: Clone>(values: &[T], keep: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(keep)
        .filter(|(_, keep)| **keep)
        .map(|(v, _)| v.clone())
        .collect()
}

/// Reads a Datetime column back into UTC timestamps
fn datetime_index(df: &DataFrame, name: &str) -> PipelineResult<Vec<DateTime<Utc>>> {
    df.column(name)?
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(row, micros)| {
            micros
                .and_then(|us| {
                    let nanos = (us.rem_euclid(1_000_000) * 1_000) as u32;
                    DateTime::from_timestamp(us.div_euclid(1_000_000), nanos)
                })
                .ok_or_else(|| PipelineError::TypeConversion {
                    column: name.to_string(),
                    row,
                    value: format!("{:?}", micros),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw_frame(dates: &[&str], closes: &[&str]) -> DataFrame {
        let n = dates.len();
        let filler: Vec<String> = (0..n).map(|i| format!("{}", 10.0 + i as f64)).collect();
        DataFrame::new(vec![
            Series::new("date".into(), dates.to_vec()).into_column(),
            Series::new("open".into(), filler.clone()).into_column(),
            Series::new("high".into(), filler.clone()).into_column(),
            Series::new("low".into(), filler.clone()).into_column(),
            Series::new("close".into(), closes.to_vec()).into_column(),
            Series::new("volume".into(), filler).into_column(),
            Series::new("symbol".into(), vec!["AAPL"; n]).into_column(),
        ])
        .unwrap()
    }

    #[test]
    fn test_linear_fill_interior_and_boundaries() {
        let values = vec![None, Some(1.0), None, Some(3.0), None, None];
        let filled = impute_missing_values(&values, FillMethod::Linear);
        assert_eq!(
            filled,
            vec![Some(1.0), Some(1.0), Some(2.0), Some(3.0), Some(3.0), Some(3.0)]
        );
    }

    #[test]
    fn test_polynomial_fill_recovers_quadratic() {
        let values = vec![Some(0.0), Some(1.0), Some(4.0), None, Some(16.0), Some(25.0)];
        let filled = impute_missing_values(&values, FillMethod::Polynomial { order: 2 });
        assert!((filled[3].unwrap() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_polynomial_fill_degrades_with_few_points() {
        let values = vec![Some(2.0), None, Some(4.0)];
        let filled = impute_missing_values(&values, FillMethod::Polynomial { order: 5 });
        assert!((filled[1].unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_missing_column_is_left_alone() {
        let values = vec![None, None];
        assert_eq!(impute_missing_values(&values, FillMethod::Linear), values);
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = parse_timestamp("2023-01-02 09:30:00").unwrap();
        assert_eq!(parse_timestamp("2023-01-02T09:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-01-02T10:30:00+01:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-01-02 09:30:00+00:00").unwrap(), expected);
        assert!(parse_timestamp("2023-01-02").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_clean_sorts_dedups_and_counts() {
        let raw = raw_frame(
            &["2023-01-03", "2023-01-01", "2023-01-02", "2023-01-01"],
            &["103", "101", "", "999"],
        );
        let (cleaned, diagnostics) = clean_series(
            &raw,
            &ColumnSchema::default(),
            FillMethod::Linear,
            Diagnostics::new(),
        )
        .unwrap();

        assert_eq!(cleaned.len(), 3);
        assert_eq!(cleaned.frame.width(), 5);
        assert!(cleaned.frame.column("symbol").is_err());
        assert!(cleaned.frame.column("date").is_err());
        assert!(cleaned.index.windows(2).all(|w| w[0] < w[1]));

        // First occurrence in file order wins for 2023-01-01
        let close = cleaned.column_values("close").unwrap();
        assert_eq!(close[0], 101.0);
        assert_eq!(diagnostics.duplicated_values, 2);
        assert_eq!(diagnostics.duplicates_removed, 1);
        assert_eq!(diagnostics.missing_values["close"], 1);
        assert_eq!(diagnostics.missing_values["date"], 0);
    }

    #[test]
    fn test_first_occurrence_wins_across_interleaved_duplicates() {
        let raw = raw_frame(
            &[
                "2023-01-02 10:00:00",
                "2023-01-01 10:00:00",
                "2023-01-02 10:00:00",
                "2023-01-01 10:00:00",
                "2023-01-01 10:00:00",
            ],
            &["20", "10", "21", "11", "12"],
        );
        let (cleaned, diagnostics) = clean_series(
            &raw,
            &ColumnSchema::default(),
            FillMethod::Linear,
            Diagnostics::new(),
        )
        .unwrap();

        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned.frame.height(), 2);
        assert_eq!(cleaned.column_values("close").unwrap(), vec![10.0, 20.0]);
        assert_eq!(
            cleaned.index[0],
            Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(diagnostics.duplicated_values, 5);
        assert_eq!(diagnostics.duplicates_removed, 3);
        assert!(cleaned
            .frame
            .get_columns()
            .iter()
            .all(|column| column.dtype() == &DataType::Float64));
    }

    #[test]
    fn test_rows_without_timestamp_are_dropped() {
        let raw = raw_frame(&["2023-01-01", "", "2023-01-03"], &["1", "2", "3"]);
        let (cleaned, diagnostics) = clean_series(
            &raw,
            &ColumnSchema::default(),
            FillMethod::Linear,
            Diagnostics::new(),
        )
        .unwrap();
        assert_eq!(cleaned.len(), 2);
        assert_eq!(diagnostics.unfillable_rows, 1);
        assert_eq!(diagnostics.missing_values["date"], 1);
    }

    #[test]
    fn test_non_numeric_value_reports_column() {
        let raw = raw_frame(&["2023-01-01", "2023-01-02"], &["1.5", "abc"]);
        let err = clean_series(
            &raw,
            &ColumnSchema::default(),
            FillMethod::Linear,
            Diagnostics::new(),
        )
        .unwrap_err();
        match err {
            PipelineError::TypeConversion { column, row, value } => {
                assert_eq!(column, "close");
                assert_eq!(row, 1);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparseable_date_is_a_type_error() {
        let raw = raw_frame(&["2023-01-01", "not a date"], &["1", "2"]);
        let err = clean_series(
            &raw,
            &ColumnSchema::default(),
            FillMethod::Linear,
            Diagnostics::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::TypeConversion { column, .. } if column == "date"));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let raw = raw_frame(&["2023-01-01"], &["1"]).drop("volume").unwrap();
        let err = clean_series(
            &raw,
            &ColumnSchema::default(),
            FillMethod::Linear,
            Diagnostics::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(name) if name == "volume"));
    }

    #[test]
    fn test_all_rows_unusable_is_an_error() {
        let raw = raw_frame(&["", ""], &["1", "2"]);
        let err = clean_series(
            &raw,
            &ColumnSchema::default(),
            FillMethod::Linear,
            Diagnostics::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::EmptySeries { .. }));
    }
}
