// External crates
use log::info;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

// Local modules
use crate::error::{PipelineError, PipelineResult};
use crate::util::schema::ColumnSchema;

/// Loads a delimited price file into a DataFrame with every column read as text
///
/// Type coercion is left to the cleaning step so that a malformed cell can be
/// reported with its column and row instead of being silently inferred away.
///
/// # Arguments
///
/// * `file_path` - Path to the delimited file
/// * `delimiter` - Field separator (ASCII)
/// * `schema` - Column names that must be present in the header
///
/// # Returns
///
/// Returns the raw DataFrame, one row per input line
pub fn read_raw_series<P: AsRef<Path>>(
    file_path: P,
    delimiter: char,
    schema: &ColumnSchema,
) -> PipelineResult<DataFrame> {
    let path = file_path.as_ref();
    info!("Loading data from: {}", path.display());

    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.display().to_string()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| opts.with_separator(delimiter as u8))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    // Verify required columns exist
    for column in schema.retained_columns() {
        if df.column(column).is_err() {
            return Err(PipelineError::MissingColumn(column.to_string()));
        }
    }

    info!("Loaded {} rows x {} columns", df.height(), df.width());
    Ok(df)
}

/// Writes a DataFrame as a comma-separated file with header, creating parent directories
pub fn write_csv<P: AsRef<Path>>(df: &DataFrame, file_path: P) -> PipelineResult<()> {
    let path = file_path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut out = df.clone();
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut out)?;

    info!("Wrote {} rows to {}", out.height(), path.display());
    Ok(())
}
