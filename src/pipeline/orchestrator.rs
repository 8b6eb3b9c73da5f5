// External crates
use log::{info, warn};
use std::path::PathBuf;

// Internal modules
use super::diagnostics::Diagnostics;
use super::step_1_data_cleaning::clean_series;
use super::step_2_label_creation::{create_labels, export_labeled_series};
use super::step_3_data_splitting::split_train_test;
use super::step_4_data_scaling::{scale_split, ScalerArtifact};
use super::step_5_sliding_window::{build_window_pair, WindowedDataset};
use crate::constants::DIAGNOSTICS_FILE_NAME;
use crate::error::PipelineResult;
use crate::util::config::PipelineConfig;
use crate::util::exploration::ExplorationReporter;
use crate::util::file_utils::read_raw_series;

/// Everything a training run needs from preparation
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub train: WindowedDataset,
    pub test: WindowedDataset,
    pub artifact: ScalerArtifact,
    pub artifact_path: PathBuf,
    pub preprocessed_path: PathBuf,
    pub diagnostics: Diagnostics,
}

/// Runs the preparation stages in order and returns the window datasets
///
/// Stops at the first failing stage; the returned error names that stage.
/// The exploration reporter, when given, runs on the cleaned series and its
/// failures are only logged.
///
/// # Arguments
///
/// * `config` - Validated pipeline configuration
/// * `reporter` - Optional exploration collaborator
///
/// # Returns
///
/// Returns the train/test windows, the fitted scaler and the run diagnostics
pub fn run_pipeline(
    config: &PipelineConfig,
    reporter: Option<&dyn ExplorationReporter>,
) -> PipelineResult<PipelineOutput> {
    config.validate().map_err(|e| e.in_stage("configuration"))?;
    let fill_method = config.fill_method().map_err(|e| e.in_stage("configuration"))?;
    let schema = &config.columns;

    info!("Step 1: Ingesting {}", config.data_link.display());
    let raw = read_raw_series(&config.data_link, config.delimiter, schema)
        .map_err(|e| e.in_stage("ingestion"))?;

    info!("Step 2: Cleaning");
    let (cleaned, diagnostics) = clean_series(&raw, schema, fill_method, Diagnostics::new())
        .map_err(|e| e.in_stage("cleaning"))?;

    if let Some(reporter) = reporter {
        if let Err(e) = reporter.report(&cleaned, schema) {
            warn!("Exploration report failed, continuing: {}", e);
        }
    }

    info!("Step 3: Labeling");
    let (labeled, diagnostics) = create_labels(cleaned, schema, config.label_tolerance, diagnostics)
        .map_err(|e| e.in_stage("labeling"))?;
    let preprocessed_path = export_labeled_series(&labeled, schema, &config.paths.data)
        .map_err(|e| e.in_stage("export"))?;

    info!("Step 4: Splitting");
    let (split, diagnostics) =
        split_train_test(labeled, diagnostics).map_err(|e| e.in_stage("splitting"))?;

    info!("Step 5: Scaling");
    let (scaled, diagnostics) = scale_split(split, &config.scaling, &config.model_dir(), diagnostics)
        .map_err(|e| e.in_stage("scaling"))?;

    info!("Step 6: Windowing (length {})", config.window_length);
    let ((train, test), diagnostics) = build_window_pair(&scaled, config.window_length, diagnostics)
        .map_err(|e| e.in_stage("windowing"))?;

    diagnostics.log_summary();
    diagnostics
        .save(&config.paths.data.join(DIAGNOSTICS_FILE_NAME))
        .map_err(|e| e.in_stage("diagnostics"))?;

    Ok(PipelineOutput {
        train,
        test,
        artifact: scaled.artifact,
        artifact_path: scaled.artifact_path,
        preprocessed_path,
        diagnostics,
    })
}
