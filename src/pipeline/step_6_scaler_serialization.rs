// External imports
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// Internal imports
use super::step_4_data_scaling::{ScalerArtifact, ScalingMethod};
use crate::built_info;
use crate::constants::SCALER_FILE_SUFFIX;
use crate::error::PipelineResult;

/// Human-readable description stored next to the binary scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerMetadata {
    pub method: ScalingMethod,
    pub feature_names: Vec<String>,
    pub feature_range: Option<[f64; 2]>,
    pub version: String,
    pub created_at: String,
}

impl ScalerMetadata {
    pub fn new(artifact: &ScalerArtifact) -> Self {
        Self {
            method: artifact.method,
            feature_names: artifact.feature_names.clone(),
            feature_range: artifact.feature_range,
            version: built_info::PKG_VERSION.to_string(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Location of the scaler for a method inside a model directory
pub fn scaler_path(model_dir: &Path, method: ScalingMethod) -> PathBuf {
    model_dir
        .join(format!("{}{}", method.name(), SCALER_FILE_SUFFIX))
        .with_extension("bin")
}

/// Save a fitted scaler to disk
///
/// Writes `<method>_scaler.bin` and `<method>_scaler.meta.json` into
/// `model_dir`, replacing any previous files.
///
/// # Returns
///
/// Path of the binary scaler file
pub fn save_scaler(artifact: &ScalerArtifact, model_dir: &Path) -> PipelineResult<PathBuf> {
    fs::create_dir_all(model_dir)?;

    let path = scaler_path(model_dir, artifact.method);
    let bytes = bincode::serde::encode_to_vec(artifact, bincode::config::standard())?;
    fs::write(&path, bytes)?;

    let metadata_json = serde_json::to_string_pretty(&ScalerMetadata::new(artifact))?;
    fs::write(path.with_extension("meta.json"), metadata_json)?;

    info!("Scaler saved to: {}", path.display());
    Ok(path)
}

/// Load a fitted scaler for reuse at inference time
pub fn load_scaler<P: AsRef<Path>>(path: P) -> PipelineResult<ScalerArtifact> {
    let bytes = fs::read(path.as_ref())?;
    let (artifact, _) =
        bincode::serde::decode_from_slice::<ScalerArtifact, _>(&bytes, bincode::config::standard())?;
    Ok(artifact)
}

/// Load the metadata sidecar written by [`save_scaler`]
pub fn load_scaler_metadata<P: AsRef<Path>>(path: P) -> PipelineResult<ScalerMetadata> {
    let json = fs::read_to_string(path.as_ref().with_extension("meta.json"))?;
    Ok(serde_json::from_str(&json)?)
}
