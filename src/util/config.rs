// External crates
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// Local modules
use crate::constants::{DEFAULT_DELIMITER, DEFAULT_MINMAX_RANGE, DEFAULT_POLY_ORDER};
use crate::error::{PipelineError, PipelineResult};
use crate::util::schema::ColumnSchema;

/// Output directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPaths {
    /// Processed (labeled, pre-split) data and diagnostics
    pub data: PathBuf,
    /// Root directory for fitted artifacts, namespaced by model name
    pub models: PathBuf,
    /// Exploration reports
    pub exploration: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEngineering {
    pub fill_method: String,
    #[serde(default = "default_poly_order")]
    pub poly_order: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingSection {
    pub method: String,
    #[serde(default = "default_minmax_range")]
    pub minmax_range: [f64; 2],
}

fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}

fn default_poly_order() -> usize {
    DEFAULT_POLY_ORDER
}

fn default_minmax_range() -> [f64; 2] {
    DEFAULT_MINMAX_RANGE
}

/// Missing-value imputation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMethod {
    Linear,
    Polynomial { order: usize },
}

impl FillMethod {
    pub fn from_config(name: &str, poly_order: usize) -> PipelineResult<Self> {
        match name {
            "linear" => Ok(FillMethod::Linear),
            "polynomial" => {
                if poly_order == 0 {
                    return Err(PipelineError::InvalidConfig {
                        key: "data_engineering.poly_order".to_string(),
                        reason: "polynomial fill needs an order of at least 1".to_string(),
                    });
                }
                Ok(FillMethod::Polynomial { order: poly_order })
            }
            other => Err(PipelineError::InvalidFillMethod(other.to_string())),
        }
    }
}

/// Complete pipeline configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raw delimited price file
    pub data_link: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    pub paths: OutputPaths,
    pub model: ModelSection,
    pub columns: ColumnSchema,
    pub data_engineering: DataEngineering,
    /// Minimum relative close-to-close change counted as a directional move
    pub label_tolerance: f64,
    pub scaling: ScalingSection,
    pub window_length: usize,
}

impl PipelineConfig {
    /// Reads, parses and validates a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let read_err = |message: String| PipelineError::ConfigRead {
            path: path.display().to_string(),
            message,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| read_err(e.to_string()))?;
        let config: PipelineConfig =
            serde_json::from_str(&raw).map_err(|e| read_err(e.to_string()))?;
        config.validate()?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Rejects values that would otherwise fail only after data has been processed
    pub fn validate(&self) -> PipelineResult<()> {
        self.fill_method()?;

        if !self.label_tolerance.is_finite() || self.label_tolerance < 0.0 {
            return Err(invalid(
                "label_tolerance",
                format!("must be a finite value >= 0, got {}", self.label_tolerance),
            ));
        }
        if !self.delimiter.is_ascii() {
            return Err(invalid("delimiter", "must be a single ASCII character".to_string()));
        }
        if self.window_length == 0 {
            return Err(invalid("window_length", "must be at least 1".to_string()));
        }
        let [lo, hi] = self.scaling.minmax_range;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(invalid(
                "scaling.minmax_range",
                format!("expected [min, max] with min < max, got [{}, {}]", lo, hi),
            ));
        }
        if self.model.name.trim().is_empty() {
            return Err(invalid("model.name", "must not be empty".to_string()));
        }

        let names = self.columns.all_names();
        let unique: HashSet<&str> = names.iter().copied().collect();
        if unique.len() != names.len() {
            return Err(invalid("columns", "column names must be distinct".to_string()));
        }
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(invalid("columns", "column names must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn fill_method(&self) -> PipelineResult<FillMethod> {
        FillMethod::from_config(
            &self.data_engineering.fill_method,
            self.data_engineering.poly_order,
        )
    }

    /// Directory holding the persisted scaler for this model
    pub fn model_dir(&self) -> PathBuf {
        self.paths.models.join(&self.model.name)
    }
}

fn invalid(key: &str, reason: String) -> PipelineError {
    PipelineError::InvalidConfig {
        key: key.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "data_link": "data/prices.csv",
        "paths": { "data": "out/data", "models": "out/models", "exploration": "out/exploration" },
        "model": { "name": "bilstm" },
        "columns": { "date": "date", "open": "open", "high": "high", "low": "low",
                     "close": "close", "volume": "volume", "labels": "labels" },
        "data_engineering": { "fill_method": "polynomial", "poly_order": 3 },
        "label_tolerance": 0.01,
        "scaling": { "method": "minmax", "minmax_range": [-1.0, 1.0] },
        "window_length": 30
    }"#;

    fn sample() -> PipelineConfig {
        serde_json::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parses_sample_with_defaults() {
        let config = sample();
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.fill_method().unwrap(), FillMethod::Polynomial { order: 3 });
        assert_eq!(config.model_dir(), PathBuf::from("out/models/bilstm"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_fill_method_is_rejected() {
        let mut config = sample();
        config.data_engineering.fill_method = "spline".to_string();
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidFillMethod(name)) if name == "spline"
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = sample();
        config.window_length = 0;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig { key, .. }) if key == "window_length"));

        let mut config = sample();
        config.label_tolerance = -0.5;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.scaling.minmax_range = [1.0, 1.0];
        assert!(config.validate().is_err());

        let mut config = sample();
        config.columns.close = "open".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_key_fails_on_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "data_link": "x.csv" }}"#).unwrap();
        let err = PipelineConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigRead { .. }));
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.scaling.minmax_range, [-1.0, 1.0]);
        assert_eq!(config.window_length, 30);
    }

    #[test]
    fn test_bundled_config_is_valid() {
        let config =
            PipelineConfig::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/pipeline.json"))
                .unwrap();
        assert_eq!(config.fill_method().unwrap(), FillMethod::Linear);
        assert_eq!(config.model_dir(), PathBuf::from("out/models/bilstm_v1"));
    }
}
