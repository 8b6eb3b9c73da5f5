use polars::error::PolarsError;
use thiserror::Error;

/// All pipeline errors, grouped by the stage of the taxonomy they belong to.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Configuration ──
    #[error("Invalid fill method '{0}': expected 'linear' or 'polynomial'")]
    InvalidFillMethod(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Failed to read configuration from {path}: {message}")]
    ConfigRead { path: String, message: String },

    // ── Input ──
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Required column '{0}' not found")]
    MissingColumn(String),

    // ── Type ──
    #[error("Column '{column}' row {row}: cannot convert '{value}'")]
    TypeConversion {
        column: String,
        row: usize,
        value: String,
    },

    // ── Structural ──
    #[error("No rows left after {stage}")]
    EmptySeries { stage: &'static str },

    #[error("The {partition} partition would be empty")]
    EmptyPartition { partition: &'static str },

    #[error("Partition rows out of step: index {index}, features {features}, labels {labels}")]
    MisalignedPartition {
        index: usize,
        features: usize,
        labels: usize,
    },

    #[error("Price change undefined at row {row}: previous close is zero")]
    UndefinedPriceChange { row: usize },

    // ── Plumbing ──
    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Attaches the name of the stage that raised the error.
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            already @ PipelineError::Stage { .. } => already,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, stripped of stage context.
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Serialization(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for PipelineError {
    fn from(e: bincode::error::EncodeError) -> Self {
        PipelineError::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for PipelineError {
    fn from(e: bincode::error::DecodeError) -> Self {
        PipelineError::Serialization(e.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
