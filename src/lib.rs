pub mod constants;
pub mod error;
pub mod pipeline;
pub mod util {
    pub mod config;
    pub mod exploration;
    pub mod file_utils;
    pub mod schema;
    #[cfg(test)]
    pub mod test_utils;
}

/// Build metadata generated by `build.rs`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub use error::{PipelineError, PipelineResult};
pub use pipeline::orchestrator::{run_pipeline, PipelineOutput};
pub use pipeline::step_5_sliding_window::WindowedDataset;
pub use util::config::PipelineConfig;
