// External imports
use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};

// Internal imports
use crate::util::config::{
    DataEngineering, ModelSection, OutputPaths, PipelineConfig, ScalingSection,
};
use crate::util::schema::ColumnSchema;

/// Ten raw daily rows: 2024-01-05 appears twice and the 2024-01-03 close is empty
pub const SCENARIO_CSV: &str = "\
date,open,high,low,close,volume,symbol
2024-01-01,99.5,100.5,99.0,100.0,1000,AAPL
2024-01-02,100.0,101.5,99.5,101.0,1100,AAPL
2024-01-03,101.0,102.0,100.5,,1200,AAPL
2024-01-04,101.5,102.5,101.0,102.0,1300,AAPL
2024-01-05,102.0,103.5,101.5,103.0,1400,AAPL
2024-01-05,102.0,104.0,101.5,103.5,1450,AAPL
2024-01-06,103.0,103.5,101.5,102.0,1500,AAPL
2024-01-07,102.0,104.5,101.5,104.0,1600,AAPL
2024-01-08,104.0,105.5,103.5,105.0,1700,AAPL
2024-01-09,105.0,105.5,103.0,104.0,1800,AAPL
";

/// Generate a random-walk OHLCV CSV with one row per minute
///
/// The same seed always produces the same text.
pub fn generate_ohlcv_csv(num_rows: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let base_date = NaiveDateTime::parse_from_str("2023-01-02 09:30:00", "%Y-%m-%d %H:%M:%S")
        .expect("valid base date");

    let mut text = String::from("date,open,high,low,close,volume\n");
    // Start with a base price around $100
    let mut current_price = 100.0 + rng.random::<f64>() * 50.0;

    for i in 0..num_rows {
        // Random price movement between -1% and +1%
        let movement = (rng.random::<f64>() * 2.0 - 1.0) * 0.01;
        current_price *= 1.0 + movement;

        let open = current_price * (1.0 + (rng.random::<f64>() * 0.01 - 0.005));
        let high = current_price.max(open) * (1.0 + rng.random::<f64>() * 0.005);
        let low = current_price.min(open) * (1.0 - rng.random::<f64>() * 0.005);
        let volume = rng.random_range(10_000..110_000);

        let timestamp = base_date + Duration::minutes(i as i64);
        text.push_str(&format!(
            "{},{:.4},{:.4},{:.4},{:.4},{}\n",
            timestamp.format("%Y-%m-%d %H:%M:%S"),
            open,
            high,
            low,
            current_price,
            volume
        ));
    }
    text
}

/// Writes `contents` to `dir/name` and returns the path
pub fn write_input_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write test input");
    path
}

/// Configuration rooted in `dir` with default column names
pub fn test_config(dir: &Path, data_link: PathBuf) -> PipelineConfig {
    PipelineConfig {
        data_link,
        delimiter: ',',
        paths: OutputPaths {
            data: dir.join("data"),
            models: dir.join("models"),
            exploration: dir.join("exploration"),
        },
        model: ModelSection {
            name: "test_model".to_string(),
        },
        columns: ColumnSchema::default(),
        data_engineering: DataEngineering {
            fill_method: "linear".to_string(),
            poly_order: 2,
        },
        label_tolerance: 0.01,
        scaling: ScalingSection {
            method: "standard".to_string(),
            minmax_range: [0.0, 1.0],
        },
        window_length: 3,
    }
}
