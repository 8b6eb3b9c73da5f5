// Data splitting
pub const TEST_SPLIT_RATIO: f64 = 0.3; // last 30% of rows go to the test partition

// Label codes
pub const SELL: i64 = 0;
pub const BUY: i64 = 1;
pub const HOLD: i64 = 2;
pub const NUM_CLASSES: usize = 3;

// Output file names
pub const PREPROCESSED_FILE_NAME: &str = "preprocessed_data.csv";
pub const DIAGNOSTICS_FILE_NAME: &str = "diagnostics.json";
pub const SUMMARY_FILE_NAME: &str = "summary.json";
pub const SCALER_FILE_SUFFIX: &str = "_scaler";

// Defaults
pub const DEFAULT_DELIMITER: char = ',';
pub const DEFAULT_POLY_ORDER: usize = 2;
pub const DEFAULT_MINMAX_RANGE: [f64; 2] = [0.0, 1.0];
