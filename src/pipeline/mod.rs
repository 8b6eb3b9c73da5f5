/// Preparation pipeline from raw OHLCV rows to model-ready windows
///
/// * `step_1_data_cleaning` - Column selection, type parsing, imputation, ordering and de-duplication
/// * `step_2_label_creation` - SELL/BUY/HOLD labels from close-to-close changes
/// * `step_3_data_splitting` - Chronological train/test split
/// * `step_4_data_scaling` - Scaler fitted on train, applied to both partitions
/// * `step_5_sliding_window` - Fixed-length windows with right-aligned labels
/// * `step_6_scaler_serialization` - Scaler persistence for inference reuse
pub mod diagnostics;
pub mod orchestrator;
pub mod step_1_data_cleaning;
pub mod step_2_label_creation;
pub mod step_3_data_splitting;
pub mod step_4_data_scaling;
pub mod step_5_sliding_window;
pub mod step_6_scaler_serialization;
