use serde::{Deserialize, Serialize};

/// Role a numeric column plays in the price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureRole {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl FeatureRole {
    /// Feature order used by every frame the pipeline produces.
    pub const ALL: [FeatureRole; 5] = [
        FeatureRole::Open,
        FeatureRole::High,
        FeatureRole::Low,
        FeatureRole::Close,
        FeatureRole::Volume,
    ];
}

/// Mapping from column role to the column name used in the input file.
///
/// Built once from the configuration and passed into the pipeline so stages
/// look columns up by role instead of by repeated string literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub date: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    /// Name of the label column added by the labeling stage
    #[serde(rename = "labels", default = "default_label_name")]
    pub label: String,
}

fn default_label_name() -> String {
    "labels".to_string()
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            open: "open".to_string(),
            high: "high".to_string(),
            low: "low".to_string(),
            close: "close".to_string(),
            volume: "volume".to_string(),
            label: default_label_name(),
        }
    }
}

impl ColumnSchema {
    pub fn name(&self, role: FeatureRole) -> &str {
        match role {
            FeatureRole::Open => &self.open,
            FeatureRole::High => &self.high,
            FeatureRole::Low => &self.low,
            FeatureRole::Close => &self.close,
            FeatureRole::Volume => &self.volume,
        }
    }

    /// Numeric feature column names, in `FeatureRole::ALL` order.
    pub fn feature_names(&self) -> Vec<&str> {
        FeatureRole::ALL.iter().map(|&role| self.name(role)).collect()
    }

    /// Columns kept from the raw input: the date column followed by the features.
    pub fn retained_columns(&self) -> Vec<&str> {
        let mut columns = vec![self.date.as_str()];
        columns.extend(self.feature_names());
        columns
    }

    /// Every configured name, label included.
    pub fn all_names(&self) -> Vec<&str> {
        let mut names = self.retained_columns();
        names.push(self.label.as_str());
        names
    }
}
