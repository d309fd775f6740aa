//! Figures behind the admin dashboard.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Statistics {
    pub stats: Vec<StatItem>,
    pub activities: Vec<ActivityItem>,
    pub datasets_progress: Vec<DatasetProgress>,
    pub top_annotators: Vec<TopAnnotator>,
    pub annotation_trend: Vec<AnnotationTrend>,
}

/// A headline figure, already formatted by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatItem {
    pub title: String,
    pub value: String,
    pub change: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityItem {
    pub message: String,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetProgress {
    pub name: String,
    pub completed: u64,
    pub pending: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopAnnotator {
    pub name: String,
    /// Percentage of assigned pairs completed
    pub completion: u32,
}

/// Annotations made on one day (`YYYY-MM-DD`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationTrend {
    pub date: String,
    pub count: u64,
}
