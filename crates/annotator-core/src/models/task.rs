//! An annotator's assigned work: per-dataset summaries and the paged task view.

use serde::{Deserialize, Serialize};

/// Progress of one annotator on one dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetTaskSummary {
    pub dataset_id: i64,
    pub dataset_name: String,
    pub description: Option<String>,
    pub tasks: Vec<TaskRef>,
    #[serde(rename = "totalCoupeTextes")]
    pub total_text_pairs: u64,
    /// `"<annotated>/<total>"`
    pub progress: String,
}

impl DatasetTaskSummary {
    /// Annotated and total counts, if `progress` is well formed
    pub fn progress_counts(&self) -> Option<(u64, u64)> {
        let (done, total) = self.progress.split_once('/')?;
        Some((done.trim().parse().ok()?, total.trim().parse().ok()?))
    }

    pub fn percent_complete(&self) -> f64 {
        match self.progress_counts() {
            Some((done, total)) if total > 0 => (done.min(total) as f64 / total as f64) * 100.0,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskRef {
    pub task_id: i64,
}

/// A label an annotator can choose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationClass {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "nomClasse", default)]
    pub name: String,
}

/// One text pair inside a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskItem {
    #[serde(rename = "coupeTexteId")]
    pub text_pair_id: i64,
    pub text1: String,
    pub text2: String,
    pub status: Option<String>,
    pub assigned_class: Option<String>,
}

impl TaskItem {
    pub fn is_annotated(&self) -> bool {
        self.assigned_class.is_some()
    }
}

/// The page of an annotator's task for one dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskGroup {
    pub task_id: Option<i64>,
    pub dataset_id: Option<i64>,
    pub dataset_name: String,
    pub classes: Vec<AnnotationClass>,
    pub tasks: Vec<TaskItem>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_tasks: u64,
}

impl TaskGroup {
    /// The text pair shown on this page
    pub fn current(&self) -> Option<&TaskItem> {
        self.tasks.first()
    }

    pub fn class_named(&self, name: &str) -> Option<&AnnotationClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page + 1 < self.total_pages
    }
}
