//! Dataset models, as returned by the admin dataset and text-pair endpoints.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator the backend expects between class names on upload
const CLASS_SEPARATOR: &str = ";";

/// A dataset with its label classes and completion percentage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub classes: Vec<String>,
    pub progress: f64,
}

/// One page of datasets plus the overall completion counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetPage {
    pub datasets: Vec<DatasetSummary>,
    pub completed_datasets: u64,
    pub not_completed_datasets: u64,
    pub unassigned_datasets: u64,
    pub total_elements: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
}

impl DatasetPage {
    pub fn has_next_page(&self) -> bool {
        self.current_page + 1 < self.total_pages
    }
}

/// A dataset with text-pair counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetDetails {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub classes: Vec<String>,
    pub progress: f64,
    #[serde(rename = "totalCoupeTextes")]
    pub total_text_pairs: u64,
    #[serde(rename = "numberOfAnnotatedCoupeTextes")]
    pub annotated_text_pairs: u64,
    #[serde(rename = "numberOfNotAnnotatedCoupeTextes")]
    pub pending_text_pairs: u64,
}

/// Two texts to be labelled together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextPair {
    pub id: i64,
    pub text1: String,
    pub text2: String,
    pub annotation_date: Option<NaiveDateTime>,
    pub annotated_class: Option<String>,
}

impl TextPair {
    pub fn is_annotated(&self) -> bool {
        self.annotated_class.is_some()
    }
}

/// An annotator working on a dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignedAnnotator {
    pub id: i64,
    pub prenom: Option<String>,
    pub nom: Option<String>,
    pub username: String,
    pub email: Option<String>,
    pub active: bool,
    pub task_count: u64,
    pub can_unassign: bool,
}

/// Who labelled a text pair, and with which class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotationDetails {
    pub id: Option<i64>,
    pub annotateur_id: Option<i64>,
    pub annotateur_username: Option<String>,
    pub classe_choisie_id: Option<i64>,
    pub classe_choisie_nom: Option<String>,
    pub annotated_at: Option<NaiveDateTime>,
}

/// One page of a dataset's text pairs with the annotators assigned to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextPairPage {
    #[serde(rename = "coupeTextes")]
    pub text_pairs: Vec<TextPair>,
    pub annotated: bool,
    pub annotation_details: Option<AnnotationDetails>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
    pub annotators: Vec<AssignedAnnotator>,
}

/// Body of the assign call. The deadline travels as an RFC 3339 UTC timestamp.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    pub dataset_id: i64,
    pub annotator_ids: Vec<i64>,
    pub deadline: Option<DateTime<Utc>>,
}

/// A dataset to upload: metadata plus the raw file.
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub name: String,
    pub description: String,
    pub classes: Vec<String>,
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl NewDataset {
    /// Class names as the single form field the backend splits on `;`.
    /// Blank names are dropped.
    pub fn classes_field(&self) -> String {
        self.classes
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(CLASS_SEPARATOR)
    }
}
