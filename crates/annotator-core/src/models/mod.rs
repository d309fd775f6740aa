//! Data models for the annotation backend's REST resources.
//!
//! - `DatasetSummary`, `DatasetPage`, `DatasetDetails`: datasets and their progress
//! - `TextPairPage`, `TextPair`, `AssignedAnnotator`: the text pairs of a dataset
//! - `Annotator`, `AnnotatorRequest`: annotator accounts managed by admins
//! - `DatasetTaskSummary`, `TaskGroup`: an annotator's assigned work
//! - `Statistics`: the admin dashboard figures

pub mod annotator;
pub mod dataset;
pub mod statistics;
pub mod task;

pub use annotator::{Annotator, AnnotatorRequest};
pub use dataset::{
    AnnotationDetails, AssignedAnnotator, AssignmentRequest, DatasetDetails, DatasetPage,
    DatasetSummary, NewDataset, TextPair, TextPairPage,
};
pub use statistics::{ActivityItem, AnnotationTrend, DatasetProgress, StatItem, Statistics, TopAnnotator};
pub use task::{AnnotationClass, DatasetTaskSummary, TaskGroup, TaskItem, TaskRef};
