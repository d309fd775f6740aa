//! Annotator accounts, as managed through the admin endpoints.

use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// An annotator account.
///
/// `password` is only filled when the backend has just generated one, on
/// creation or when a regeneration was requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Annotator {
    pub id: i64,
    pub prenom: Option<String>,
    pub nom: Option<String>,
    pub username: String,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub active: bool,
    #[serde(alias = "temporaryPassword")]
    pub password: Option<String>,
    pub task_count: Option<u64>,
}

impl Annotator {
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.prenom.as_deref(), self.nom.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Body of the create and update calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatorRequest {
    pub prenom: String,
    pub nom: String,
    pub username: String,
    pub email: String,
    pub role: Option<Role>,
    pub active: bool,
    pub regenerate_password: bool,
}

impl AnnotatorRequest {
    /// The request with a missing role filled in as `ANNOTATOR`
    pub fn with_default_role(mut self) -> Self {
        self.role.get_or_insert(Role::Annotator);
        self
    }
}
