//! Typed view of the login payload returned by `/auth/login`.
//!
//! The backend sends the user profile and the bearer token in one object.
//! Fields the client relies on are typed; everything else is carried along
//! untouched so the persisted copy matches what the backend sent.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Annotator,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "ADMIN",
            Role::Annotator => "ANNOTATOR",
            Role::Other(name) => name,
        }
    }

    /// Landing page for the role
    pub fn default_route(&self) -> &'static str {
        match self {
            Role::Admin => "/dashboard",
            _ => "/dashboard-user",
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ADMIN" => Role::Admin,
            "ANNOTATOR" => Role::Annotator,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("login payload is not a JSON object")]
    NotAnObject,

    #[error("login payload has an invalid shape: {0}")]
    Shape(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LoginPayload {
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prenom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub role: Option<Role>,
    #[serde(default)]
    pub token: String,
    /// Backend fields this client does not interpret
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

impl LoginPayload {
    /// Validate an untyped payload received from the backend.
    pub fn from_value(value: Value) -> Result<Self, ProfileError> {
        if !value.is_object() {
            warn!("Rejecting login payload that is not an object");
            return Err(ProfileError::NotAnObject);
        }
        serde_json::from_value(value).map_err(|e| {
            warn!(error = %e, "Rejecting login payload with unexpected shape");
            ProfileError::Shape(e)
        })
    }

    /// "Prenom Nom" when both are known, otherwise the username
    pub fn display_name(&self) -> String {
        match (self.prenom.as_deref(), self.nom.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{} {}", first, last)
            }
            _ => self.username.clone(),
        }
    }
}
