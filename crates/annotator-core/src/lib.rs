//! Core library for the annotation platform client.
//!
//! This crate provides:
//! - `auth`: the session store, token decoding, durable key-value storage and
//!   the role-based route guard
//! - `api`: the REST client that attaches credentials to outgoing requests and
//!   clears the session on authentication rejections
//! - `models`: typed views of the backend's dataset, annotator, task and
//!   statistics resources
//! - `config`: configuration loading with environment overrides
//! - `clock`: wall-clock abstraction so expiry can be tested deterministically

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{LoginPayload, Role, SessionState, SessionStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
