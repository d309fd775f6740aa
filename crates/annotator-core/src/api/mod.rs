//! REST API client module for the annotation backend.
//!
//! This module provides the `ApiClient` for communicating with the backend.
//! Every request passes through the session store: the bearer token is
//! attached on the way out and a 401 on the way back ends the session.

pub mod client;
pub mod error;

pub use client::{ApiClient, ApiResponse};
pub use error::ApiError;
