//! API client for communicating with the annotation backend.
//!
//! Requests are prepared and checked the way the session store requires:
//! `authorize` attaches the bearer token (ending the session if it has
//! expired) and `check_response` turns a 401 into a logout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Method, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{LoginPayload, LogoutNotifier, SessionStore};
use crate::config::Config;
use crate::models::{
    Annotator, AnnotatorRequest, AssignmentRequest, DatasetDetails, DatasetPage, DatasetSummary,
    DatasetTaskSummary, NewDataset, Statistics, TaskGroup, TextPairPage,
};

use super::ApiError;

const LOGIN_ENDPOINT: &str = "auth/login";
const LOGOUT_ENDPOINT: &str = "auth/logout";
const FORGOT_PASSWORD_ENDPOINT: &str = "auth/forgot-password";
const DATASETS_ENDPOINT: &str = "admin/datasets";
const TEXT_PAIRS_ENDPOINT: &str = "admin/coupe-textes/dataset";
const ANNOTATORS_ENDPOINT: &str = "admin/annotators";
const TASKS_ENDPOINT: &str = "tasks";
const STATISTICS_ENDPOINT: &str = "admin/statistics";

/// Envelope every backend response is wrapped in
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// The payload, or the backend's message when there is none
    pub fn into_data(self) -> Result<T, ApiError> {
        self.data.ok_or_else(|| {
            ApiError::InvalidResponse(
                self.message
                    .unwrap_or_else(|| "response has no data".to_string()),
            )
        })
    }
}

impl ApiResponse<Value> {
    /// Human-readable outcome: the message, or a string payload
    pub fn into_message(self) -> String {
        match (self.message, self.data) {
            (Some(message), _) => message,
            (None, Some(Value::String(data))) => data,
            _ => String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

/// API client for the annotation backend.
/// Clone is cheap - reqwest::Client and the session are both shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self> {
        let base = Url::parse(&config.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", config.api_base_url))?;
        if base.scheme() != "https" && !is_loopback(&base) {
            warn!(url = %base, "API base URL is not https; session credentials will travel in clear text");
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Request interceptor: attach the session token, if it is still valid
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Response interceptor: a 401 ends the session wherever it came from
    async fn check_response(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.session.handle_unauthorized();
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_response(status, &body))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await?;
        let response = self.check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Send and unwrap the response envelope
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.send::<ApiResponse<T>>(request).await?.into_data()
    }

    /// Send and keep only the envelope's message
    async fn fetch_message(&self, request: RequestBuilder) -> Result<String, ApiError> {
        Ok(self.send::<ApiResponse<Value>>(request).await?.into_message())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "API request");
        self.client.request(method, url)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(self.request(Method::DELETE, path)).await
    }

    /// Log in and store the session.
    ///
    /// Returns whether the session is now authenticated. A backend payload
    /// carrying an expired or malformed token yields `Ok(false)`.
    pub async fn login(&self, username: &str, password: &str) -> Result<bool, ApiError> {
        let response: ApiResponse<Value> = self
            .post(LOGIN_ENDPOINT, &LoginRequest { username, password })
            .await?;
        let data = response.into_data()?;

        let payload = LoginPayload::from_value(data)?;
        self.session.set_session(payload);
        let authenticated = self.session.is_authenticated();
        info!(username, authenticated, "Login completed");
        Ok(authenticated)
    }

    /// End the session: tell the backend, then clear locally regardless
    pub async fn logout(&self) {
        self.session.logout(self).await;
    }

    /// Ask the backend to reset the password for `email`; returns its message
    pub async fn forgot_password(&self, email: &str) -> Result<String, ApiError> {
        let request = self
            .request(Method::POST, FORGOT_PASSWORD_ENDPOINT)
            .json(&ForgotPasswordRequest { email });
        self.fetch_message(request).await
    }

    // ===== Datasets =====

    pub async fn list_datasets(&self, page: u32, size: u32) -> Result<DatasetPage, ApiError> {
        let request = self
            .request(Method::GET, DATASETS_ENDPOINT)
            .query(&[("page", page), ("size", size)]);
        self.fetch(request).await
    }

    pub async fn get_dataset(&self, id: i64) -> Result<DatasetSummary, ApiError> {
        self.fetch(self.request(Method::GET, &format!("{DATASETS_ENDPOINT}/{id}")))
            .await
    }

    pub async fn dataset_details(&self, id: i64) -> Result<DatasetDetails, ApiError> {
        self.fetch(self.request(Method::GET, &format!("{DATASETS_ENDPOINT}/{id}/details")))
            .await
    }

    /// One page of a dataset's text pairs and its assigned annotators
    pub async fn text_pairs(
        &self,
        dataset_id: i64,
        page: u32,
        size: u32,
    ) -> Result<TextPairPage, ApiError> {
        let request = self
            .request(Method::GET, &format!("{TEXT_PAIRS_ENDPOINT}/{dataset_id}"))
            .query(&[("page", page), ("size", size)]);
        self.fetch(request).await
    }

    /// Export a dataset with its annotations as CSV
    pub async fn download_dataset(&self, id: i64) -> Result<Vec<u8>, ApiError> {
        let request = self
            .request(Method::GET, &format!("{DATASETS_ENDPOINT}/{id}/download"))
            .header(header::ACCEPT, "*/*");
        let response = self.authorize(request).send().await?;
        let response = self.check_response(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Upload a new dataset file as a multipart form
    pub async fn create_dataset(&self, dataset: NewDataset) -> Result<DatasetSummary, ApiError> {
        let classes = dataset.classes_field();
        let file = Part::bytes(dataset.contents).file_name(dataset.file_name);
        let form = Form::new()
            .text("name", dataset.name)
            .text("description", dataset.description)
            .text("classes", classes)
            .part("file", file);
        self.fetch(self.request(Method::POST, DATASETS_ENDPOINT).multipart(form))
            .await
    }

    pub async fn available_annotators(&self, dataset_id: i64) -> Result<Vec<Annotator>, ApiError> {
        let path = format!("{DATASETS_ENDPOINT}/{dataset_id}/available-annotators");
        self.fetch(self.request(Method::GET, &path)).await
    }

    /// Create tasks for the given annotators on a dataset. Returns the
    /// backend's confirmation message.
    pub async fn assign_annotators(
        &self,
        dataset_id: i64,
        annotator_ids: &[i64],
        deadline: Option<DateTime<Utc>>,
    ) -> Result<String, ApiError> {
        let body = AssignmentRequest {
            dataset_id,
            annotator_ids: annotator_ids.to_vec(),
            deadline,
        };
        let path = format!("{DATASETS_ENDPOINT}/{dataset_id}/assign");
        self.fetch_message(self.request(Method::POST, &path).json(&body))
            .await
    }

    /// Remove an annotator from a dataset. Completed annotations are kept.
    pub async fn unassign_annotator(
        &self,
        dataset_id: i64,
        annotator_id: i64,
    ) -> Result<String, ApiError> {
        let path = format!("{TEXT_PAIRS_ENDPOINT}/{dataset_id}/unassign/{annotator_id}");
        self.fetch_message(self.request(Method::POST, &path)).await
    }

    // ===== Annotators =====

    pub async fn list_annotators(&self) -> Result<Vec<Annotator>, ApiError> {
        self.fetch(self.request(Method::GET, ANNOTATORS_ENDPOINT)).await
    }

    pub async fn get_annotator(&self, id: i64) -> Result<Annotator, ApiError> {
        self.fetch(self.request(Method::GET, &format!("{ANNOTATORS_ENDPOINT}/{id}")))
            .await
    }

    pub async fn create_annotator(&self, annotator: &AnnotatorRequest) -> Result<Annotator, ApiError> {
        self.fetch(self.request(Method::POST, ANNOTATORS_ENDPOINT).json(annotator))
            .await
    }

    /// Update an account. A request without a role is sent as `ANNOTATOR`.
    pub async fn update_annotator(
        &self,
        id: i64,
        annotator: AnnotatorRequest,
    ) -> Result<Annotator, ApiError> {
        let body = annotator.with_default_role();
        let path = format!("{ANNOTATORS_ENDPOINT}/{id}");
        self.fetch(self.request(Method::PUT, &path).json(&body)).await
    }

    pub async fn delete_annotator(&self, id: i64) -> Result<String, ApiError> {
        let path = format!("{ANNOTATORS_ENDPOINT}/{id}");
        self.fetch_message(self.request(Method::DELETE, &path)).await
    }

    // ===== Tasks =====

    /// Per-dataset progress of an annotator
    pub async fn task_summary(&self, annotator_id: i64) -> Result<Vec<DatasetTaskSummary>, ApiError> {
        let path = format!("{TASKS_ENDPOINT}/annotator/{annotator_id}/summary");
        self.fetch(self.request(Method::GET, &path)).await
    }

    /// An annotator's task on a dataset. Without a page the backend picks
    /// the first unannotated pair.
    pub async fn annotator_task(
        &self,
        annotator_id: i64,
        dataset_id: i64,
        page: Option<u32>,
    ) -> Result<TaskGroup, ApiError> {
        let path = format!("{TASKS_ENDPOINT}/annotator/{annotator_id}");
        let mut request = self
            .request(Method::GET, &path)
            .query(&[("datasetId", dataset_id)]);
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }
        self.fetch(request).await
    }

    /// Record the class an annotator chose for a text pair
    pub async fn save_annotation(
        &self,
        annotator_id: i64,
        text_pair_id: i64,
        class_id: i64,
    ) -> Result<String, ApiError> {
        let request = self
            .request(Method::POST, &format!("{TASKS_ENDPOINT}/annotate"))
            .query(&[
                ("annotatorId", annotator_id),
                ("coupeTexteId", text_pair_id),
                ("classeChoisieId", class_id),
            ]);
        self.fetch_message(request).await
    }

    // ===== Statistics =====

    pub async fn statistics(&self) -> Result<Statistics, ApiError> {
        self.fetch(self.request(Method::GET, STATISTICS_ENDPOINT)).await
    }
}

impl LogoutNotifier for ApiClient {
    async fn notify_logout(&self) -> Result<()> {
        let mut request = self.client.post(self.url(LOGOUT_ENDPOINT));
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .context("Failed to send logout request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body).into());
        }
        Ok(())
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStore, RecordingNavigator};
    use crate::clock::SystemClock;

    fn client_for(base: &str) -> ApiClient {
        let clock = Arc::new(SystemClock);
        let session = Arc::new(SessionStore::new(
            Box::new(MemoryStore::new(clock.clone())),
            clock,
            Arc::new(RecordingNavigator::new()),
        ));
        let config = Config {
            api_base_url: base.to_string(),
            ..Config::default()
        };
        ApiClient::new(&config, session).expect("client")
    }

    #[test]
    fn test_url_joining() {
        let client = client_for("https://annotate.example.com/api/");
        assert_eq!(client.url("/auth/login"), "https://annotate.example.com/api/auth/login");
        assert_eq!(client.url("datasets"), "https://annotate.example.com/api/datasets");
    }

    #[test]
    fn test_invalid_base_url() {
        let clock = Arc::new(SystemClock);
        let session = Arc::new(SessionStore::new(
            Box::new(MemoryStore::new(clock.clone())),
            clock,
            Arc::new(RecordingNavigator::new()),
        ));
        let config = Config {
            api_base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(ApiClient::new(&config, session).is_err());
    }

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback(&Url::parse("http://localhost:8080/api").expect("url")));
        assert!(is_loopback(&Url::parse("http://127.0.0.1/api").expect("url")));
        assert!(is_loopback(&Url::parse("http://[::1]:8080/").expect("url")));
        assert!(!is_loopback(&Url::parse("http://annotate.example.com").expect("url")));
    }

    #[test]
    fn test_api_response_envelope() {
        let parsed: ApiResponse<Value> = serde_json::from_str(
            r#"{"success": true, "message": "Login successful", "data": {"id": 1}}"#,
        )
        .expect("parse");
        assert!(parsed.success);
        assert_eq!(parsed.message.as_deref(), Some("Login successful"));
        assert!(parsed.data.is_some());

        let empty: ApiResponse<Value> =
            serde_json::from_str(r#"{"message": "Logout successful", "data": null}"#).expect("parse");
        assert!(!empty.success);
        assert!(empty.data.is_none());
    }

    #[test]
    fn test_envelope_unwrapping() {
        let missing: ApiResponse<Value> =
            serde_json::from_str(r#"{"success": false, "message": "Dataset not found", "data": null}"#)
                .expect("parse");
        assert!(matches!(
            missing.into_data(),
            Err(ApiError::InvalidResponse(ref msg)) if msg == "Dataset not found"
        ));

        let string_data: ApiResponse<Value> =
            serde_json::from_str(r#"{"success": true, "data": "Annotation saved"}"#).expect("parse");
        assert_eq!(string_data.into_message(), "Annotation saved");

        let both: ApiResponse<Value> =
            serde_json::from_str(r#"{"success": true, "message": "Assigned", "data": "ignored"}"#)
                .expect("parse");
        assert_eq!(both.into_message(), "Assigned");
    }
}
