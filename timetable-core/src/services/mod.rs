//! Endpoint wrappers over [`ApiClient`](crate::http::ApiClient).
//!
//! This module provides:
//! - `UserService` - registration, login, profile and logout
//! - `ResourceService` - CRUD for courses, instructors and rooms
//! - `TimetableService` - generation, filtered views, edits, PDFs and email

mod resources;
mod timetables;
mod users;

pub use resources::{Resource, ResourceService};
pub use timetables::{PdfDownload, TimetableQuery, TimetableService};
pub use users::{AuthSession, LoginRequest, RegisterRequest, UserService};

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::error;

use crate::http::{ApiClient, ApiError, ApiRequest};

/// A failed service call, carrying the message to show the user.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ServiceError {
    message: String,
    #[source]
    source: Option<ApiError>,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// The backend's message when it sent one, else `fallback`.
    pub fn from_api(err: ApiError, fallback: &str) -> Self {
        let message = err.server_message().unwrap_or_else(|| fallback.to_string());
        Self {
            message,
            source: Some(err),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn api_error(&self) -> Option<&ApiError> {
        self.source.as_ref()
    }

    /// The session could not be refreshed; the user has to log in again.
    pub fn requires_login(&self) -> bool {
        self.source.as_ref().is_some_and(ApiError::requires_login)
    }
}

/// Send a request and parse its JSON body, mapping failures to `fallback`.
pub(crate) async fn call_json(
    client: &ApiClient,
    request: ApiRequest,
    operation: &str,
    fallback: &str,
) -> Result<JsonValue, ServiceError> {
    let response = client
        .send(request)
        .await
        .map_err(|e| log_failure(operation, ServiceError::from_api(e, fallback)))?;

    if response.body().is_empty() {
        return Ok(JsonValue::Null);
    }
    response.json().map_err(|e| {
        log_failure(
            operation,
            ServiceError::new(format!("{fallback} Invalid response: {e}")),
        )
    })
}

pub(crate) fn log_failure(operation: &str, err: ServiceError) -> ServiceError {
    error!(operation, error = %err, "API call failed");
    err
}
