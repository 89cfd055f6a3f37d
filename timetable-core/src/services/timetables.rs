//! Timetable generation, views, edits, PDF downloads and email delivery.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use super::{call_json, log_failure, ServiceError};
use crate::http::{ApiClient, ApiRequest};

const GENERATE: &str = "/timetables/admin/generate-timetable";
const GET: &str = "/timetables/admin/get-timetable";
const EDIT: &str = "/timetables/admin/edit-timetable";
const DOWNLOAD: &str = "/timetables/admin/download-timetable";
const SEND: &str = "/timetables/admin/send-timetable";
const SEND_TO_ALL: &str = "/timetables/admin/send-timetable-to-all";
const STUDENT_VIEW: &str = "/timetables/student/view-timetable";
const STUDENT_DOWNLOAD: &str = "/timetables/student/download-timetable";

pub const ADMIN_PDF_FILENAME: &str = "admin-timetable.pdf";
pub const STUDENT_PDF_FILENAME: &str = "student-timetable.pdf";

const GENERIC_FAILURE: &str = "Something went wrong";
const DOWNLOAD_FAILURE: &str = "Failed to download timetable PDF.";

/// Optional filters; unset fields are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableQuery {
    pub department: Option<String>,
    pub semester: Option<String>,
    pub shift: Option<String>,
}

impl TimetableQuery {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        [
            ("department", &self.department),
            ("semester", &self.semester),
            ("shift", &self.shift),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
    }
}

/// A downloaded PDF and the filename to save it under.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfDownload {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl PdfDownload {
    /// Write the file into `dir`, returning its path.
    pub fn save_in(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

pub struct TimetableService<'a> {
    client: &'a ApiClient,
}

impl<'a> TimetableService<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Ask the backend to build a timetable from `data`.
    pub async fn generate(&self, data: JsonValue) -> Result<JsonValue, ServiceError> {
        let request = ApiRequest::post(GENERATE).with_json(data);
        call_json(self.client, request, "generate_timetable", "Failed to generate timetable.").await
    }

    pub async fn get(&self, query: &TimetableQuery) -> Result<JsonValue, ServiceError> {
        let request = ApiRequest::get(GET).with_query(query.to_pairs());
        call_json(self.client, request, "get_timetable", GENERIC_FAILURE).await
    }

    pub async fn edit_entry(&self, entry_id: &str, data: JsonValue) -> Result<JsonValue, ServiceError> {
        let request = ApiRequest::patch(format!("{EDIT}/{entry_id}")).with_json(data);
        call_json(self.client, request, "edit_timetable_entry", "Failed to edit timetable entry.").await
    }

    /// Admin PDF export, filtered like [`Self::get`].
    pub async fn download_pdf(&self, query: &TimetableQuery) -> Result<PdfDownload, ServiceError> {
        self.download(DOWNLOAD, query, ADMIN_PDF_FILENAME).await
    }

    /// Email the timetable to one student.
    pub async fn send_email(&self, payload: JsonValue) -> Result<JsonValue, ServiceError> {
        let request = ApiRequest::post(SEND).with_json(payload);
        call_json(self.client, request, "send_timetable", "Failed to send timetable email.").await
    }

    /// Email every student their timetable.
    pub async fn send_to_all(&self) -> Result<JsonValue, ServiceError> {
        call_json(
            self.client,
            ApiRequest::post(SEND_TO_ALL),
            "send_timetable_to_all",
            "Failed to send timetable to all students.",
        )
        .await
    }

    /// Timetable of the logged-in student.
    pub async fn student_view(&self, query: &TimetableQuery) -> Result<JsonValue, ServiceError> {
        let request = ApiRequest::get(STUDENT_VIEW).with_query(query.to_pairs());
        call_json(self.client, request, "get_student_timetable", GENERIC_FAILURE).await
    }

    pub async fn student_download_pdf(&self, query: &TimetableQuery) -> Result<PdfDownload, ServiceError> {
        self.download(STUDENT_DOWNLOAD, query, STUDENT_PDF_FILENAME).await
    }

    async fn download(
        &self,
        path: &str,
        query: &TimetableQuery,
        filename: &str,
    ) -> Result<PdfDownload, ServiceError> {
        let request = ApiRequest::get(path).with_query(query.to_pairs());
        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| log_failure("download_timetable", ServiceError::from_api(e, DOWNLOAD_FAILURE)))?;

        let bytes = response.into_body();
        info!(bytes = bytes.len(), filename, "Timetable PDF downloaded");
        Ok(PdfDownload {
            bytes,
            filename: filename.to_string(),
        })
    }
}
