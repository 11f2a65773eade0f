use crate::domain::model::{RejectedRow, UploadReport};
use crate::utils::error::UploadError;
use serde::Serialize;

/// Body returned with `201 Created` once the accepted rows are persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub token: Option<String>,
    pub authenticated: bool,
    pub message: String,
    pub rejected: bool,
    pub rejected_rows: Vec<RejectedRow>,
}

impl From<UploadReport> for UploadResponse {
    fn from(report: UploadReport) -> Self {
        Self {
            token: None,
            authenticated: true,
            message: report.message(),
            rejected: report.rejected,
            rejected_rows: report.rejected_rows,
        }
    }
}

/// Body of the auth-root probe and of requests that carry nothing to process.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub token: Option<String>,
    pub authenticated: bool,
    pub message: String,
}

impl StatusResponse {
    pub fn probe(authenticated: bool) -> Self {
        let message = if authenticated {
            "Authenticated"
        } else {
            "Not authenticated"
        };
        Self {
            token: None,
            authenticated,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub token: Option<String>,
    pub authenticated: bool,
    pub status: u16,
    pub message: String,
    pub error: String,
    pub suggestion: String,
}

impl From<&UploadError> for ErrorResponse {
    fn from(err: &UploadError) -> Self {
        Self {
            token: None,
            authenticated: true,
            status: err.status_code().as_u16(),
            message: err.user_friendly_message(),
            error: err.to_string(),
            suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
