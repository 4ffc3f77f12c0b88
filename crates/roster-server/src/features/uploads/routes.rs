//! Upload API routes
//!
//! - `POST /api/v1/uploads` - Submit a spreadsheet (multipart form, `file` field)
//! - `GET /api/v1/uploads` - Paginated upload job history
//! - `GET /api/v1/uploads/:id` - Job status and progress
//! - `GET /api/v1/uploads/:id/errors` - Per-row errors for a job

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::features::FeatureState;

use super::commands::{UploadSpreadsheetCommand, UploadSpreadsheetError};
use super::queries::{
    GetUploadJobError, GetUploadJobQuery, ListUploadErrorsError, ListUploadErrorsQuery,
    ListUploadJobsError, ListUploadJobsQuery,
};

pub fn uploads_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", post(upload_spreadsheet))
        .route("/", get(list_upload_jobs))
        .route("/:id", get(get_upload_job))
        .route("/:id/errors", get(list_upload_errors))
}

#[tracing::instrument(skip(state, multipart))]
async fn upload_spreadsheet(
    State(state): State<FeatureState>,
    mut multipart: Multipart,
) -> Result<Response, UploadsApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut created_by: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadsApiError::Multipart(e.to_string()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload.xlsx".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| UploadsApiError::Multipart(e.to_string()))?;
                file = Some((filename, data.to_vec()));
            },
            Some("created_by") => {
                created_by = field.text().await.ok();
            },
            _ => {},
        }
    }

    let (filename, data) = file.ok_or(UploadsApiError::MissingFile)?;

    let command = UploadSpreadsheetCommand {
        filename,
        data,
        created_by,
    };
    let response = super::commands::upload::handle(
        state.db,
        state.queue.clone(),
        state.uploads.clone(),
        command,
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state, query))]
async fn list_upload_jobs(
    State(state): State<FeatureState>,
    Query(query): Query<ListUploadJobsQuery>,
) -> Result<Response, UploadsApiError> {
    let page = super::queries::list_jobs::handle(state.db, query).await?;

    let meta = json!({ "pagination": page.pagination });
    Ok((StatusCode::OK, Json(ApiResponse::success_with_meta(page.items, meta)))
        .into_response())
}

#[tracing::instrument(skip(state), fields(job_id = id))]
async fn get_upload_job(
    State(state): State<FeatureState>,
    Path(id): Path<i32>,
) -> Result<Response, UploadsApiError> {
    let details = super::queries::get_job::handle(state.db, GetUploadJobQuery { id }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(details))).into_response())
}

#[tracing::instrument(skip(state, query), fields(job_id = id))]
async fn list_upload_errors(
    State(state): State<FeatureState>,
    Path(id): Path<i32>,
    Query(mut query): Query<ListUploadErrorsQuery>,
) -> Result<Response, UploadsApiError> {
    query.job_id = id;
    let page = super::queries::list_errors::handle(state.db, query).await?;

    let meta = json!({ "pagination": page.pagination });
    Ok((StatusCode::OK, Json(ApiResponse::success_with_meta(page.items, meta)))
        .into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Unified error type for upload API endpoints
#[derive(Debug)]
enum UploadsApiError {
    MissingFile,
    Multipart(String),
    Upload(UploadSpreadsheetError),
    GetJob(GetUploadJobError),
    ListJobs(ListUploadJobsError),
    ListErrors(ListUploadErrorsError),
}

impl From<UploadSpreadsheetError> for UploadsApiError {
    fn from(err: UploadSpreadsheetError) -> Self {
        Self::Upload(err)
    }
}

impl From<GetUploadJobError> for UploadsApiError {
    fn from(err: GetUploadJobError) -> Self {
        Self::GetJob(err)
    }
}

impl From<ListUploadJobsError> for UploadsApiError {
    fn from(err: ListUploadJobsError) -> Self {
        Self::ListJobs(err)
    }
}

impl From<ListUploadErrorsError> for UploadsApiError {
    fn from(err: ListUploadErrorsError) -> Self {
        Self::ListErrors(err)
    }
}

impl UploadsApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            UploadsApiError::MissingFile
            | UploadsApiError::Multipart(_)
            | UploadsApiError::Upload(UploadSpreadsheetError::EmptyFile)
            | UploadsApiError::Upload(UploadSpreadsheetError::UnsupportedFileType(_))
            | UploadsApiError::ListJobs(ListUploadJobsError::InvalidPagination(_))
            | UploadsApiError::ListErrors(ListUploadErrorsError::InvalidPagination(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            },

            UploadsApiError::Upload(UploadSpreadsheetError::FileTooLarge) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE")
            },

            UploadsApiError::GetJob(GetUploadJobError::NotFound(_))
            | UploadsApiError::ListErrors(ListUploadErrorsError::JobNotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            },

            UploadsApiError::Upload(UploadSpreadsheetError::Io(_))
            | UploadsApiError::Upload(UploadSpreadsheetError::Database(_))
            | UploadsApiError::Upload(UploadSpreadsheetError::Queue(_))
            | UploadsApiError::GetJob(GetUploadJobError::Database(_))
            | UploadsApiError::ListJobs(ListUploadJobsError::Database(_))
            | UploadsApiError::ListErrors(ListUploadErrorsError::Database(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            },
        }
    }
}

impl IntoResponse for UploadsApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Upload API error: {}", self);
            "Upload could not be processed".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

impl std::fmt::Display for UploadsApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFile => write!(f, "Multipart field 'file' is required"),
            Self::Multipart(msg) => write!(f, "Malformed multipart request: {}", msg),
            Self::Upload(e) => write!(f, "{}", e),
            Self::GetJob(e) => write!(f, "{}", e),
            Self::ListJobs(e) => write!(f, "{}", e),
            Self::ListErrors(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_400() {
        assert_eq!(
            UploadsApiError::MissingFile.classify(),
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        );
    }

    #[test]
    fn test_oversize_maps_to_413() {
        let err = UploadsApiError::Upload(UploadSpreadsheetError::FileTooLarge);
        assert_eq!(err.classify().0, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_routes_structure() {
        let router = uploads_routes();
        assert!(format!("{:?}", router).contains("Router"));
    }
}
