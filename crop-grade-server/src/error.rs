use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Errors a client can see. Model failures never end up here.
#[derive(Debug)]
pub enum ApiError {
    /// No `file` field in the form, or no readable form at all
    NoFile,
    /// The `file` field was present but could not be read
    BadUpload(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NoFile => (StatusCode::BAD_REQUEST, "No file uploaded".to_owned()),
            ApiError::BadUpload(detail) => (
                StatusCode::BAD_REQUEST,
                format!("Could not read upload: {}", detail),
            ),
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
