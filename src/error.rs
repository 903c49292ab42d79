use axum::{
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures that reach the user. Messages are shown verbatim.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("SRT content is too large. Maximum size is {}KB", .limit / 1024)]
    PayloadTooLarge { limit: usize },

    #[error("{0}")]
    BadRequest(String),

    #[error("Could not parse any valid entries from the SRT file. Please try a different file")]
    NoEntries,

    #[error("The SRT file has no subtitle timings, so the video length is unknown")]
    NoDurationBound,

    #[error("Failed to generate timestamps")]
    Generation(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NoEntries | AppError::NoDurationBound => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn from_json_rejection(rejection: JsonRejection, limit: usize) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge { limit };
        }
        tracing::debug!("rejected request body: {}", rejection.body_text());
        AppError::BadRequest("Invalid request body".to_string())
    }

    pub fn from_multipart(error: MultipartError, limit: usize) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge { limit };
        }
        tracing::debug!("rejected upload: {}", error.body_text());
        AppError::BadRequest("Invalid file upload".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Generation(err) = &self {
            tracing::error!("generation failed: {err:#}");
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
