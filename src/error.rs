use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnhanceError {
    #[error("Failed to initialize model service: {0}")]
    Initialization(String),

    #[error("Cannot load image: {0}")]
    ImageLoad(String),

    #[error("Pre-filter failed: {0}")]
    Preprocessing(String),

    #[error("{service} failed: {message}")]
    Service {
        service: &'static str,
        message: String,
    },

    #[error("Cannot save image: {0}")]
    Save(String),

    #[error("No image has been uploaded yet!")]
    NothingUploaded,

    #[error("No image has been upgraded yet!")]
    NothingToSave,

    #[error("Enhancement cancelled")]
    Cancelled,

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EnhanceError {
    pub fn service(service: &'static str, message: impl std::fmt::Display) -> Self {
        EnhanceError::Service {
            service,
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code used in HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            EnhanceError::Initialization(_) => "INIT_ERROR",
            EnhanceError::ImageLoad(_) => "IMAGE_LOAD_ERROR",
            EnhanceError::Preprocessing(_) => "PREPROCESSING_ERROR",
            EnhanceError::Service { .. } => "SERVICE_ERROR",
            EnhanceError::Save(_) => "SAVE_ERROR",
            EnhanceError::NothingUploaded => "NOTHING_UPLOADED",
            EnhanceError::NothingToSave => "NOTHING_TO_SAVE",
            EnhanceError::Cancelled => "CANCELLED",
            EnhanceError::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            EnhanceError::MissingFile => "MISSING_FILE",
            EnhanceError::InvalidRequest(_) => "INVALID_REQUEST",
            EnhanceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            EnhanceError::ImageLoad(_)
            | EnhanceError::MissingFile
            | EnhanceError::InvalidRequest(_)
            | EnhanceError::NothingUploaded
            | EnhanceError::NothingToSave => StatusCode::BAD_REQUEST,
            EnhanceError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            EnhanceError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            EnhanceError::Initialization(_)
            | EnhanceError::Preprocessing(_)
            | EnhanceError::Service { .. }
            | EnhanceError::Save(_)
            | EnhanceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for EnhanceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}
