use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::students::validation::ValidationReport;

/// Errors surfaced by student operations.
#[derive(Debug, Error)]
pub enum StudentError {
    #[error("Student not found: {id}")]
    NotFound { id: i64 },

    #[error("A student with email '{email}' already exists")]
    UniquenessViolation { email: String },

    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl StudentError {
    pub fn not_found(id: i64) -> Self {
        Self::NotFound { id }
    }

    pub fn uniqueness(email: impl Into<String>) -> Self {
        Self::UniquenessViolation {
            email: email.into(),
        }
    }

    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::UniquenessViolation { .. } => StatusCode::CONFLICT,
            Self::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StudentError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Validation(report) => (status, Json(report)).into_response(),
            Self::Storage(e) => {
                error!(error = %e, "student storage failure");
                (status, "Internal server error".to_string()).into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}
