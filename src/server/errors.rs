use aide::operation::OperationOutput;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::EmbeddingError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Model not loaded")]
    ModelUnavailable,
    #[error("new_text and old_texts required")]
    InvalidRequest,
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("{message}")]
    JsonRejection { status: StatusCode, message: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest => StatusCode::BAD_REQUEST,
            AppError::JsonRejection { status, .. } => *status,
            AppError::ModelUnavailable | AppError::Embedding(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Body of every error response.
#[derive(Serialize, Deserialize, Debug, JsonSchema, PartialEq)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        } else {
            tracing::debug!(%status, error = %self, "request rejected");
        }
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl OperationOutput for AppError {
    type Inner = ErrorBody;
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::JsonRejection {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::ModelUnavailable.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::InvalidRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(EmbeddingError::NoCandidates).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_are_fixed() {
        assert_eq!(AppError::ModelUnavailable.to_string(), "Model not loaded");
        assert_eq!(
            AppError::InvalidRequest.to_string(),
            "new_text and old_texts required"
        );
    }
}
