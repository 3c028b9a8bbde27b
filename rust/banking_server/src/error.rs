use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use common::ErrorResponse;
use thiserror::Error;
use tracing::{error, warn};

/// Failure raised while feeding a row through a loaded model.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("feature '{0}' is required by the model but missing from the request")]
    MissingFeature(String),
    #[error("feature '{0}' was not seen when the model was fit")]
    UnexpectedFeature(String),
    #[error("feature '{0}' is not numeric")]
    NotNumeric(String),
    #[error("feature '{0}' must be a finite number")]
    NotFinite(String),
    #[error("shape error: {0}")]
    Shape(String),
    #[error("model output is malformed: {0}")]
    Output(String),
    #[error("ORT error: {0}")]
    Runtime(String),
}

impl From<ort::Error> for InferenceError {
    fn from(err: ort::Error) -> Self {
        InferenceError::Runtime(err.to_string())
    }
}

impl From<ndarray::ShapeError> for InferenceError {
    fn from(err: ndarray::ShapeError) -> Self {
        InferenceError::Shape(err.to_string())
    }
}

// Error handling
#[derive(Debug)]
pub enum AppError {
    InvalidRequest(String),
    Inference(InferenceError),
    UnmappedCluster(i64),
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Inference(_) => "inference_failed",
            AppError::UnmappedCluster(_) => "unmapped_cluster",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Inference(_) | AppError::UnmappedCluster(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::InvalidRequest(msg) => write!(f, "{}", msg),
            AppError::Inference(err) => write!(f, "{}", err),
            AppError::UnmappedCluster(id) => {
                write!(f, "cluster {} has no product mapping", id)
            }
            AppError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::InvalidRequest(msg) => warn!("Rejected request: {}", msg),
            other => error!("Request failed ({}): {}", other.kind(), other),
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
        });

        (self.status(), body).into_response()
    }
}

impl From<InferenceError> for AppError {
    fn from(err: InferenceError) -> Self {
        AppError::Inference(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_statuses() {
        let cases = [
            (
                AppError::InvalidRequest("missing field".into()),
                "invalid_request",
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::Inference(InferenceError::MissingFeature("income".into())),
                "inference_failed",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::UnmappedCluster(7),
                "unmapped_cluster",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn test_unmapped_cluster_message_names_id() {
        assert_eq!(
            AppError::UnmappedCluster(7).to_string(),
            "cluster 7 has no product mapping"
        );
    }
}
