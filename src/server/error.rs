use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::library;

/// A failed API request, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A catalog operation failed.
    #[error(transparent)]
    Library(#[from] library::Error),

    /// The request could not be decoded.
    #[error("{0}")]
    BadRequest(String),

    /// The shared catalog is unusable after a panic in another request.
    #[error("catalog lock poisoned")]
    Poisoned,

    /// A blocking task failed to complete.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    /// The HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        use library::Error as E;

        match self {
            Self::Library(
                E::InvalidFormat(_)
                | E::InvalidParentFormat { .. }
                | E::UnsupportedLevel(_)
                | E::InvalidName
                | E::HierarchyMismatch { .. },
            )
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Library(E::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Library(
                E::DuplicateCode { .. }
                | E::Exhausted { .. }
                | E::HasActiveChildren { .. }
                | E::StillReferenced { .. },
            ) => StatusCode::CONFLICT,
            Self::Library(E::StorageUnavailable(_)) | Self::Poisoned | Self::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self:?}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
