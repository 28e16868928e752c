use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

use crate::{Error, ErrorKind};

/// Implements conversion into json response for all possible error variants.
///
/// Backtrace and additional context information (e.g. user information) are
/// never part of the response and always only available through the
/// application logs. Server errors respond with the current span id, if
/// any, so they can be matched with the logs.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self.kind {
            ErrorKind::BadInput(_) | ErrorKind::ParsingError(_) | ErrorKind::UuidError(_) => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::AuthFailed(_) | ErrorKind::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ErrorKind::PasswordNotSet => {
                tracing::debug!("{}", self);
                // Don't make it possible for anyone to check whether the
                // account has a password set.
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": ErrorKind::InvalidCredentials.to_string() })),
                )
                    .into_response();
            }
            ErrorKind::Forbidden | ErrorKind::NotEligible(_) => StatusCode::FORBIDDEN,
            ErrorKind::NotFound(_) | ErrorKind::UserNotFound(_) => StatusCode::NOT_FOUND,
            ErrorKind::Conflict(_) | ErrorKind::UserWithEmailAlreadyExists(_) => {
                StatusCode::CONFLICT
            }
            _ => {
                tracing::error!("{}", self);
                let id = tracing::Span::current()
                    .id()
                    .map(|id| id.into_u64().to_string())
                    .unwrap_or_default();
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "internal error", "id": id })),
                )
                    .into_response();
            }
        };

        tracing::debug!("{}", self);
        (status, Json(serde_json::json!({ "error": self.kind.to_string() }))).into_response()
    }
}
