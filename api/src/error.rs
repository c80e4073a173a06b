use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// Error kinds surfaced to API callers. `Unhandled` is the catch-all for
/// anything not worth a dedicated variant; everything else maps to a
/// specific status code and machine-readable `code`.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    InvalidInput(String),
    UpstreamUnavailable(String),
    Corrupted(String),
    Conflict(String),
    Unhandled(eyre::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status_code, code, msg) = match self {
            AppError::NotFound(e) => (StatusCode::NOT_FOUND, "NOT_FOUND", Some(e)),
            AppError::InvalidInput(e) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", Some(e)),
            AppError::UpstreamUnavailable(e) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", Some(e))
            }
            AppError::Corrupted(e) => (StatusCode::INTERNAL_SERVER_ERROR, "CORRUPTED", Some(e)),
            AppError::Conflict(e) => (StatusCode::CONFLICT, "CONFLICT", Some(e)),
            AppError::Unhandled(e) => {
                tracing::error!(?e, "unhandled error");
                #[cfg(debug_assertions)]
                let msg = Some(format!("{e:#}"));
                #[cfg(not(debug_assertions))]
                let msg = None;
                (StatusCode::INTERNAL_SERVER_ERROR, "SVR_ERR", msg)
            }
        };

        (
            status_code,
            Json(ErrorResponse {
                code: code.into(),
                msg,
            }),
        )
            .into_response()
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => AppError::NotFound("not found".into()),
            other => AppError::Unhandled(other.into()),
        }
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for AppError {
    fn from(e: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        AppError::UpstreamUnavailable(format!("database pool: {e}"))
    }
}

impl From<eyre::Error> for AppError {
    fn from(e: eyre::Error) -> Self {
        AppError::Unhandled(e)
    }
}

impl From<&'static str> for AppError {
    fn from(e: &'static str) -> Self {
        AppError::Unhandled(eyre::eyre!(e))
    }
}

impl From<(String, StatusCode)> for AppError {
    fn from((msg, status): (String, StatusCode)) -> Self {
        match status {
            StatusCode::NOT_FOUND => AppError::NotFound(msg),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                AppError::InvalidInput(msg)
            }
            StatusCode::CONFLICT => AppError::Conflict(msg),
            _ => AppError::Unhandled(eyre::eyre!(msg)),
        }
    }
}
