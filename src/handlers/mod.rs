pub mod probes;
pub mod root;
pub mod work;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;
use thiserror::Error;

// ─── Unified error type ──────────────────────────────────────────

/// Every error leaves the service as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Readiness failure produced on purpose by `FAIL_RATE`.
    #[error("Injected failure")]
    InjectedFailure,

    #[error("{0}")]
    Validation(String),

    #[error("Not Found")]
    NotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InjectedFailure => StatusCode::SERVICE_UNAVAILABLE,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "detail": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// ─── Fallbacks ───────────────────────────────────────────────────

/// Any route not registered in the router.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// A registered path hit with a method it doesn't serve.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Converts a handler panic into a regular 500 so the metrics middleware
/// sees a response. Used with `CatchPanicLayer::custom`.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let msg = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "unknown panic".to_owned()
    };
    tracing::error!(panic = %msg, "handler panicked");

    let body = serde_json::json!({ "detail": "Internal Server Error" });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
