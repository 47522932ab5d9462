use std::fmt::Debug;
use std::fmt::Display;

use axum::response::Html;
use axum::{http::StatusCode, response::IntoResponse};

use crate::models::ModelError;

pub struct AppError {
    pub inner: anyhow::Error,
    pub status: StatusCode,
}

/// Marks a response produced from an [`AppError`] so the error page
/// middleware can swap in the templated page.
#[derive(Clone, Copy, Debug)]
pub struct ErrorPage(pub StatusCode);

impl AppError {
    pub fn not_found() -> Self {
        Self {
            inner: anyhow::anyhow!("not found"),
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn with_status(err: impl Into<anyhow::Error>, status: StatusCode) -> Self {
        Self {
            inner: err.into(),
            status,
        }
    }
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if self.status.is_server_error() {
            tracing::error!(error = ?self.inner, "request failed");
        }
        let body = match self.status {
            StatusCode::NOT_FOUND => "Page not found".to_owned(),
            s if s.is_client_error() => s.canonical_reason().unwrap_or("Bad request").to_owned(),
            _ => format!("Something went wrong: {}", self.inner),
        };
        let mut res = (self.status, Html(body)).into_response();
        res.extensions_mut().insert(ErrorPage(self.status));
        res
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

// This enables using `?` on functions that return `Result<_, anyhow::Error>` to turn them into
// `Result<_, AppError>`. That way you don't need to do that manually.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let inner = err.into();
        let status = match inner.downcast_ref::<ModelError>() {
            Some(ModelError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { inner, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_become_404() {
        let err = AppError::from(ModelError::NotFound("post"));
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.extensions().get::<ErrorPage>().is_some());
    }

    #[test]
    fn explicit_status_is_kept() {
        let err = AppError::with_status(anyhow::anyhow!("too big"), StatusCode::PAYLOAD_TOO_LARGE);
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(res.extensions().get::<ErrorPage>().is_some());
    }

    #[test]
    fn other_errors_become_500() {
        let err = AppError::from(anyhow::anyhow!("db down"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "db down");
    }
}
