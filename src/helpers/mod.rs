use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::error::AppError;

pub trait OrNotFound<T> {
    fn or_404(self) -> Result<T, AppError>;
}

impl<T> OrNotFound<T> for Option<T> {
    fn or_404(self) -> Result<T, AppError> {
        self.ok_or_else(AppError::not_found)
    }
}

/// Plain 302, what browsers and the login redirect expect.
pub fn found(location: impl AsRef<str>) -> Response {
    match header::HeaderValue::from_str(location.as_ref()) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// `?page=` on every paginated listing. Kept raw, the paginator decides.
#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn raw(&self) -> Option<&str> {
        self.page.as_deref()
    }
}
