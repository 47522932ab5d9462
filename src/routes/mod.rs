pub mod about;
pub mod admin;
pub mod posts;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::http::header;
use axum::middleware;
use axum::Router;
use tera::Context;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::middleware::error_pages::render_error_pages;
use crate::middleware::logging::HttpLoggingExt;
use crate::services::Store;
use crate::state::AppState;

/// Largest request body accepted, sized for post images.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Every page gets the visitor, if any.
pub(crate) fn base_context(user: Option<&CurrentUser>) -> Context {
    let mut ctx = Context::new();
    if let Some(user) = user {
        ctx.insert("user", user);
    }
    ctx
}

/// Ids in URLs that do not parse can never match a row.
pub(crate) fn parse_id(raw: &str) -> Result<i32, AppError> {
    raw.parse().map_err(|_| AppError::not_found())
}

async fn not_found() -> AppError {
    AppError::not_found()
}

pub fn app<S: Store>(state: AppState<S>) -> Router {
    let static_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("max-age=13420"),
        ))
        .layer(CompressionLayer::new())
        .service(ServeDir::new(&state.settings.static_dir));
    let media_files = ServeDir::new(&state.settings.media_dir);

    Router::new()
        .merge(posts::router())
        .merge(users::router())
        .merge(about::router())
        .merge(admin::router())
        .nest_service("/static", static_files)
        .nest_service("/media", media_files)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            render_error_pages::<S>,
        ))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .with_http_logging()
}
