use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tera::Context;

use crate::error::ErrorPage;
use crate::services::Store;
use crate::state::AppState;

/// Swap the plain body of an [`AppError`](crate::error::AppError) response
/// for the site's templated error page.
pub async fn render_error_pages<S: Store>(
    State(state): State<AppState<S>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let response = next.run(request).await;
    let Some(ErrorPage(status)) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    let template = if status.is_server_error() {
        "core/500.html"
    } else if status == StatusCode::NOT_FOUND {
        "core/404.html"
    } else {
        return response;
    };
    let mut ctx = Context::new();
    ctx.insert("path", &path);
    match state.templates.render(template, &ctx).await {
        Ok(page) => (status, page).into_response(),
        Err(e) => {
            tracing::error!(%e, template, "could not render error page");
            response
        }
    }
}
