use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

use crate::auth::MaybeUser;
use crate::error::AppError;
use crate::services::Store;
use crate::state::AppState;

use super::base_context;

async fn author<S: Store>(
    State(state): State<AppState<S>>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    state
        .templates
        .render("about/author.html", &base_context(user.as_ref()))
        .await
}

async fn tech<S: Store>(
    State(state): State<AppState<S>>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    state
        .templates
        .render("about/tech.html", &base_context(user.as_ref()))
        .await
}

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/about/author/", get(author::<S>))
        .route("/about/tech/", get(tech::<S>))
}
