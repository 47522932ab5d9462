//! Staff-only management pages for posts, groups, comments and follows.

use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Deserialize;
use tera::Context;
use tracing::info;

use crate::auth::{CurrentUser, RequireStaff};
use crate::error::AppError;
use crate::forms::group::GroupForm;
use crate::forms::FormErrors;
use crate::helpers::{found, OrNotFound, PageQuery};
use crate::models::post::PostFilter;
use crate::models::ModelError;
use crate::pagination::Paginator;
use crate::services::posts::paginate_posts;
use crate::services::Store;
use crate::state::AppState;

use super::{base_context, parse_id};

pub const ADMIN_PER_PAGE: i64 = 100;
pub const EMPTY_VALUE: &str = "-empty-";

const CREATED_CHOICES: [(&str, &str); 4] = [
    ("today", "Today"),
    ("week", "Past 7 days"),
    ("month", "This month"),
    ("year", "This year"),
];

/// Lower bound for the `?created=` filter, `None` for "any date".
fn created_since(choice: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let today = now.date_naive();
    let start: NaiveDate = match choice {
        "today" => today,
        "week" => today - Duration::days(7),
        "month" => today.with_day(1)?,
        "year" => NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
        _ => return None,
    };
    Some(start.and_hms_opt(0, 0, 0)?.and_utc())
}

fn admin_context(user: &CurrentUser) -> Context {
    let mut ctx = base_context(Some(user));
    ctx.insert("empty_value", EMPTY_VALUE);
    ctx
}

async fn index<S: Store>(
    State(state): State<AppState<S>>,
    RequireStaff(user): RequireStaff,
) -> Result<Html<String>, AppError> {
    let mut ctx = admin_context(&user);
    ctx.insert("post_count", &state.store.count_posts(&PostFilter::all()).await?);
    ctx.insert("group_count", &state.store.list_groups().await?.len());
    ctx.insert("comment_count", &state.store.count_comments().await?);
    ctx.insert("follow_count", &state.store.count_follows().await?);
    state.templates.render("admin/index.html", &ctx).await
}

#[derive(Deserialize, Debug, Default)]
struct PostListQuery {
    q: Option<String>,
    created: Option<String>,
    page: Option<String>,
}

async fn post_list<S: Store>(
    State(state): State<AppState<S>>,
    RequireStaff(user): RequireStaff,
    Query(q): Query<PostListQuery>,
) -> Result<Html<String>, AppError> {
    let search = q.q.as_deref().map(str::trim).unwrap_or_default();
    let created = q.created.as_deref().unwrap_or_default();
    let filter = PostFilter {
        text_contains: (!search.is_empty()).then(|| search.to_owned()),
        created_since: created_since(created, Utc::now()),
        ..PostFilter::default()
    };
    let page = paginate_posts(&state.store, &filter, q.page.as_deref(), ADMIN_PER_PAGE).await?;

    let mut ctx = admin_context(&user);
    ctx.insert("page_obj", &page);
    ctx.insert("groups", &state.store.list_groups().await?);
    ctx.insert("q", search);
    ctx.insert("created", created);
    ctx.insert("created_choices", &CREATED_CHOICES);
    ctx.insert(
        "page_params",
        &format!(
            "&q={}&created={}",
            urlencoding::encode(search),
            urlencoding::encode(created)
        ),
    );
    state.templates.render("admin/posts.html", &ctx).await
}

#[derive(Deserialize, Debug)]
struct GroupChange {
    #[serde(default)]
    group: String,
}

#[tracing::instrument(skip_all)]
async fn post_set_group<S: Store>(
    State(state): State<AppState<S>>,
    RequireStaff(user): RequireStaff,
    Path(post_id): Path<String>,
    Form(change): Form<GroupChange>,
) -> Result<Response, AppError> {
    let post = state.store.get_post(parse_id(&post_id)?).await?.or_404()?;
    let group_id = match change.group.trim() {
        "" => None,
        raw => Some(state.store.get_group(parse_id(raw)?).await?.or_404()?.id),
    };
    state.store.set_post_group(post.id, group_id).await?;
    info!(post_id = post.id, ?group_id, staff = %user.user.username, "post group changed");
    Ok(found("/admin/posts/"))
}

#[tracing::instrument(skip_all)]
async fn post_delete<S: Store>(
    State(state): State<AppState<S>>,
    RequireStaff(user): RequireStaff,
    Path(post_id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&post_id)?;
    if !state.store.delete_post(id).await? {
        return Err(ModelError::NotFound("post").into());
    }
    info!(post_id = id, staff = %user.user.username, "post deleted");
    Ok(found("/admin/posts/"))
}

async fn group_list<S: Store>(
    State(state): State<AppState<S>>,
    RequireStaff(user): RequireStaff,
) -> Result<Html<String>, AppError> {
    let mut ctx = admin_context(&user);
    ctx.insert("groups", &state.store.list_groups().await?);
    state.templates.render("admin/groups.html", &ctx).await
}

async fn render_group_form<S: Store>(
    state: &AppState<S>,
    user: &CurrentUser,
    form: &GroupForm,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut ctx = admin_context(user);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    state.templates.render("admin/group_form.html", &ctx).await
}

async fn group_add_form<S: Store>(
    State(state): State<AppState<S>>,
    RequireStaff(user): RequireStaff,
) -> Result<Html<String>, AppError> {
    render_group_form(&state, &user, &GroupForm::default(), &FormErrors::default()).await
}

async fn group_add<S: Store>(
    State(state): State<AppState<S>>,
    RequireStaff(user): RequireStaff,
    Form(form): Form<GroupForm>,
) -> Result<Response, AppError> {
    let new_group = match form.clone().clean() {
        Ok(new_group) => new_group,
        Err(errors) => {
            return Ok(render_group_form(&state, &user, &form, &errors)
                .await?
                .into_response())
        }
    };

    match state.store.create_group(&new_group).await {
        Ok(group) => {
            info!(group_id = group.id, slug = %group.slug, "group created");
            Ok(found("/admin/groups/"))
        }
        Err(e) if e.downcast_ref::<ModelError>() == Some(&ModelError::SlugTaken) => {
            let mut errors = FormErrors::default();
            errors.add("slug", ModelError::SlugTaken.to_string());
            Ok(render_group_form(&state, &user, &form, &errors)
                .await?
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn comment_list<S: Store>(
    State(state): State<AppState<S>>,
    RequireStaff(user): RequireStaff,
    Query(q): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let paginator = Paginator::new(state.store.count_comments().await?, ADMIN_PER_PAGE);
    let number = paginator.get_page(q.raw());
    let comments = state
        .store
        .list_comments(paginator.offset(number), paginator.per_page())
        .await?;

    let mut ctx = admin_context(&user);
    ctx.insert("page_obj", &paginator.page(comments, number));
    state.templates.render("admin/comments.html", &ctx).await
}

async fn follow_list<S: Store>(
    State(state): State<AppState<S>>,
    RequireStaff(user): RequireStaff,
    Query(q): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let paginator = Paginator::new(state.store.count_follows().await?, ADMIN_PER_PAGE);
    let number = paginator.get_page(q.raw());
    let follows = state
        .store
        .list_follows(paginator.offset(number), paginator.per_page())
        .await?;

    let mut ctx = admin_context(&user);
    ctx.insert("page_obj", &paginator.page(follows, number));
    state.templates.render("admin/follows.html", &ctx).await
}

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/admin/", get(index::<S>))
        .route("/admin/posts/", get(post_list::<S>))
        .route("/admin/posts/:post_id/group/", post(post_set_group::<S>))
        .route("/admin/posts/:post_id/delete/", post(post_delete::<S>))
        .route("/admin/groups/", get(group_list::<S>))
        .route(
            "/admin/groups/add/",
            get(group_add_form::<S>).post(group_add::<S>),
        )
        .route("/admin/comments/", get(comment_list::<S>))
        .route("/admin/follows/", get(follow_list::<S>))
}
